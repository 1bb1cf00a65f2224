use std::sync::Arc;

use crate::core::llm::ChatMessage;
use crate::core::store::{AgentConfig, ConversationMessage};
use crate::core::tools::{DEFAULT_TOOL_NAMES, Tool, ToolRegistry};

const ROLE_FRAMING: &str =
    "You are a task execution agent that autonomously completes software engineering tasks.\n\n";

const OUTPUT_CONTRACT: &str = r##"
Whenever you act, reply with exactly one JSON object and nothing else, in this shape:

{"thought": "your reasoning", "action": "tool name", "action_input": {tool arguments}}

Examples:
{"thought": "I should look at the project layout first", "action": "list_files", "action_input": {"path": "."}}
{"thought": "I need the configuration file", "action": "read_file", "action_input": {"path": "config.json"}}
{"thought": "Save the generated notes", "action": "write_file", "action_input": {"path": "notes.md", "content": "# Notes"}}
{"thought": "Run the test suite", "action": "shell", "action_input": {"command": "npm test"}}
{"thought": "This refactor spans many files", "action": "claude_code", "action_input": {"task": "Rename the User model to Account"}}
{"thought": "The target database is unclear", "action": "ask_user", "action_input": {"question": "Which database should I use?", "options": ["sqlite", "postgres"]}}
{"thought": "Everything is done", "action": "complete", "action_input": {"summary": "Implemented the feature and all tests pass"}}

Rules:
1. Use exactly one tool per reply.
2. Decide the next step from the tool results you receive.
3. When unsure, use ask_user instead of guessing.
4. When the task is finished you must call complete.
"##;

/// Tools shown to the model: the agent's list in its order, or the default set.
pub fn resolve_tools(registry: &ToolRegistry, agent: &AgentConfig) -> Vec<Arc<dyn Tool>> {
    if agent.tools.is_empty() {
        registry.select(DEFAULT_TOOL_NAMES)
    } else {
        registry.select(agent.tools.as_slice())
    }
}

pub fn build_system_prompt(persona: &str, tools: &[Arc<dyn Tool>]) -> String {
    let mut prompt = String::from(ROLE_FRAMING);

    let persona = persona.trim();
    if !persona.is_empty() {
        prompt.push_str("## Agent profile\n");
        prompt.push_str(persona);
        prompt.push_str("\n\n");
    }

    prompt.push_str("You can use the following tools:\n\n");
    for tool in tools {
        prompt.push_str(&format!(
            "## {}\n{}\nArguments: {}\n\n",
            tool.name(),
            tool.description(),
            tool.schema()
        ));
    }
    prompt.push_str(OUTPUT_CONTRACT);
    prompt
}

/// Only `user` and `assistant` reach the model as-is; stored context and
/// tool observations are replayed as user turns.
fn transcript_role(stored: &str) -> &'static str {
    match stored {
        "assistant" => "assistant",
        _ => "user",
    }
}

/// System prompt followed by the full transcript in stored order.
pub fn build_messages(
    registry: &ToolRegistry,
    agent: &AgentConfig,
    history: &[ConversationMessage],
) -> Vec<ChatMessage> {
    let tools = resolve_tools(registry, agent);
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(ChatMessage::new("system", build_system_prompt(&agent.prompt, &tools)));
    messages.extend(
        history
            .iter()
            .map(|m| ChatMessage::new(transcript_role(&m.role), m.content.clone())),
    );
    messages
}
