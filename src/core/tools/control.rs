use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use super::{TOOL_ASK_USER, TOOL_COMPLETE, Tool, ToolContext, ToolResult, parse_args};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AskUserArgs {
    pub question: String,
    pub options: Vec<String>,
}

impl AskUserArgs {
    /// Question followed by the offered options, when there are any.
    pub fn render(&self) -> String {
        if self.options.is_empty() {
            self.question.clone()
        } else {
            format!("{}\nOptions: {}", self.question, self.options.join(" / "))
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CompleteArgs {
    pub summary: String,
}

/// Read control-tool arguments without failing: the loop handles these
/// actions itself and a sloppy payload should still end or pause the run.
pub fn parse_control_args<T: Default + for<'de> Deserialize<'de>>(args: &Value) -> T {
    serde_json::from_value(args.clone()).unwrap_or_default()
}

pub struct AskUserTool;

#[async_trait]
impl Tool for AskUserTool {
    fn name(&self) -> &'static str {
        TOOL_ASK_USER
    }

    fn description(&self) -> &'static str {
        "Ask the user a question to get missing information or a confirmation. Use it to clarify requirements or before important decisions."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "question": {"type": "string", "description": "The question"},
                "options": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Suggested answers"
                }
            },
            "required": ["question"]
        })
    }

    async fn execute(&self, args: &Value, _ctx: &ToolContext) -> ToolResult {
        let args: AskUserArgs = match parse_args(TOOL_ASK_USER, args) {
            Ok(args) => args,
            Err(failed) => return failed,
        };
        ToolResult {
            needs_user: true,
            ..ToolResult::ok(args.render())
        }
    }
}

pub struct CompleteTool;

#[async_trait]
impl Tool for CompleteTool {
    fn name(&self) -> &'static str {
        TOOL_COMPLETE
    }

    fn description(&self) -> &'static str {
        "Mark the task as finished. Call it once the task is done."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "summary": {"type": "string", "description": "Summary of what was done"}
            },
            "required": ["summary"]
        })
    }

    async fn execute(&self, args: &Value, _ctx: &ToolContext) -> ToolResult {
        let args: CompleteArgs = match parse_args(TOOL_COMPLETE, args) {
            Ok(args) => args,
            Err(failed) => return failed,
        };
        ToolResult {
            is_completed: true,
            ..ToolResult::ok(args.summary)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn ctx() -> ToolContext {
        ToolContext {
            working_dir: PathBuf::from("."),
        }
    }

    #[tokio::test]
    async fn ask_user_renders_options_and_requests_input() {
        let result = AskUserTool
            .execute(
                &json!({"question": "Which database?", "options": ["sqlite", "postgres"]}),
                &ctx(),
            )
            .await;
        assert!(result.success);
        assert!(result.needs_user);
        assert_eq!(result.output, "Which database?\nOptions: sqlite / postgres");
    }

    #[tokio::test]
    async fn complete_echoes_summary() {
        let result = CompleteTool
            .execute(&json!({"summary": "all green"}), &ctx())
            .await;
        assert!(result.success);
        assert!(result.is_completed);
        assert_eq!(result.output, "all green");
    }

    #[test]
    fn lenient_parsing_defaults_bad_payloads() {
        let args: AskUserArgs = parse_control_args(&json!("free text"));
        assert!(args.question.is_empty());
        let args: CompleteArgs = parse_control_args(&json!({"summary": "done", "extra": 1}));
        assert_eq!(args.summary, "done");
        assert_eq!(parse_control_args::<AskUserArgs>(&json!({"question": "q"})).render(), "q");
    }
}
