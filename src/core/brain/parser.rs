use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use serde_json::value::RawValue;
use std::sync::LazyLock;
use thiserror::Error;

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json)?\s*\n?(.+?)\n?```").expect("fenced block pattern is valid")
});

// Flat objects only: a nested action_input defeats this scan.
static ACTION_OBJECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)\{[^{}]*"action"[^{}]*\}"#).expect("action object pattern is valid")
});

/// One model turn: what it thought and which tool it picked.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentAction {
    pub thought: String,
    pub action: String,
    pub action_input: Value,
    raw_input: String,
}

impl AgentAction {
    /// `action_input` exactly as the model wrote it, for the step row.
    pub fn raw_input(&self) -> &str {
        &self.raw_input
    }
}

/// Reply shape on the wire. `null` is accepted wherever a field may be absent.
#[derive(Deserialize)]
struct WireAction {
    #[serde(default)]
    thought: Option<String>,
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    action_input: Option<Box<RawValue>>,
}

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    /// The reply is free text rather than an action.
    #[error("no action object found in model reply")]
    NoAction,
}

fn decode(candidate: &str) -> Option<AgentAction> {
    let wire: WireAction = serde_json::from_str(candidate).ok()?;
    let action = wire.action.unwrap_or_default();
    if action.trim().is_empty() {
        return None;
    }
    let (action_input, raw_input) = match wire.action_input {
        Some(raw) => (serde_json::from_str(raw.get()).ok()?, raw.get().to_string()),
        None => (Value::Null, "{}".to_string()),
    };
    Some(AgentAction {
        thought: wire.thought.unwrap_or_default(),
        action,
        action_input,
        raw_input,
    })
}

/// Extract the action from a model reply: the whole reply as JSON, then the
/// first fenced code block, then the first flat object mentioning `"action"`.
pub fn parse_action(reply: &str) -> Result<AgentAction, ParseError> {
    let reply = reply.trim();

    if let Some(action) = decode(reply) {
        return Ok(action);
    }

    if let Some(block) = FENCED_BLOCK.captures(reply).and_then(|c| c.get(1)) {
        if let Some(action) = decode(block.as_str().trim()) {
            return Ok(action);
        }
    }

    if let Some(object) = ACTION_OBJECT.find(reply) {
        if let Some(action) = decode(object.as_str()) {
            return Ok(action);
        }
    }

    Err(ParseError::NoAction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bare_json_reply() {
        let action = parse_action(
            r#"  {"thought":"look","action":"list_files","action_input":{"path":"."}}  "#,
        )
        .unwrap();
        assert_eq!(action.thought, "look");
        assert_eq!(action.action, "list_files");
        assert_eq!(action.action_input, json!({"path": "."}));
    }

    #[test]
    fn fenced_json_block() {
        let reply = "Sure, running it now.\n```json\n{\"thought\":\"t\",\"action\":\"shell\",\"action_input\":{\"command\":\"echo hi\"}}\n```\nDone.";
        let action = parse_action(reply).unwrap();
        assert_eq!(action.action, "shell");
        assert_eq!(action.thought, "t");
        assert_eq!(action.action_input["command"], "echo hi");
    }

    #[test]
    fn untagged_fence() {
        let reply = "```\n{\"thought\":\"\",\"action\":\"complete\",\"action_input\":{\"summary\":\"ok\"}}\n```";
        assert_eq!(parse_action(reply).unwrap().action, "complete");
    }

    #[test]
    fn flat_object_inside_prose() {
        let reply = r#"I will finish. {"thought": "done", "action": "complete"} thanks"#;
        let action = parse_action(reply).unwrap();
        assert_eq!(action.action, "complete");
        assert!(action.action_input.is_null());
        assert_eq!(action.raw_input(), "{}");
    }

    #[test]
    fn nested_object_inside_prose_is_not_recovered() {
        let reply = r#"Plan: {"thought":"t","action":"shell","action_input":{"command":"ls"}} ok"#;
        assert_eq!(parse_action(reply), Err(ParseError::NoAction));
    }

    #[test]
    fn empty_action_name_does_not_count() {
        assert_eq!(
            parse_action(r#"{"thought":"hmm","action":"  "}"#),
            Err(ParseError::NoAction)
        );
    }

    #[test]
    fn null_thought_reads_as_empty() {
        let action = parse_action(
            r#"{"thought":null,"action":"complete","action_input":{"summary":"x"}}"#,
        )
        .unwrap();
        assert_eq!(action.thought, "");
        assert_eq!(action.action, "complete");
        assert_eq!(action.action_input["summary"], "x");
    }

    #[test]
    fn null_input_is_stored_as_empty_object() {
        let action = parse_action(r#"{"thought":"t","action":"complete","action_input":null}"#).unwrap();
        assert!(action.action_input.is_null());
        assert_eq!(action.raw_input(), "{}");
    }

    #[test]
    fn raw_input_keeps_the_model_text() {
        let action = parse_action(
            r#"{"thought":"t","action":"write_file","action_input":{"path":"a.txt", "content":"hi"}}"#,
        )
        .unwrap();
        assert_eq!(action.raw_input(), r#"{"path":"a.txt", "content":"hi"}"#);
        assert_eq!(action.action_input, json!({"path": "a.txt", "content": "hi"}));
    }

    #[test]
    fn free_text_is_no_action() {
        assert_eq!(
            parse_action("I think the build is fine, what next?"),
            Err(ParseError::NoAction)
        );
        assert_eq!(parse_action(""), Err(ParseError::NoAction));
    }

    #[test]
    fn later_strategy_used_when_fence_lacks_action() {
        let reply = "```\nnot json\n```\n{\"action\":\"read_file\",\"thought\":\"x\"}";
        assert_eq!(parse_action(reply).unwrap().action, "read_file");
    }
}
