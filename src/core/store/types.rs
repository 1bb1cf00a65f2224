use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::Serialize;

macro_rules! sql_text_enum {
    ($name:ident) => {
        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let text = value.as_str()?;
                $name::parse(text).ok_or_else(|| {
                    FromSqlError::Other(
                        format!("unknown {} value: {}", stringify!($name), text).into(),
                    )
                })
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    Active,
    WaitingUser,
    Completed,
    Failed,
}

impl ConversationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ConversationStatus::Active => "active",
            ConversationStatus::WaitingUser => "waiting_user",
            ConversationStatus::Completed => "completed",
            ConversationStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(ConversationStatus::Active),
            "waiting_user" => Some(ConversationStatus::WaitingUser),
            "completed" => Some(ConversationStatus::Completed),
            "failed" => Some(ConversationStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Text,
    Question,
    Result,
    Error,
}

impl MessageType {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageType::Text => "text",
            MessageType::Question => "question",
            MessageType::Result => "result",
            MessageType::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "text" => Some(MessageType::Text),
            "question" => Some(MessageType::Question),
            "result" => Some(MessageType::Result),
            "error" => Some(MessageType::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Success,
    Failed,
}

impl StepStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Success => "success",
            StepStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(StepStatus::Pending),
            "running" => Some(StepStatus::Running),
            "success" => Some(StepStatus::Success),
            "failed" => Some(StepStatus::Failed),
            _ => None,
        }
    }
}

sql_text_enum!(ConversationStatus);
sql_text_enum!(MessageType);
sql_text_enum!(StepStatus);

/// Author of a message written by this crate. Stored roles are read back as
/// plain strings, since other writers may use roles outside this set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Conversation {
    pub id: i64,
    pub task_id: i64,
    pub agent_id: i64,
    pub status: ConversationStatus,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationMessage {
    pub id: i64,
    pub conversation_id: i64,
    pub role: String,
    pub content: String,
    pub message_type: MessageType,
    pub metadata: serde_json::Value,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentStep {
    pub id: i64,
    pub conversation_id: i64,
    pub step_num: i64,
    pub thought: String,
    pub action: String,
    pub action_input: String,
    pub observation: String,
    pub status: StepStatus,
    pub error: String,
    pub created_at: String,
}

/// Agent configuration as the execution loop consumes it.
#[derive(Debug, Clone, Serialize)]
pub struct AgentConfig {
    pub id: i64,
    pub name: String,
    /// Persona text appended to the system prompt.
    pub prompt: String,
    pub provider_id: Option<i64>,
    pub model: String,
    pub tools: Vec<String>,
    pub working_dir: String,
    pub max_steps: Option<u32>,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderConfig {
    pub id: i64,
    pub name: String,
    pub label: String,
    pub base_url: String,
    #[serde(skip)]
    pub api_key: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskRecord {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub project: Option<String>,
    pub status: String,
    pub date: Option<String>,
    pub deadline: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewAgent {
    pub name: String,
    pub prompt: String,
    pub provider_id: Option<i64>,
    pub model: String,
    pub tools: Vec<String>,
    pub working_dir: String,
    pub max_steps: Option<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub name: String,
    pub description: String,
    pub project: Option<String>,
    pub date: Option<String>,
    pub deadline: Option<String>,
}

/// Parse the agents.tools column (JSON array text). Anything unparsable is
/// treated as "no explicit tool list".
pub(crate) fn parse_tool_list(raw: &str) -> Vec<String> {
    serde_json::from_str::<Vec<String>>(raw)
        .unwrap_or_default()
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

pub(crate) fn parse_metadata(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::json!({}))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_roundtrip() {
        for status in [
            ConversationStatus::Active,
            ConversationStatus::WaitingUser,
            ConversationStatus::Completed,
            ConversationStatus::Failed,
        ] {
            assert_eq!(ConversationStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ConversationStatus::parse("paused"), None);
        assert_eq!(StepStatus::parse("running"), Some(StepStatus::Running));
        assert_eq!(MessageType::parse("question"), Some(MessageType::Question));
    }

    #[test]
    fn tool_list_ignores_garbage() {
        assert_eq!(parse_tool_list("[]"), Vec::<String>::new());
        assert_eq!(parse_tool_list(""), Vec::<String>::new());
        assert_eq!(parse_tool_list("not json"), Vec::<String>::new());
        assert_eq!(
            parse_tool_list(r#"["shell", " read_file ", ""]"#),
            vec!["shell".to_string(), "read_file".to_string()]
        );
    }

    #[test]
    fn metadata_falls_back_to_empty_object() {
        assert_eq!(parse_metadata("{}"), serde_json::json!({}));
        assert_eq!(parse_metadata("garbage"), serde_json::json!({}));
        assert_eq!(
            parse_metadata(r#"{"options":["a"]}"#)["options"][0],
            serde_json::json!("a")
        );
    }
}
