mod catalog;
mod conversation;
pub mod types;

use anyhow::Result;
use async_trait::async_trait;
use rusqlite::{Connection, params};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::platform::{NativePlatform, Platform};

pub use types::{
    AgentConfig, AgentStep, Conversation, ConversationMessage, ConversationStatus, MessageType,
    NewAgent, NewTask, ProviderConfig, Role, StepStatus, TaskRecord,
};

/// Persistence operations the execution engine depends on. Injected into the
/// brain and the session service so tests can run against an in-memory store.
#[async_trait]
pub trait Store: Send + Sync {
    /// Append a message and bump the conversation's `updated_at`.
    async fn append_message(
        &self,
        conversation_id: i64,
        role: Role,
        content: &str,
        message_type: MessageType,
        metadata: &serde_json::Value,
    ) -> Result<i64>;

    /// Insert a step in `running` state.
    async fn append_step(
        &self,
        conversation_id: i64,
        step_num: i64,
        thought: &str,
        action: &str,
        action_input: &str,
    ) -> Result<i64>;

    async fn update_step(
        &self,
        step_id: i64,
        status: StepStatus,
        observation: &str,
        error: &str,
    ) -> Result<()>;

    async fn update_conversation_status(
        &self,
        conversation_id: i64,
        status: ConversationStatus,
    ) -> Result<()>;

    /// Messages in insertion order.
    async fn list_messages(&self, conversation_id: i64) -> Result<Vec<ConversationMessage>>;

    /// Steps ordered by step number.
    async fn list_steps(&self, conversation_id: i64) -> Result<Vec<AgentStep>>;

    /// Highest step number recorded for the conversation, 0 when none.
    async fn last_step_num(&self, conversation_id: i64) -> Result<i64>;

    async fn create_conversation(&self, task_id: i64, agent_id: i64) -> Result<Conversation>;

    async fn get_conversation(&self, conversation_id: i64) -> Result<Option<Conversation>>;

    async fn get_agent(&self, agent_id: i64) -> Result<Option<AgentConfig>>;

    async fn get_provider(&self, provider_id: i64) -> Result<Option<ProviderConfig>>;

    async fn get_task(&self, task_id: i64) -> Result<Option<TaskRecord>>;
}

pub struct SqliteStore {
    db: Arc<Mutex<Connection>>,
}

const DEFAULT_PROVIDERS: &[(&str, &str, &str)] = &[
    ("deepseek", "DeepSeek", "https://api.deepseek.com"),
    (
        "tongyi",
        "Tongyi Qianwen",
        "https://dashscope.aliyuncs.com/compatible-mode/v1",
    ),
    (
        "volcengine",
        "Volcengine Ark",
        "https://ark.cn-beijing.volces.com/api/v3",
    ),
];

impl SqliteStore {
    pub async fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let db = Connection::open(db_path)?;
        NativePlatform::restrict_file_permissions(db_path);
        info!("Opened workbench database at {:?}", db_path);
        Self::with_connection(db)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(db: Connection) -> Result<Self> {
        db.execute_batch("PRAGMA foreign_keys = ON;")?;
        create_schema(&db)?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }
}

fn create_schema(db: &Connection) -> Result<()> {
    db.execute(
        "CREATE TABLE IF NOT EXISTS model_providers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            label TEXT NOT NULL,
            api_key TEXT NOT NULL DEFAULT '',
            base_url TEXT NOT NULL DEFAULT '',
            enabled INTEGER NOT NULL DEFAULT 1,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    db.execute(
        "CREATE TABLE IF NOT EXISTS agents (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            prompt TEXT NOT NULL DEFAULT '',
            provider_id INTEGER,
            model TEXT NOT NULL DEFAULT '',
            tools TEXT NOT NULL DEFAULT '[]',
            working_dir TEXT NOT NULL DEFAULT '',
            max_steps INTEGER,
            enabled INTEGER NOT NULL DEFAULT 1,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (provider_id) REFERENCES model_providers(id) ON DELETE SET NULL
        )",
        [],
    )?;

    db.execute(
        "CREATE TABLE IF NOT EXISTS tasks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            project TEXT,
            status TEXT NOT NULL DEFAULT 'pending',
            date TEXT,
            deadline TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    db.execute(
        "CREATE TABLE IF NOT EXISTS task_conversations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            task_id INTEGER NOT NULL,
            agent_id INTEGER NOT NULL,
            status TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    db.execute(
        "CREATE TABLE IF NOT EXISTS conversation_messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            conversation_id INTEGER NOT NULL,
            role TEXT NOT NULL,
            content TEXT NOT NULL,
            message_type TEXT NOT NULL DEFAULT 'text',
            metadata TEXT NOT NULL DEFAULT '{}',
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (conversation_id) REFERENCES task_conversations(id) ON DELETE CASCADE
        )",
        [],
    )?;

    db.execute(
        "CREATE TABLE IF NOT EXISTS agent_steps (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            conversation_id INTEGER NOT NULL,
            step_num INTEGER NOT NULL,
            thought TEXT NOT NULL DEFAULT '',
            action TEXT NOT NULL DEFAULT '',
            action_input TEXT NOT NULL DEFAULT '',
            observation TEXT NOT NULL DEFAULT '',
            status TEXT NOT NULL,
            error TEXT NOT NULL DEFAULT '',
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (conversation_id) REFERENCES task_conversations(id) ON DELETE CASCADE,
            UNIQUE (conversation_id, step_num)
        )",
        [],
    )?;

    db.execute(
        "CREATE INDEX IF NOT EXISTS idx_messages_conversation ON conversation_messages(conversation_id, id)",
        [],
    )?;

    for (name, label, base_url) in DEFAULT_PROVIDERS {
        db.execute(
            "INSERT OR IGNORE INTO model_providers (name, label, base_url) VALUES (?1, ?2, ?3)",
            params![name, label, base_url],
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests;
