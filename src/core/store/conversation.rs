use anyhow::{Result, anyhow};
use async_trait::async_trait;
use rusqlite::{OptionalExtension, Row, params};

use super::types::{
    AgentConfig, AgentStep, Conversation, ConversationMessage, ConversationStatus, MessageType,
    ProviderConfig, Role, StepStatus, TaskRecord, parse_metadata, parse_tool_list,
};
use super::{SqliteStore, Store};

fn conversation_from_row(row: &Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: row.get(0)?,
        task_id: row.get(1)?,
        agent_id: row.get(2)?,
        status: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

pub(super) fn agent_from_row(row: &Row<'_>) -> rusqlite::Result<AgentConfig> {
    let tools: String = row.get(5)?;
    let max_steps: Option<i64> = row.get(7)?;
    Ok(AgentConfig {
        id: row.get(0)?,
        name: row.get(1)?,
        prompt: row.get(2)?,
        provider_id: row.get(3)?,
        model: row.get(4)?,
        tools: parse_tool_list(&tools),
        working_dir: row.get(6)?,
        max_steps: max_steps.and_then(|n| u32::try_from(n).ok()).filter(|n| *n > 0),
        enabled: row.get(8)?,
    })
}

pub(super) fn provider_from_row(row: &Row<'_>) -> rusqlite::Result<ProviderConfig> {
    Ok(ProviderConfig {
        id: row.get(0)?,
        name: row.get(1)?,
        label: row.get(2)?,
        base_url: row.get(3)?,
        api_key: row.get(4)?,
        enabled: row.get(5)?,
    })
}

pub(super) const AGENT_COLUMNS: &str =
    "id, name, prompt, provider_id, model, tools, working_dir, max_steps, enabled";
pub(super) const PROVIDER_COLUMNS: &str = "id, name, label, base_url, api_key, enabled";

#[async_trait]
impl Store for SqliteStore {
    async fn append_message(
        &self,
        conversation_id: i64,
        role: Role,
        content: &str,
        message_type: MessageType,
        metadata: &serde_json::Value,
    ) -> Result<i64> {
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO conversation_messages (conversation_id, role, content, message_type, metadata) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                conversation_id,
                role.as_str(),
                content,
                message_type,
                metadata.to_string()
            ],
        )?;
        let id = db.last_insert_rowid();
        db.execute(
            "UPDATE task_conversations SET updated_at = CURRENT_TIMESTAMP WHERE id = ?1",
            params![conversation_id],
        )?;
        Ok(id)
    }

    async fn append_step(
        &self,
        conversation_id: i64,
        step_num: i64,
        thought: &str,
        action: &str,
        action_input: &str,
    ) -> Result<i64> {
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO agent_steps (conversation_id, step_num, thought, action, action_input, status) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                conversation_id,
                step_num,
                thought,
                action,
                action_input,
                StepStatus::Running
            ],
        )?;
        Ok(db.last_insert_rowid())
    }

    async fn update_step(
        &self,
        step_id: i64,
        status: StepStatus,
        observation: &str,
        error: &str,
    ) -> Result<()> {
        let db = self.db.lock().await;
        let changed = db.execute(
            "UPDATE agent_steps SET status = ?1, observation = ?2, error = ?3 WHERE id = ?4",
            params![status, observation, error, step_id],
        )?;
        if changed == 0 {
            return Err(anyhow!("Step {} not found", step_id));
        }
        Ok(())
    }

    async fn update_conversation_status(
        &self,
        conversation_id: i64,
        status: ConversationStatus,
    ) -> Result<()> {
        let db = self.db.lock().await;
        let changed = db.execute(
            "UPDATE task_conversations SET status = ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2",
            params![status, conversation_id],
        )?;
        if changed == 0 {
            return Err(anyhow!("Conversation {} not found", conversation_id));
        }
        Ok(())
    }

    async fn list_messages(&self, conversation_id: i64) -> Result<Vec<ConversationMessage>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT id, conversation_id, role, content, message_type, metadata, created_at \
             FROM conversation_messages WHERE conversation_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![conversation_id], |row| {
            let metadata: String = row.get(5)?;
            Ok(ConversationMessage {
                id: row.get(0)?,
                conversation_id: row.get(1)?,
                role: row.get(2)?,
                content: row.get(3)?,
                message_type: row.get(4)?,
                metadata: parse_metadata(&metadata),
                created_at: row.get(6)?,
            })
        })?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    async fn list_steps(&self, conversation_id: i64) -> Result<Vec<AgentStep>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT id, conversation_id, step_num, thought, action, action_input, observation, \
             status, error, created_at \
             FROM agent_steps WHERE conversation_id = ?1 ORDER BY step_num ASC",
        )?;
        let rows = stmt.query_map(params![conversation_id], |row| {
            Ok(AgentStep {
                id: row.get(0)?,
                conversation_id: row.get(1)?,
                step_num: row.get(2)?,
                thought: row.get(3)?,
                action: row.get(4)?,
                action_input: row.get(5)?,
                observation: row.get(6)?,
                status: row.get(7)?,
                error: row.get(8)?,
                created_at: row.get(9)?,
            })
        })?;

        let mut steps = Vec::new();
        for row in rows {
            steps.push(row?);
        }
        Ok(steps)
    }

    async fn last_step_num(&self, conversation_id: i64) -> Result<i64> {
        let db = self.db.lock().await;
        let last: i64 = db.query_row(
            "SELECT COALESCE(MAX(step_num), 0) FROM agent_steps WHERE conversation_id = ?1",
            params![conversation_id],
            |row| row.get(0),
        )?;
        Ok(last)
    }

    async fn create_conversation(&self, task_id: i64, agent_id: i64) -> Result<Conversation> {
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO task_conversations (task_id, agent_id, status) VALUES (?1, ?2, ?3)",
            params![task_id, agent_id, ConversationStatus::Active],
        )?;
        let id = db.last_insert_rowid();
        let conversation = db.query_row(
            "SELECT id, task_id, agent_id, status, created_at, updated_at \
             FROM task_conversations WHERE id = ?1",
            params![id],
            conversation_from_row,
        )?;
        Ok(conversation)
    }

    async fn get_conversation(&self, conversation_id: i64) -> Result<Option<Conversation>> {
        let db = self.db.lock().await;
        let conversation = db
            .query_row(
                "SELECT id, task_id, agent_id, status, created_at, updated_at \
                 FROM task_conversations WHERE id = ?1",
                params![conversation_id],
                conversation_from_row,
            )
            .optional()?;
        Ok(conversation)
    }

    async fn get_agent(&self, agent_id: i64) -> Result<Option<AgentConfig>> {
        let db = self.db.lock().await;
        let agent = db
            .query_row(
                &format!("SELECT {} FROM agents WHERE id = ?1", AGENT_COLUMNS),
                params![agent_id],
                agent_from_row,
            )
            .optional()?;
        Ok(agent)
    }

    async fn get_provider(&self, provider_id: i64) -> Result<Option<ProviderConfig>> {
        let db = self.db.lock().await;
        let provider = db
            .query_row(
                &format!("SELECT {} FROM model_providers WHERE id = ?1", PROVIDER_COLUMNS),
                params![provider_id],
                provider_from_row,
            )
            .optional()?;
        Ok(provider)
    }

    async fn get_task(&self, task_id: i64) -> Result<Option<TaskRecord>> {
        let db = self.db.lock().await;
        let task = db
            .query_row(
                "SELECT id, name, description, project, status, date, deadline \
                 FROM tasks WHERE id = ?1",
                params![task_id],
                |row| {
                    Ok(TaskRecord {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        description: row.get(2)?,
                        project: row.get(3)?,
                        status: row.get(4)?,
                        date: row.get(5)?,
                        deadline: row.get(6)?,
                    })
                },
            )
            .optional()?;
        Ok(task)
    }
}
