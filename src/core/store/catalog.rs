use anyhow::{Result, anyhow};
use rusqlite::{OptionalExtension, params};

use super::conversation::{AGENT_COLUMNS, PROVIDER_COLUMNS, agent_from_row, provider_from_row};
use super::types::{AgentConfig, NewAgent, NewTask, ProviderConfig, TaskRecord};
use super::{SqliteStore, Store as _};

impl SqliteStore {
    /// Create or update a provider by name. Fields passed as `None` keep
    /// their stored value on update.
    pub async fn upsert_provider(
        &self,
        name: &str,
        api_key: Option<&str>,
        base_url: Option<&str>,
        enabled: bool,
    ) -> Result<ProviderConfig> {
        let name = name.trim();
        if name.is_empty() {
            return Err(anyhow!("Provider name must not be empty"));
        }

        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO model_providers (name, label, api_key, base_url, enabled) \
             VALUES (?1, ?1, COALESCE(?2, ''), COALESCE(?3, ''), ?4) \
             ON CONFLICT(name) DO UPDATE SET \
               api_key = COALESCE(?2, model_providers.api_key), \
               base_url = COALESCE(?3, model_providers.base_url), \
               enabled = ?4",
            params![name, api_key, base_url, enabled],
        )?;
        let provider = db.query_row(
            &format!("SELECT {} FROM model_providers WHERE name = ?1", PROVIDER_COLUMNS),
            params![name],
            provider_from_row,
        )?;
        Ok(provider)
    }

    pub async fn find_provider_by_name(&self, name: &str) -> Result<Option<ProviderConfig>> {
        let db = self.db.lock().await;
        let provider = db
            .query_row(
                &format!("SELECT {} FROM model_providers WHERE name = ?1", PROVIDER_COLUMNS),
                params![name],
                provider_from_row,
            )
            .optional()?;
        Ok(provider)
    }

    pub async fn list_providers(&self) -> Result<Vec<ProviderConfig>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(&format!(
            "SELECT {} FROM model_providers ORDER BY id ASC",
            PROVIDER_COLUMNS
        ))?;
        let rows = stmt.query_map([], provider_from_row)?;
        let mut providers = Vec::new();
        for row in rows {
            providers.push(row?);
        }
        Ok(providers)
    }

    pub async fn create_agent(&self, agent: &NewAgent) -> Result<AgentConfig> {
        if agent.name.trim().is_empty() {
            return Err(anyhow!("Agent name must not be empty"));
        }
        let tools = serde_json::to_string(&agent.tools)?;
        let id = {
            let db = self.db.lock().await;
            db.execute(
                "INSERT INTO agents (name, prompt, provider_id, model, tools, working_dir, max_steps) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    agent.name.trim(),
                    agent.prompt,
                    agent.provider_id,
                    agent.model,
                    tools,
                    agent.working_dir,
                    agent.max_steps.map(i64::from)
                ],
            )?;
            db.last_insert_rowid()
        };
        self.get_agent(id)
            .await?
            .ok_or_else(|| anyhow!("Agent {} vanished after insert", id))
    }

    pub async fn set_agent_enabled(&self, agent_id: i64, enabled: bool) -> Result<()> {
        let db = self.db.lock().await;
        let changed = db.execute(
            "UPDATE agents SET enabled = ?1 WHERE id = ?2",
            params![enabled, agent_id],
        )?;
        if changed == 0 {
            return Err(anyhow!("Agent {} does not exist", agent_id));
        }
        Ok(())
    }

    pub async fn list_agents(&self) -> Result<Vec<AgentConfig>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(&format!(
            "SELECT {} FROM agents ORDER BY id ASC",
            AGENT_COLUMNS
        ))?;
        let rows = stmt.query_map([], agent_from_row)?;
        let mut agents = Vec::new();
        for row in rows {
            agents.push(row?);
        }
        Ok(agents)
    }

    pub async fn create_task(&self, task: &NewTask) -> Result<TaskRecord> {
        if task.name.trim().is_empty() {
            return Err(anyhow!("Task name must not be empty"));
        }
        let id = {
            let db = self.db.lock().await;
            db.execute(
                "INSERT INTO tasks (name, description, project, date, deadline) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    task.name.trim(),
                    task.description,
                    task.project,
                    task.date,
                    task.deadline
                ],
            )?;
            db.last_insert_rowid()
        };
        self.get_task(id)
            .await?
            .ok_or_else(|| anyhow!("Task {} vanished after insert", id))
    }
}
