use anyhow::{Result, anyhow, bail};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::core::dispatch::{TurnHandle, TurnQueue};
use crate::core::store::{
    AgentStep, Conversation, ConversationMessage, ConversationStatus, MessageType, Role, Store,
    TaskRecord,
};

const NOT_SET: &str = "not set";

/// Everything a caller needs to render a conversation.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationDetail {
    pub conversation: Conversation,
    pub task: Option<TaskRecord>,
    pub messages: Vec<ConversationMessage>,
    pub steps: Vec<AgentStep>,
}

fn or_not_set(value: Option<&str>) -> &str {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v,
        _ => NOT_SET,
    }
}

/// Opening context message describing the task to the agent.
pub fn task_context(task: &TaskRecord, extra_context: Option<&str>) -> String {
    let mut text = format!(
        "# Task\n\
         - Name: {}\n\
         - Description: {}\n\
         - Project: {}\n\
         - Status: {}\n\
         - Planned date: {}\n\
         - Deadline: {}",
        task.name,
        or_not_set(Some(task.description.as_str())),
        or_not_set(task.project.as_deref()),
        task.status,
        or_not_set(task.date.as_deref()),
        or_not_set(task.deadline.as_deref()),
    );
    if let Some(extra) = extra_context.map(str::trim).filter(|e| !e.is_empty()) {
        text.push_str("\n\n# Additional context\n");
        text.push_str(extra);
    }
    text
}

/// Conversation lifecycle: every operation that (re)starts a turn goes
/// through here so a conversation never has two turns in flight.
pub struct ConversationService {
    store: Arc<dyn Store>,
    queue: TurnQueue,
}

impl ConversationService {
    pub fn new(store: Arc<dyn Store>, queue: TurnQueue) -> Self {
        Self { store, queue }
    }

    /// Delegate a task to an agent. The first turn starts in the background.
    pub async fn start_conversation(
        &self,
        task_id: i64,
        agent_id: i64,
        extra_context: Option<&str>,
    ) -> Result<(Conversation, TurnHandle)> {
        let task = self
            .store
            .get_task(task_id)
            .await?
            .ok_or_else(|| anyhow!("Task {} does not exist", task_id))?;
        let agent = self
            .store
            .get_agent(agent_id)
            .await?
            .ok_or_else(|| anyhow!("Agent {} does not exist", agent_id))?;

        let conversation = self.store.create_conversation(task.id, agent.id).await?;
        self.store
            .append_message(
                conversation.id,
                Role::System,
                &task_context(&task, extra_context),
                MessageType::Text,
                &json!({}),
            )
            .await?;
        info!(
            "Conversation {} started: task {} delegated to agent {}",
            conversation.id, task.name, agent.name
        );

        let handle = self.queue.submit(conversation.id);
        Ok((conversation, handle))
    }

    /// Record a user reply and resume the conversation.
    pub async fn send_message(&self, conversation_id: i64, content: &str) -> Result<TurnHandle> {
        let conversation = self.require(conversation_id).await?;
        if conversation.status == ConversationStatus::Active {
            bail!(
                "Conversation {} is still running; wait for it to pause before replying",
                conversation_id
            );
        }
        if content.trim().is_empty() {
            bail!("Message must not be empty");
        }

        self.store
            .append_message(conversation_id, Role::User, content, MessageType::Text, &json!({}))
            .await?;
        self.store
            .update_conversation_status(conversation_id, ConversationStatus::Active)
            .await?;
        info!("Conversation {} resumed by user reply", conversation_id);
        Ok(self.queue.submit(conversation_id))
    }

    /// Mark the conversation failed. A turn already in flight is not
    /// interrupted.
    pub async fn stop_conversation(&self, conversation_id: i64) -> Result<()> {
        self.require(conversation_id).await?;
        self.store
            .update_conversation_status(conversation_id, ConversationStatus::Failed)
            .await?;
        info!("Conversation {} stopped", conversation_id);
        Ok(())
    }

    pub async fn conversation_detail(&self, conversation_id: i64) -> Result<ConversationDetail> {
        let conversation = self.require(conversation_id).await?;
        let task = self.store.get_task(conversation.task_id).await?;
        let messages = self.store.list_messages(conversation_id).await?;
        let steps = self.store.list_steps(conversation_id).await?;
        Ok(ConversationDetail {
            conversation,
            task,
            messages,
            steps,
        })
    }

    async fn require(&self, conversation_id: i64) -> Result<Conversation> {
        self.store
            .get_conversation(conversation_id)
            .await?
            .ok_or_else(|| anyhow!("Conversation {} does not exist", conversation_id))
    }
}
