pub mod parser;
pub mod prompt;

use anyhow::{Result, anyhow};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::core::config::AgentSettings;
use crate::core::llm::{ChatModel, ChatRequest, ModelConnector, ModelError};
use crate::core::store::{
    AgentConfig, Conversation, ConversationStatus, MessageType, Role, StepStatus, Store,
};
use crate::core::tools::{
    AskUserArgs, CompleteArgs, TOOL_ASK_USER, TOOL_COMPLETE, ToolExecutor, ToolRegistry,
    ToolResult, parse_control_args,
};
use parser::{ParseError, parse_action};

/// How one invocation of the loop ended. The same outcome is persisted as the
/// conversation status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed,
    WaitingUser,
    Failed,
}

impl TurnOutcome {
    pub fn status(self) -> ConversationStatus {
        match self {
            TurnOutcome::Completed => ConversationStatus::Completed,
            TurnOutcome::WaitingUser => ConversationStatus::WaitingUser,
            TurnOutcome::Failed => ConversationStatus::Failed,
        }
    }
}

/// Configuration problems found before the first step.
#[derive(Debug, Error)]
pub enum TurnSetupError {
    #[error("agent {0} does not exist")]
    AgentMissing(i64),
    #[error("agent {0} is disabled")]
    AgentDisabled(String),
    #[error("agent has no model provider configured")]
    NoProvider,
    #[error("model provider {0} does not exist")]
    ProviderMissing(i64),
    #[error("model provider {0} is disabled")]
    ProviderDisabled(String),
    #[error("model provider {0} has no API key configured")]
    MissingApiKey(String),
    #[error("could not create model client: {0}")]
    Client(#[from] ModelError),
}

struct TurnSetup {
    agent: AgentConfig,
    model: Arc<dyn ChatModel>,
    model_name: String,
    max_steps: u32,
}

/// Format of the observation message that feeds a tool result back to the model.
pub fn observation_message(tool: &str, result: &ToolResult) -> String {
    let mut text = format!(
        "[Tool Result]\nTool: {}\nStatus: {}\nOutput:\n{}",
        tool,
        if result.success { "success" } else { "failed" },
        result.output
    );
    if let Some(err) = result.error.as_deref().filter(|e| !e.is_empty()) {
        text.push_str(&format!("\nError: {}", err));
    }
    text
}

/// The reason-act loop. Each `run_turn` drives one conversation from its
/// current transcript until it completes, fails, needs the user, or runs out
/// of steps.
pub struct AgentBrain {
    store: Arc<dyn Store>,
    connector: Arc<dyn ModelConnector>,
    registry: Arc<ToolRegistry>,
    settings: AgentSettings,
}

impl AgentBrain {
    pub fn new(
        store: Arc<dyn Store>,
        connector: Arc<dyn ModelConnector>,
        registry: Arc<ToolRegistry>,
        settings: AgentSettings,
    ) -> Self {
        Self {
            store,
            connector,
            registry,
            settings,
        }
    }

    /// Never returns an error: every path ends in a persisted status.
    pub async fn run_turn(&self, conversation_id: i64) -> TurnOutcome {
        info!("Turn started for conversation {}", conversation_id);
        let outcome = match self.drive(conversation_id).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Turn for conversation {} aborted: {:#}", conversation_id, e);
                if let Err(e) = self
                    .fail(conversation_id, &format!("Internal error: {:#}", e))
                    .await
                {
                    error!(
                        "Could not record failure for conversation {}: {:#}",
                        conversation_id, e
                    );
                }
                TurnOutcome::Failed
            }
        };
        info!(
            "Turn finished for conversation {}: {}",
            conversation_id,
            outcome.status()
        );
        outcome
    }

    async fn fail(&self, conversation_id: i64, text: &str) -> Result<TurnOutcome> {
        self.store
            .append_message(conversation_id, Role::Assistant, text, MessageType::Error, &json!({}))
            .await?;
        self.finish(conversation_id, TurnOutcome::Failed).await
    }

    async fn finish(&self, conversation_id: i64, outcome: TurnOutcome) -> Result<TurnOutcome> {
        self.store
            .update_conversation_status(conversation_id, outcome.status())
            .await?;
        Ok(outcome)
    }

    async fn prepare(&self, conversation: &Conversation) -> Result<Result<TurnSetup, TurnSetupError>> {
        let Some(agent) = self.store.get_agent(conversation.agent_id).await? else {
            return Ok(Err(TurnSetupError::AgentMissing(conversation.agent_id)));
        };
        if !agent.enabled {
            return Ok(Err(TurnSetupError::AgentDisabled(agent.name)));
        }
        let Some(provider_id) = agent.provider_id else {
            return Ok(Err(TurnSetupError::NoProvider));
        };
        let Some(provider) = self.store.get_provider(provider_id).await? else {
            return Ok(Err(TurnSetupError::ProviderMissing(provider_id)));
        };
        if !provider.enabled {
            return Ok(Err(TurnSetupError::ProviderDisabled(provider.name)));
        }
        if provider.api_key.trim().is_empty() {
            return Ok(Err(TurnSetupError::MissingApiKey(provider.name)));
        }

        let model = match self.connector.connect(&provider) {
            Ok(model) => model,
            Err(e) => return Ok(Err(e.into())),
        };
        let model_name = match agent.model.trim() {
            "" => self.settings.default_model.clone(),
            name => name.to_string(),
        };
        let max_steps = agent.max_steps.unwrap_or(self.settings.max_steps);
        info!(
            "Agent {} uses provider {} ({}), model {}, budget {} steps",
            agent.name, provider.name, provider.base_url, model_name, max_steps
        );

        Ok(Ok(TurnSetup {
            agent,
            model,
            model_name,
            max_steps,
        }))
    }

    async fn drive(&self, conversation_id: i64) -> Result<TurnOutcome> {
        let conversation = self
            .store
            .get_conversation(conversation_id)
            .await?
            .ok_or_else(|| anyhow!("conversation {} does not exist", conversation_id))?;

        let setup = match self.prepare(&conversation).await? {
            Ok(setup) => setup,
            Err(e) => {
                warn!("Conversation {} cannot start: {}", conversation_id, e);
                return self.fail(conversation_id, &format!("Error: {}", e)).await;
            }
        };

        let executor = ToolExecutor::new(
            Arc::clone(&self.registry),
            setup.agent.working_dir.trim(),
        );
        let first_step = self.store.last_step_num(conversation_id).await? + 1;

        for offset in 0..i64::from(setup.max_steps) {
            let step_num = first_step + offset;

            let history = self.store.list_messages(conversation_id).await?;
            let request = ChatRequest {
                model: setup.model_name.clone(),
                messages: prompt::build_messages(&self.registry, &setup.agent, &history),
                temperature: self.settings.temperature,
                max_tokens: self.settings.max_tokens,
            };

            let reply = match setup.model.chat(&request).await {
                Ok(reply) => reply,
                Err(e) => {
                    error!("Model call failed for conversation {}: {}", conversation_id, e);
                    return self
                        .fail(conversation_id, &format!("Model call failed: {}", e))
                        .await;
                }
            };

            let action = match parse_action(&reply) {
                Ok(action) => action,
                Err(ParseError::NoAction) => {
                    warn!(
                        "Conversation {} step {}: reply has no action, waiting for user",
                        conversation_id, step_num
                    );
                    self.store
                        .append_message(
                            conversation_id,
                            Role::Assistant,
                            &reply,
                            MessageType::Text,
                            &json!({}),
                        )
                        .await?;
                    return self.finish(conversation_id, TurnOutcome::WaitingUser).await;
                }
            };

            info!(
                "Conversation {} step {}: {}",
                conversation_id, step_num, action.action
            );
            let step_id = self
                .store
                .append_step(
                    conversation_id,
                    step_num,
                    &action.thought,
                    &action.action,
                    action.raw_input(),
                )
                .await?;
            self.store
                .append_message(
                    conversation_id,
                    Role::Assistant,
                    &action.thought,
                    MessageType::Text,
                    &json!({"step_num": step_num, "action": action.action}),
                )
                .await?;

            match action.action.as_str() {
                TOOL_COMPLETE => {
                    let args: CompleteArgs = parse_control_args(&action.action_input);
                    self.store
                        .update_step(step_id, StepStatus::Success, &args.summary, "")
                        .await?;
                    self.store
                        .append_message(
                            conversation_id,
                            Role::Assistant,
                            &args.summary,
                            MessageType::Result,
                            &json!({}),
                        )
                        .await?;
                    return self.finish(conversation_id, TurnOutcome::Completed).await;
                }
                TOOL_ASK_USER => {
                    let args: AskUserArgs = parse_control_args(&action.action_input);
                    let metadata = if args.options.is_empty() {
                        json!({})
                    } else {
                        json!({"options": args.options})
                    };
                    self.store
                        .update_step(step_id, StepStatus::Success, &args.question, "")
                        .await?;
                    self.store
                        .append_message(
                            conversation_id,
                            Role::Assistant,
                            &args.question,
                            MessageType::Question,
                            &metadata,
                        )
                        .await?;
                    return self.finish(conversation_id, TurnOutcome::WaitingUser).await;
                }
                _ => {}
            }

            let result = executor.execute(&action.action, &action.action_input).await;
            let status = if result.success {
                StepStatus::Success
            } else {
                StepStatus::Failed
            };
            self.store
                .update_step(
                    step_id,
                    status,
                    &result.output,
                    result.error.as_deref().unwrap_or_default(),
                )
                .await?;
            self.store
                .append_message(
                    conversation_id,
                    Role::System,
                    &observation_message(&action.action, &result),
                    MessageType::Result,
                    &json!({
                        "step_num": step_num,
                        "tool": action.action,
                        "success": result.success
                    }),
                )
                .await?;

            if result.is_completed {
                return self.finish(conversation_id, TurnOutcome::Completed).await;
            }
            if result.needs_user {
                return self.finish(conversation_id, TurnOutcome::WaitingUser).await;
            }
        }

        warn!(
            "Conversation {} exhausted its budget of {} steps",
            conversation_id, setup.max_steps
        );
        self.fail(
            conversation_id,
            &format!(
                "Reached the maximum step limit ({}); task aborted",
                setup.max_steps
            ),
        )
        .await
    }
}
