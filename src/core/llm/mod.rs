pub mod openai_compat;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::core::config::AgentSettings;
use crate::core::store::ProviderConfig;

pub use openai_compat::OpenAiCompatClient;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }
}

/// Body of one chat-completion call.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
    pub max_tokens: u32,
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("model endpoint returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("could not decode model response: {0}")]
    Decode(String),
    #[error("model API error: {0}")]
    Api(String),
    #[error("model response contained no choices")]
    EmptyChoices,
}

/// One request/response cycle against a chat-completion backend.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn chat(&self, request: &ChatRequest) -> Result<String, ModelError>;
}

/// Builds a `ChatModel` for a provider record. The execution loop goes
/// through this seam so tests can swap in scripted models.
pub trait ModelConnector: Send + Sync {
    fn connect(&self, provider: &ProviderConfig) -> Result<Arc<dyn ChatModel>, ModelError>;
}

/// Connects to OpenAI-compatible HTTP endpoints.
pub struct HttpConnector {
    timeout: Duration,
}

impl HttpConnector {
    pub fn new(settings: &AgentSettings) -> Self {
        Self {
            timeout: settings.request_timeout(),
        }
    }
}

impl ModelConnector for HttpConnector {
    fn connect(&self, provider: &ProviderConfig) -> Result<Arc<dyn ChatModel>, ModelError> {
        let client = OpenAiCompatClient::new(&provider.base_url, &provider.api_key, self.timeout)?;
        Ok(Arc::new(client))
    }
}
