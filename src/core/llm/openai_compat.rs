use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{ChatModel, ChatRequest, ModelError};

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
    error: Option<ApiErrorBody>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
}

/// Client for any endpoint speaking the OpenAI chat-completions dialect
/// (DeepSeek, DashScope compatible mode, Volcengine Ark, ...).
pub struct OpenAiCompatClient {
    endpoint: String,
    api_key: String,
    client: Client,
}

impl OpenAiCompatClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, ModelError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| ModelError::Transport {
                url: base_url.to_string(),
                source,
            })?;
        Ok(Self::with_http_client(base_url, api_key, client))
    }

    pub fn with_http_client(base_url: &str, api_key: &str, client: Client) -> Self {
        Self {
            endpoint: completions_url(base_url),
            api_key: api_key.to_string(),
            client,
        }
    }
}

fn completions_url(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

#[async_trait]
impl ChatModel for OpenAiCompatClient {
    async fn chat(&self, request: &ChatRequest) -> Result<String, ModelError> {
        debug!(
            "POST {} model={} messages={}",
            self.endpoint,
            request.model,
            request.messages.len()
        );
        let res = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(request)
            .send()
            .await
            .map_err(|source| ModelError::Transport {
                url: self.endpoint.clone(),
                source,
            })?;

        let status = res.status();
        let body = res.text().await.map_err(|source| ModelError::Transport {
            url: self.endpoint.clone(),
            source,
        })?;

        let parsed = serde_json::from_str::<CompletionResponse>(&body);
        if let Ok(CompletionResponse {
            error: Some(err), ..
        }) = &parsed
        {
            return Err(ModelError::Api(err.message.clone()));
        }
        if !status.is_success() {
            return Err(ModelError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let parsed = parsed.map_err(|e| ModelError::Decode(e.to_string()))?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or(ModelError::EmptyChoices)?;
        Ok(choice.message.content.unwrap_or_default())
    }
}
