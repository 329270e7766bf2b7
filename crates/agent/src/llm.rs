use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use chantier_core::config::LlmConfig;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("llm transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("llm returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("llm completion envelope is malformed: {0}")]
    Malformed(String),
    #[error("llm completion is empty")]
    EmptyCompletion,
}

/// One system + user exchange. Every call in this crate is single-shot.
#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Text content of the first choice.
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError>;
}

/// Chat-completions client for any OpenAI-compatible endpoint (`{base}/chat/completions`).
pub struct OpenAiCompatibleClient {
    http: Client,
    base_url: String,
    api_key: SecretString,
}

impl OpenAiCompatibleClient {
    pub fn new(
        base_url: &str,
        api_key: SecretString,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_string(), api_key })
    }

    /// `None` when no api key is configured. `quote` selects the longer quote timeout.
    pub fn from_config(config: &LlmConfig, quote: bool) -> Result<Option<Self>, LlmError> {
        let Some(api_key) = config.api_key.clone().filter(|_| config.is_configured()) else {
            return Ok(None);
        };
        let timeout = if quote { config.quote_timeout() } else { config.timeout() };
        Self::new(&config.base_url, api_key, timeout).map(Some)
    }
}

#[derive(Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatBody {
            model: &request.model,
            messages: [
                ChatMessage { role: "system", content: &request.system },
                ChatMessage { role: "user", content: &request.user },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        debug!(event_name = "llm.request", model = %request.model, url = %url, "calling llm");
        let response = self
            .http
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                event_name = "llm.status_error",
                model = %request.model,
                status = status.as_u16(),
                "llm returned non-success status"
            );
            return Err(LlmError::Status { status: status.as_u16(), body });
        }

        let completion: ChatCompletion =
            response.json().await.map_err(|error| LlmError::Malformed(error.to_string()))?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(LlmError::EmptyCompletion)
    }
}
