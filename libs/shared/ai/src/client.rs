use async_trait::async_trait;
use reqwest::{header, Client};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, error};

use shared_config::AppConfig;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("AI service is not configured")]
    NotConfigured,

    #[error("AI service returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("AI transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Malformed AI response: {0}")]
    MalformedResponse(String),

    #[error("AI call timed out after {attempts} attempt(s)")]
    Timeout { attempts: u32 },

    #[error("AI call failed after {attempts} attempt(s): {message}")]
    Exhausted { attempts: u32, message: String },
}

impl AiError {
    pub fn is_transient(&self) -> bool {
        match self {
            AiError::Transport(_) | AiError::MalformedResponse(_) => true,
            AiError::Http { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            temperature: 0.2,
            max_tokens: 1000,
        }
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Returns the assistant message text for one chat turn.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, AiError>;
}

/// Single-attempt client for `/chat/completions` on an OpenAI-compatible API.
pub struct ChatCompletionClient {
    http_client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl ChatCompletionClient {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.ai_api_base_url, &config.ai_api_key, &config.ai_model)
    }
}

#[async_trait]
impl CompletionClient for ChatCompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, AiError> {
        if self.api_key.is_empty() {
            return Err(AiError::NotConfigured);
        }

        let payload = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": request.user }
            ],
            "temperature": request.temperature,
            "max_tokens": request.max_tokens
        });

        debug!("Calling chat completion model {}", self.model);

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(header::CONTENT_TYPE, "application/json")
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("AI API error ({}): {}", status, body);
            return Err(AiError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let ai_response: Value = response
            .json()
            .await
            .map_err(|e| AiError::MalformedResponse(e.to_string()))?;

        let content = ai_response["choices"][0]["message"]["content"]
            .as_str()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .ok_or_else(|| AiError::MalformedResponse("missing choices[0].message.content".to_string()))?;

        Ok(content.to_string())
    }
}
