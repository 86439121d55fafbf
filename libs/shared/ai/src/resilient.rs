use std::sync::Arc;

use async_trait::async_trait;

use shared_config::AppConfig;
use shared_utils::{RetryError, RetryPolicy};

use crate::client::{AiError, CompletionClient, CompletionRequest};

/// Applies a per-attempt timeout and bounded exponential backoff to any client.
pub struct RetryingClient {
    inner: Arc<dyn CompletionClient>,
    policy: RetryPolicy,
}

impl RetryingClient {
    pub fn new(inner: Arc<dyn CompletionClient>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn from_config(inner: Arc<dyn CompletionClient>, config: &AppConfig) -> Self {
        let policy = RetryPolicy::new(config.ai_max_retries, config.ai_retry_base_delay())
            .with_timeout(config.ai_timeout());
        Self::new(inner, policy)
    }
}

#[async_trait]
impl CompletionClient for RetryingClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, AiError> {
        let inner = &self.inner;
        self.policy
            .run("chat completion", AiError::is_transient, move || inner.complete(request))
            .await
            .map_err(|e| match e {
                RetryError::TimedOut { attempts, .. } => AiError::Timeout { attempts },
                RetryError::Exhausted { attempts: 1, last_error, .. } => last_error,
                RetryError::Exhausted { attempts, last_error, .. } => AiError::Exhausted {
                    attempts,
                    message: last_error.to_string(),
                },
            })
    }
}
