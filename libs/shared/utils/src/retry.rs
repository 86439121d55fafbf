use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::{error, warn};

/// Bounded retry with exponential backoff and an optional per-attempt timeout.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub attempt_timeout: Option<Duration>,
}

#[derive(Debug, Error)]
pub enum RetryError<E> {
    #[error("{operation} timed out after {attempts} attempt(s)")]
    TimedOut { operation: String, attempts: u32 },

    #[error("{operation} failed after {attempts} attempt(s): {last_error}")]
    Exhausted {
        operation: String,
        attempts: u32,
        last_error: E,
    },
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(250),
            attempt_timeout: None,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            attempt_timeout: None,
        }
    }

    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    /// Delay before retry number `retry` (1-based): base, 2*base, 4*base, ...
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }

    /// Runs `attempt` until it succeeds, fails with a non-transient error, or the
    /// retry budget is spent. Timeouts always count as transient.
    pub async fn run<T, E, F, Fut, P>(
        &self,
        operation: &str,
        is_transient: P,
        mut attempt: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let total_attempts = self.max_retries + 1;
        let mut attempts = 0;

        loop {
            attempts += 1;

            let outcome = match self.attempt_timeout {
                Some(limit) => tokio::time::timeout(limit, attempt()).await.ok(),
                None => Some(attempt().await),
            };

            let retryable = match outcome {
                Some(Ok(value)) => return Ok(value),
                Some(Err(e)) => {
                    if !is_transient(&e) || attempts >= total_attempts {
                        if attempts > 1 {
                            error!("{} failed after {} attempt(s): {}", operation, attempts, e);
                        }
                        return Err(RetryError::Exhausted {
                            operation: operation.to_string(),
                            attempts,
                            last_error: e,
                        });
                    }
                    warn!("{} attempt {}/{} failed: {}", operation, attempts, total_attempts, e);
                    true
                }
                None => {
                    if attempts >= total_attempts {
                        error!("{} timed out after {} attempt(s)", operation, attempts);
                        return Err(RetryError::TimedOut {
                            operation: operation.to_string(),
                            attempts,
                        });
                    }
                    warn!("{} attempt {}/{} timed out", operation, attempts, total_attempts);
                    true
                }
            };

            if retryable {
                tokio::time::sleep(self.delay_for(attempts)).await;
            }
        }
    }
}
