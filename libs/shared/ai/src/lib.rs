//! Chat-completion contract shared by the specialty recommender and the
//! visit-report pipeline, with an OpenAI-compatible HTTP implementation.

pub mod client;
pub mod resilient;

pub use client::{AiError, ChatCompletionClient, CompletionClient, CompletionRequest};
pub use resilient::RetryingClient;

#[cfg(test)]
pub use client::MockCompletionClient;
