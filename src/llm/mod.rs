//! Chat-completion provider seam.
//!
//! The router talks to a [`ChatModel`] trait object so tests can substitute a
//! scripted model and the production wiring can point at any
//! OpenAI-compatible endpoint.

pub mod external;
pub mod prompts;

use async_trait::async_trait;
use thiserror::Error;

pub use external::OpenAiCompatProvider;

#[derive(Debug, Error)]
pub enum LlmError {
    /// The request exceeded the configured deadline. Surfaced to users with
    /// a dedicated message since a retry usually succeeds.
    #[error("chat completion timed out")]
    Timeout,

    #[error("chat completion failed: {0}")]
    Api(String),
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError>;
}
