//! Generative text provider boundary
//!
//! The quiz service only needs "prompt in, text out". `GenerationProvider`
//! is that seam; `llm::LlmClient` implements it over an OpenAI-compatible
//! chat-completions API.

pub mod llm;

use crate::error::GenerationError;

pub use llm::{LlmClient, ProviderConfig};

/// A service that turns a prompt into text
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Generate text for `prompt`, producing at most `max_tokens` tokens
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String, GenerationError>;
}
