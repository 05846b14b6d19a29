//! Content providers
//!
//! A provider turns a prompt into raw generated text. The orchestrator only
//! sees the `ContentProvider` trait, so backends can be swapped or faked.

pub mod deepseek;
pub mod ollama;

pub use deepseek::DeepSeekProvider;
pub use ollama::OllamaProvider;

use async_trait::async_trait;
use std::time::Duration;

/// Error type for a single provider call
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("request failed: {0}")]
    Transport(String),

    #[error("API error ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("API error: {0}")]
    Api(String),

    #[error("response parse error: {0}")]
    Parse(String),

    #[error("empty response")]
    EmptyResponse,

    #[error("configuration error: {0}")]
    Config(String),
}

/// What to generate
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub system: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[async_trait]
pub trait ContentProvider: Send + Sync {
    /// Short name used in logs and generation records
    fn name(&self) -> &str;

    /// Generate text for the request; an empty answer is an error
    async fn generate(&self, request: &GenerationRequest) -> Result<String, ProviderError>;
}
