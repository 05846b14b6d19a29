//! Error types for article-builder

use crate::provider::ProviderError;
use crate::queue::TaskStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Queue store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Failed to serialize task: {0}")]
    Serialization(String),

    #[error("Failed to deserialize task payload: {0}")]
    Deserialization(String),

    #[error("Task not found: {0}")]
    NotFound(String),

    #[error("Task status expired: {0}")]
    Expired(String),

    #[error("Invalid task: {0}")]
    InvalidTask(String),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },

    #[error("Keyword not found: {0}")]
    KeywordNotFound(i64),

    #[error("Provider {provider} failed: {source}")]
    Provider {
        provider: String,
        #[source]
        source: ProviderError,
    },

    #[error("Content generation failed after {attempts} attempts (last error: {last_error})")]
    GenerationFailed { attempts: usize, last_error: String },

    #[error("Database error: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("No free slug available for: {0}")]
    SlugExhausted(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Task timeout")]
    TaskTimeout,
}

impl From<redis::RedisError> for PipelineError {
    fn from(err: redis::RedisError) -> Self {
        PipelineError::StoreUnavailable(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
