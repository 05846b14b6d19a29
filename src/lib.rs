//! Article Builder - A Rust worker that turns queued keywords into SEO articles
//!
//! Producers enqueue generation tasks into a Redis-backed queue. A single
//! worker drains the queue, asks a content provider (DeepSeek, falling back
//! to Ollama) for a Markdown article, assembles title/slug/summary from the
//! raw text and commits the result to PostgreSQL.
//!
//! Task status is kept next to the queue, readable for 24 hours:
//! - `article:queue` - pending task payloads
//! - `article:set` - every known task id
//! - `task:<id>` - latest status of one task

pub mod assembler;
pub mod config;
pub mod db;
pub mod error;
pub mod orchestrator;
pub mod prompt;
pub mod provider;
pub mod queue;
pub mod worker;

pub use assembler::{assemble, AssembledArticle, SanitizeMode};
pub use config::AppConfig;
pub use error::{PipelineError, Result};
pub use orchestrator::{Generation, GenerationOrchestrator};
pub use queue::{TaskQueue, TaskRecord, TaskStatus};

use crate::config::{AiConfig, QueueConfig};
use crate::provider::{ContentProvider, DeepSeekProvider, OllamaProvider};
use crate::queue::RedisQueueStore;
use std::sync::Arc;
use tracing::{info, warn};

/// Build the provider chain from AI settings
///
/// DeepSeek is primary when an API key is configured, with Ollama as the
/// fallback. Without a key Ollama runs alone.
pub fn build_orchestrator(ai: &AiConfig) -> Result<GenerationOrchestrator> {
    let ollama: Arc<dyn ContentProvider> = Arc::new(
        OllamaProvider::new(&ai.ollama_endpoint, &ai.ollama_model, ai.timeout).map_err(|e| {
            PipelineError::Config(format!("Failed to build Ollama client: {}", e))
        })?,
    );

    let orchestrator = match &ai.deepseek_api_key {
        Some(key) => {
            info!(
                "Providers: deepseek ({}) -> ollama ({})",
                ai.deepseek_model, ai.ollama_model
            );
            let deepseek: Arc<dyn ContentProvider> = Arc::new(DeepSeekProvider::new(
                key,
                &ai.deepseek_api_url,
                &ai.deepseek_model,
            ));
            GenerationOrchestrator::new(deepseek, Some(ollama), ai.timeout)
        }
        None => {
            warn!("AI_DEEPSEEK_API_KEY not set - using Ollama only");
            GenerationOrchestrator::new(ollama, None, ai.timeout)
        }
    };

    Ok(orchestrator)
}

/// Connect the task queue to Redis
///
/// # Example
/// ```ignore
/// use article_builder::{connect_queue, AppConfig};
///
/// #[tokio::main]
/// async fn main() -> article_builder::Result<()> {
///     let config = AppConfig::from_env()?;
///     let queue = connect_queue(&config.queue).await?;
///
///     let ids = queue.batch_enqueue(&[1, 2, 3], &[10], Some(42)).await;
///     for id in ids {
///         println!("{:?}", id);
///     }
///     Ok(())
/// }
/// ```
pub async fn connect_queue(config: &QueueConfig) -> Result<TaskQueue> {
    let store = RedisQueueStore::connect(&config.redis_url).await?;
    store.ping().await?;
    info!("Connected to Redis at {}", redact_url(&config.redis_url));

    Ok(TaskQueue::new(Arc::new(store)).with_block_timeout(config.block_timeout))
}

/// Hide the password part of a connection URL for logging
fn redact_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) if parsed.password().is_some() => {
            let _ = parsed.set_password(Some("***"));
            parsed.to_string()
        }
        Ok(parsed) => parsed.to_string(),
        Err(_) => "<invalid url>".to_string(),
    }
}
