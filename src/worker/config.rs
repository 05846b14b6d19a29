//! Worker configuration

use crate::assembler::SanitizeMode;
use crate::config::{AppConfig, DEFAULT_ARTICLE_MAX_LENGTH, DEFAULT_ARTICLE_MIN_LENGTH};
use crate::prompt::{DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE};
use std::time::Duration;

/// Disambiguated slug variants tried after the base slug
pub const DEFAULT_SLUG_ATTEMPTS: usize = 5;

/// Worker configuration
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Upper bound for one task, generation and commit included
    pub task_timeout: Duration,

    /// Pause after a queue store error before dequeuing again
    pub error_backoff: Duration,

    /// Storage filter for assembled text
    pub sanitize: SanitizeMode,

    /// Target article length passed to the prompt
    pub article_min_length: usize,
    pub article_max_length: usize,

    pub temperature: f32,
    pub max_tokens: u32,

    pub slug_attempts: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            task_timeout: Duration::from_secs(300), // 5 minutes
            error_backoff: Duration::from_secs(10),
            sanitize: SanitizeMode::default(),
            article_min_length: DEFAULT_ARTICLE_MIN_LENGTH,
            article_max_length: DEFAULT_ARTICLE_MAX_LENGTH,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            slug_attempts: DEFAULT_SLUG_ATTEMPTS,
        }
    }
}

impl WorkerConfig {
    /// Create a new config builder
    pub fn builder() -> WorkerConfigBuilder {
        WorkerConfigBuilder::default()
    }

    /// Builder seeded with the content and AI settings of an `AppConfig`
    pub fn from_app(app: &AppConfig) -> WorkerConfigBuilder {
        WorkerConfig::builder()
            .sanitize(app.content.sanitize)
            .article_length(app.content.article_min_length, app.content.article_max_length)
            .temperature(app.ai.temperature)
            .max_tokens(app.ai.max_tokens)
    }
}

/// Builder for WorkerConfig
#[derive(Default)]
pub struct WorkerConfigBuilder {
    config: WorkerConfig,
}

impl WorkerConfigBuilder {
    /// Set task timeout
    pub fn task_timeout(mut self, duration: Duration) -> Self {
        self.config.task_timeout = duration;
        self
    }

    /// Set task timeout in seconds
    pub fn task_timeout_secs(mut self, secs: u64) -> Self {
        self.config.task_timeout = Duration::from_secs(secs);
        self
    }

    /// Set the pause after queue store errors
    pub fn error_backoff(mut self, duration: Duration) -> Self {
        self.config.error_backoff = duration;
        self
    }

    pub fn sanitize(mut self, mode: SanitizeMode) -> Self {
        self.config.sanitize = mode;
        self
    }

    pub fn article_length(mut self, min: usize, max: usize) -> Self {
        self.config.article_min_length = min;
        self.config.article_max_length = max;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.config.max_tokens = max_tokens;
        self
    }

    pub fn slug_attempts(mut self, attempts: usize) -> Self {
        self.config.slug_attempts = attempts;
        self
    }

    /// Build the config
    pub fn build(self) -> WorkerConfig {
        self.config
    }
}
