//! Environment-driven configuration
//!
//! Values come from the process environment (after `.env` is loaded by the
//! binary). Missing variables fall back to defaults; present but unparsable
//! values are a `Config` error.

use crate::assembler::SanitizeMode;
use crate::error::{PipelineError, Result};
use crate::prompt::{DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE};
use crate::provider::deepseek::{DEFAULT_DEEPSEEK_API_URL, DEFAULT_DEEPSEEK_MODEL};
use crate::provider::ollama::{DEFAULT_OLLAMA_ENDPOINT, DEFAULT_OLLAMA_MODEL};
use crate::queue::DEFAULT_BLOCK_TIMEOUT;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
pub const DEFAULT_AI_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_ARTICLE_MIN_LENGTH: usize = 1500;
pub const DEFAULT_ARTICLE_MAX_LENGTH: usize = 3000;

#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub redis_url: String,
    pub block_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct AiConfig {
    /// No key means DeepSeek is skipped and Ollama runs alone
    pub deepseek_api_key: Option<String>,
    pub deepseek_api_url: String,
    pub deepseek_model: String,
    pub ollama_endpoint: String,
    pub ollama_model: String,
    /// Per-attempt timeout
    pub timeout: Duration,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Clone)]
pub struct ContentConfig {
    pub article_min_length: usize,
    pub article_max_length: usize,
    pub sanitize: SanitizeMode,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub queue: QueueConfig,
    pub ai: AiConfig,
    pub content: ContentConfig,
}

impl AppConfig {
    /// Load from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let queue = QueueConfig {
            redis_url: get("REDIS_URL").unwrap_or_else(|| DEFAULT_REDIS_URL.to_string()),
            block_timeout: parse_or(
                "QUEUE_BLOCK_TIMEOUT",
                get("QUEUE_BLOCK_TIMEOUT"),
                DEFAULT_BLOCK_TIMEOUT.as_secs(),
            )
            .map(Duration::from_secs)?,
        };

        let ai = AiConfig {
            deepseek_api_key: get("AI_DEEPSEEK_API_KEY"),
            deepseek_api_url: get("AI_DEEPSEEK_API_URL")
                .unwrap_or_else(|| DEFAULT_DEEPSEEK_API_URL.to_string()),
            deepseek_model: get("AI_DEEPSEEK_MODEL")
                .unwrap_or_else(|| DEFAULT_DEEPSEEK_MODEL.to_string()),
            ollama_endpoint: get("AI_OLLAMA_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_OLLAMA_ENDPOINT.to_string()),
            ollama_model: get("AI_OLLAMA_MODEL").unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string()),
            timeout: parse_or("AI_TIMEOUT", get("AI_TIMEOUT"), DEFAULT_AI_TIMEOUT.as_secs())
                .map(Duration::from_secs)?,
            max_tokens: parse_or("AI_MAX_TOKENS", get("AI_MAX_TOKENS"), DEFAULT_MAX_TOKENS)?,
            temperature: parse_or("AI_TEMPERATURE", get("AI_TEMPERATURE"), DEFAULT_TEMPERATURE)?,
        };

        let content = ContentConfig {
            article_min_length: parse_or(
                "ARTICLE_MIN_LENGTH",
                get("ARTICLE_MIN_LENGTH"),
                DEFAULT_ARTICLE_MIN_LENGTH,
            )?,
            article_max_length: parse_or(
                "ARTICLE_MAX_LENGTH",
                get("ARTICLE_MAX_LENGTH"),
                DEFAULT_ARTICLE_MAX_LENGTH,
            )?,
            sanitize: match get("ARTICLE_SANITIZE") {
                Some(raw) => raw
                    .parse::<SanitizeMode>()
                    .map_err(|e| PipelineError::Config(format!("ARTICLE_SANITIZE: {}", e)))?,
                None => SanitizeMode::default(),
            },
        };

        for endpoint in [&queue.redis_url, &ai.deepseek_api_url, &ai.ollama_endpoint] {
            url::Url::parse(endpoint)?;
        }

        if content.article_min_length > content.article_max_length {
            return Err(PipelineError::Config(format!(
                "ARTICLE_MIN_LENGTH ({}) exceeds ARTICLE_MAX_LENGTH ({})",
                content.article_min_length, content.article_max_length
            )));
        }

        Ok(Self { queue, ai, content })
    }
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(value) => value
            .parse::<T>()
            .map_err(|e| PipelineError::Config(format!("{}={:?}: {}", key, value, e))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tokio_test::{assert_err, assert_ok};

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = assert_ok!(AppConfig::from_lookup(lookup(&[])));
        assert_eq!(config.queue.redis_url, DEFAULT_REDIS_URL);
        assert_eq!(config.queue.block_timeout, DEFAULT_BLOCK_TIMEOUT);
        assert!(config.ai.deepseek_api_key.is_none());
        assert_eq!(config.ai.timeout, DEFAULT_AI_TIMEOUT);
        assert_eq!(config.ai.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(config.content.sanitize, SanitizeMode::Unicode);
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("REDIS_URL", "redis://cache:6380"),
            ("QUEUE_BLOCK_TIMEOUT", "2"),
            ("AI_DEEPSEEK_API_KEY", "sk-test"),
            ("AI_TIMEOUT", "30"),
            ("AI_TEMPERATURE", "0.3"),
            ("ARTICLE_MIN_LENGTH", "500"),
            ("ARTICLE_MAX_LENGTH", "900"),
            ("ARTICLE_SANITIZE", "latin1"),
        ]))
        .unwrap();

        assert_eq!(config.queue.redis_url, "redis://cache:6380");
        assert_eq!(config.queue.block_timeout, Duration::from_secs(2));
        assert_eq!(config.ai.deepseek_api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.ai.timeout, Duration::from_secs(30));
        assert_eq!(config.ai.temperature, 0.3);
        assert_eq!(config.content.article_min_length, 500);
        assert_eq!(config.content.sanitize, SanitizeMode::Latin1);
    }

    #[test]
    fn test_blank_values_use_defaults() {
        let config = AppConfig::from_lookup(lookup(&[("AI_DEEPSEEK_API_KEY", "  ")])).unwrap();
        assert!(config.ai.deepseek_api_key.is_none());
    }

    #[test]
    fn test_invalid_number_is_config_error() {
        let err = AppConfig::from_lookup(lookup(&[("AI_MAX_TOKENS", "lots")])).unwrap_err();
        assert!(matches!(err, PipelineError::Config(msg) if msg.contains("AI_MAX_TOKENS")));
    }

    #[test]
    fn test_malformed_endpoint_is_rejected() {
        let err = assert_err!(AppConfig::from_lookup(lookup(&[(
            "AI_OLLAMA_ENDPOINT",
            "not a url"
        )])));
        assert!(matches!(err, PipelineError::UrlParse(_)));
    }

    #[test]
    fn test_min_above_max_rejected() {
        let err = AppConfig::from_lookup(lookup(&[
            ("ARTICLE_MIN_LENGTH", "5000"),
            ("ARTICLE_MAX_LENGTH", "100"),
        ]))
        .unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }
}
