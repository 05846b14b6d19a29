//! Generation orchestrator: primary provider with a single fallback

use crate::error::{PipelineError, Result};
use crate::provider::{ContentProvider, GenerationRequest, ProviderError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Default per-attempt timeout
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(120);

/// Outcome of one provider attempt
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Success,
    Failed(String),
}

/// One provider call, as recorded by the orchestrator
#[derive(Debug, Clone)]
pub struct Attempt {
    pub provider: String,
    pub duration: Duration,
    pub outcome: AttemptOutcome,
}

/// Generated text and how it was obtained
#[derive(Debug, Clone)]
pub struct Generation {
    pub text: String,
    pub provider: String,
    pub attempts: Vec<Attempt>,
}

/// Calls the primary provider and falls back to the secondary once
pub struct GenerationOrchestrator {
    primary: Arc<dyn ContentProvider>,
    secondary: Option<Arc<dyn ContentProvider>>,
    attempt_timeout: Duration,
}

impl GenerationOrchestrator {
    pub fn new(
        primary: Arc<dyn ContentProvider>,
        secondary: Option<Arc<dyn ContentProvider>>,
        attempt_timeout: Duration,
    ) -> Self {
        Self {
            primary,
            secondary,
            attempt_timeout,
        }
    }

    pub fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }

    /// Generate with the configured per-attempt timeout
    pub async fn generate(&self, request: &GenerationRequest) -> Result<Generation> {
        self.generate_with_timeout(request, self.attempt_timeout).await
    }

    /// Generate, bounding each provider attempt by `per_attempt`
    ///
    /// At most one attempt per configured provider. Retries inside a provider
    /// client are that client's business.
    pub async fn generate_with_timeout(
        &self,
        request: &GenerationRequest,
        per_attempt: Duration,
    ) -> Result<Generation> {
        let mut attempts = Vec::with_capacity(2);
        let providers = std::iter::once(&self.primary).chain(self.secondary.iter());

        let mut last_error = None;
        for provider in providers {
            match self.attempt(provider.as_ref(), request, per_attempt, &mut attempts).await {
                Ok(text) => {
                    return Ok(Generation {
                        text,
                        provider: provider.name().to_string(),
                        attempts,
                    });
                }
                Err(e) => last_error = Some(e),
            }
        }

        let last_error = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no provider configured".to_string());
        Err(PipelineError::GenerationFailed {
            attempts: attempts.len(),
            last_error,
        })
    }

    async fn attempt(
        &self,
        provider: &dyn ContentProvider,
        request: &GenerationRequest,
        per_attempt: Duration,
        attempts: &mut Vec<Attempt>,
    ) -> Result<String> {
        let name = provider.name().to_string();
        let started = Instant::now();

        let result = match tokio::time::timeout(per_attempt, provider.generate(request)).await {
            Ok(Ok(text)) if text.trim().is_empty() => Err(ProviderError::EmptyResponse),
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(per_attempt)),
        };
        let duration = started.elapsed();

        match result {
            Ok(text) => {
                info!(
                    provider = %name,
                    duration_ms = duration.as_millis() as u64,
                    chars = text.chars().count(),
                    "Provider attempt succeeded"
                );
                attempts.push(Attempt {
                    provider: name,
                    duration,
                    outcome: AttemptOutcome::Success,
                });
                Ok(text)
            }
            Err(source) => {
                warn!(
                    provider = %name,
                    duration_ms = duration.as_millis() as u64,
                    error = %source,
                    "Provider attempt failed"
                );
                attempts.push(Attempt {
                    provider: name.clone(),
                    duration,
                    outcome: AttemptOutcome::Failed(source.to_string()),
                });
                Err(PipelineError::Provider {
                    provider: name,
                    source,
                })
            }
        }
    }
}
