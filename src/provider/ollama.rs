//! Ollama provider (local models via `/api/generate`)

use crate::provider::{ContentProvider, GenerationRequest, ProviderError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Default Ollama API endpoint
pub const DEFAULT_OLLAMA_ENDPOINT: &str = "http://localhost:11434/api";

/// Default local model
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3";

#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    response: String,
}

/// Ollama generate-API client
pub struct OllamaProvider {
    client: Client,
    endpoint: String,
    model: String,
}

impl OllamaProvider {
    /// Create a new provider
    ///
    /// # Arguments
    /// * `endpoint` - API root, e.g. `http://localhost:11434/api`
    /// * `model` - Model name, e.g. `llama3`
    /// * `request_timeout` - Transport-level timeout for one request
    pub fn new(endpoint: &str, model: &str, request_timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ProviderError::Config(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    fn generate_url(&self) -> String {
        format!("{}/generate", self.endpoint)
    }
}

#[async_trait]
impl ContentProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, ProviderError> {
        let url = self.generate_url();
        let body = OllamaRequest {
            model: &self.model,
            prompt: &request.prompt,
            system: &request.system,
            stream: false,
            options: OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Transport(format!("request to {} timed out", url))
                } else {
                    ProviderError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        let parsed: OllamaResponse =
            serde_json::from_slice(&bytes).map_err(|e| ProviderError::Parse(e.to_string()))?;

        debug!("Ollama returned {} chars", parsed.response.len());
        if parsed.response.trim().is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        Ok(parsed.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_url_trims_trailing_slash() {
        let provider =
            OllamaProvider::new("http://localhost:11434/api/", "llama3", Duration::from_secs(5))
                .unwrap();
        assert_eq!(provider.generate_url(), "http://localhost:11434/api/generate");
    }

    #[test]
    fn test_request_body_shape() {
        let body = OllamaRequest {
            model: "llama3",
            prompt: "p",
            system: "s",
            stream: false,
            options: OllamaOptions {
                temperature: 0.5,
                num_predict: 100,
            },
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["stream"], false);
        assert_eq!(value["options"]["num_predict"], 100);
    }

    #[test]
    fn test_response_tolerates_extra_fields() {
        let parsed: OllamaResponse = serde_json::from_str(
            r#"{"model":"llama3","created_at":"now","response":"hello","done":true}"#,
        )
        .unwrap();
        assert_eq!(parsed.response, "hello");
    }
}
