//! DeepSeek provider over the OpenAI-compatible chat completions API

use crate::provider::{ContentProvider, GenerationRequest, ProviderError};
use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use tracing::debug;

/// Default DeepSeek API base
pub const DEFAULT_DEEPSEEK_API_URL: &str = "https://api.deepseek.com/v1";

/// Default chat model
pub const DEFAULT_DEEPSEEK_MODEL: &str = "deepseek-chat";

/// DeepSeek chat completion client
pub struct DeepSeekProvider {
    client: Client<OpenAIConfig>,
    model: String,
}

impl DeepSeekProvider {
    /// Create a new provider
    ///
    /// # Arguments
    /// * `api_key` - DeepSeek API key
    /// * `api_base` - API base URL, e.g. `https://api.deepseek.com/v1`
    /// * `model` - Model name, e.g. `deepseek-chat`
    pub fn new(api_key: &str, api_base: &str, model: &str) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(api_base.trim_end_matches('/'));
        Self {
            client: Client::with_config(config),
            model: model.to_string(),
        }
    }
}

fn map_openai_error(err: OpenAIError) -> ProviderError {
    match err {
        OpenAIError::Reqwest(e) => ProviderError::Transport(e.to_string()),
        OpenAIError::ApiError(api) => ProviderError::Api(api.message),
        OpenAIError::JSONDeserialize(e) => ProviderError::Parse(e.to_string()),
        OpenAIError::InvalidArgument(msg) => ProviderError::Config(msg),
        other => ProviderError::Api(other.to_string()),
    }
}

#[async_trait]
impl ContentProvider for DeepSeekProvider {
    fn name(&self) -> &str {
        "deepseek"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, ProviderError> {
        let chat_request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(vec![
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(request.system.as_str())
                    .build()
                    .map_err(map_openai_error)?
                    .into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content(request.prompt.as_str())
                    .build()
                    .map_err(map_openai_error)?
                    .into(),
            ])
            .temperature(request.temperature)
            .max_tokens(request.max_tokens)
            .build()
            .map_err(map_openai_error)?;

        let response = self
            .client
            .chat()
            .create(chat_request)
            .await
            .map_err(map_openai_error)?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        debug!("DeepSeek returned {} chars", content.len());
        if content.trim().is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_name() {
        let provider = DeepSeekProvider::new("key", DEFAULT_DEEPSEEK_API_URL, DEFAULT_DEEPSEEK_MODEL);
        assert_eq!(provider.name(), "deepseek");
    }

    #[tokio::test]
    #[ignore] // Requires API key
    async fn test_generate_live() {
        dotenvy::dotenv().ok();
        let key = std::env::var("AI_DEEPSEEK_API_KEY").unwrap();
        let provider = DeepSeekProvider::new(&key, DEFAULT_DEEPSEEK_API_URL, DEFAULT_DEEPSEEK_MODEL);
        let text = provider
            .generate(&GenerationRequest {
                prompt: "Write one sentence about tea.".to_string(),
                system: "You are a concise writer.".to_string(),
                temperature: 0.7,
                max_tokens: 64,
            })
            .await
            .unwrap();
        assert!(!text.is_empty());
    }
}
