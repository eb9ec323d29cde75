pub mod chat_client;

use crate::error::{GenAiError, Result};
use crate::models::ImageGenerationRequest;
use crate::session::{CompletionBackend, FragmentStream};
use async_trait::async_trait;
use std::env;

pub use chat_client::ChatClient;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub default_model: Option<String>,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        OpenAiConfig {
            base_url: None,
            api_key: None,
            default_model: None,
        }
    }
}

impl OpenAiConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let base_url = env::var("OPENAI_BASE_URL").ok();
        let api_key = env::var("OPENAI_API_KEY").ok();
        let default_model = env::var("RIMAGEN_MODEL").ok();

        OpenAiConfig {
            base_url,
            api_key,
            default_model,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }
}

/// Facade over the chat completions API. Sub-clients share one HTTP client.
#[derive(Clone)]
pub struct OpenAiClient {
    chat_client: ChatClient,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| GenAiError::ClientError(e.to_string()))?;

        let base_url = config
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Ok(Self {
            chat_client: ChatClient::new(http, base_url, config.api_key, config.default_model),
        })
    }

    pub fn chat(&self) -> &ChatClient {
        &self.chat_client
    }
}

#[async_trait]
impl CompletionBackend for OpenAiClient {
    async fn stream_generation(&self, request: &ImageGenerationRequest) -> Result<FragmentStream> {
        let completion_request = self.chat_client.build_request(request);
        self.chat_client.stream_completion(completion_request).await
    }

    fn model_for(&self, request: &ImageGenerationRequest) -> String {
        self.chat_client.build_request(request).model
    }
}
