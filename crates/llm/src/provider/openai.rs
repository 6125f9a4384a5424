use async_trait::async_trait;
use config::LlmConfig;
use reqwest::{Client, header::AUTHORIZATION};
use secrecy::ExposeSecret;

use crate::{
    error::LlmError,
    messages::{ChatCompletionRequest, ChatCompletionResponse},
    provider::Generator,
};

const DEFAULT_OPENAI_API_URL: &str = "https://api.openai.com/v1";

pub(crate) struct OpenAIProvider {
    client: Client,
    base_url: String,
    config: LlmConfig,
}

impl OpenAIProvider {
    pub fn new(config: LlmConfig) -> crate::Result<Self> {
        let client = Client::builder().timeout(config.timeout).build().map_err(|e| {
            log::error!("Failed to create HTTP client for OpenAI provider: {e}");
            LlmError::InternalError(None)
        })?;

        // Use custom base URL if provided, otherwise use default
        let base_url = config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_OPENAI_API_URL)
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            client,
            base_url,
            config,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Generator for OpenAIProvider {
    async fn generate(&self, prompt: &str) -> crate::Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatCompletionRequest::prompt(&self.config.model, prompt);

        let mut request_builder = self.client.post(&url);

        if let Some(key) = &self.config.api_key {
            request_builder = request_builder.header(AUTHORIZATION, format!("Bearer {}", key.expose_secret()));
        }

        let response = request_builder.json(&request).send().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout(format!("no response from OpenAI within {:?}", self.config.timeout))
            } else {
                LlmError::ConnectionError(format!("Failed to send request to OpenAI: {e}"))
            }
        })?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            log::error!("OpenAI API error ({status}): {error_text}");

            return Err(match status.as_u16() {
                400 => LlmError::InvalidRequest(error_text),
                401 => LlmError::AuthenticationFailed(error_text),
                403 => LlmError::InsufficientQuota(error_text),
                404 => LlmError::ModelNotFound(self.config.model.clone()),
                429 => LlmError::RateLimitExceeded(error_text),
                500 => LlmError::InternalError(Some(error_text)),
                _ => LlmError::ProviderApiError {
                    status: status.as_u16(),
                    message: error_text,
                },
            });
        }

        // First get the response as text to log if parsing fails
        let response_text = response.text().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout(format!("response body from OpenAI not received within {:?}", self.config.timeout))
            } else {
                log::error!("Failed to read OpenAI response body: {e}");
                LlmError::InternalError(None)
            }
        })?;

        let completion: ChatCompletionResponse = sonic_rs::from_str(&response_text).map_err(|e| {
            log::error!("Failed to parse OpenAI chat completion response: {e}");
            log::debug!("Raw response that failed to parse: {response_text}");
            LlmError::InternalError(None)
        })?;

        completion.into_text().ok_or(LlmError::EmptyCompletion)
    }
}
