//! Downstream text generation for the gatekeeper.
//!
//! The gateway only needs one capability from the model: turn a prompt into text. [`Generator`] is that seam;
//! [`from_config`] builds the OpenAI compatible implementation used in production.

use std::sync::Arc;

use config::LlmConfig;

mod error;
mod messages;
mod provider;

pub use error::LlmError;
pub use provider::Generator;

pub(crate) type Result<T> = std::result::Result<T, LlmError>;

/// Creates the generator described by the configuration.
pub fn from_config(config: &LlmConfig) -> anyhow::Result<Arc<dyn Generator>> {
    if let Some(warning) = credentials_warning(config) {
        log::warn!("{warning}");
    }

    let provider = provider::openai::OpenAIProvider::new(config.clone())
        .map_err(|e| anyhow::anyhow!("Failed to initialize LLM provider: {e}"))?;

    log::debug!("Generation uses model '{}' at {}", config.model, provider.base_url());

    Ok(Arc::new(provider))
}

fn credentials_warning(config: &LlmConfig) -> Option<&'static str> {
    config
        .api_key
        .is_none()
        .then_some("No API key configured in [llm]; generation requests will be sent unauthenticated")
}
