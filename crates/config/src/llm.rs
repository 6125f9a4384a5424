//! Downstream text generation configuration.

use std::time::Duration;

use duration_str::deserialize_duration;
use secrecy::SecretString;
use serde::Deserialize;

/// Settings for the OpenAI compatible chat completions API.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LlmConfig {
    /// API key sent as a bearer token. Requests are sent unauthenticated when absent.
    pub api_key: Option<SecretString>,
    /// Base URL of the API, defaults to the public OpenAI endpoint.
    pub base_url: Option<String>,
    /// Model used for every generation.
    pub model: String,
    /// Upper bound for a single generation call.
    #[serde(deserialize_with = "deserialize_duration")]
    pub timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            model: "gpt-4o-mini".to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}
