use thiserror::Error;

/// Failures of a generation call.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Authentication failed (missing or invalid API key).
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Invalid request parameters.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The provider rate limited us.
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Insufficient quota or credits.
    #[error("Insufficient quota: {0}")]
    InsufficientQuota(String),

    /// Model not found at the provider.
    #[error("Model '{0}' not found")]
    ModelNotFound(String),

    /// Provider API returned an error.
    #[error("Provider API error ({status}): {message}")]
    ProviderApiError { status: u16, message: String },

    /// The call did not finish within the configured timeout.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Network or connection error.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The provider answered without any generated text.
    #[error("Provider returned an empty completion")]
    EmptyCompletion,

    /// Internal error.
    /// If Some(message), it came from the provider and can be shown.
    /// If None, the details are only logged.
    #[error("{}", .0.as_deref().unwrap_or("Internal server error"))]
    InternalError(Option<String>),
}
