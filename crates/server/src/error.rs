use axum::{
    Json,
    response::{IntoResponse, Response},
};
use http::StatusCode;
use llm::LlmError;
use serde::Serialize;

use crate::auth::AuthError;

/// Every failure the HTTP surface reports. Each one renders as a `success: false` JSON envelope.
#[derive(Debug, thiserror::Error)]
pub(crate) enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("Message is required")]
    MissingMessage,
    #[error("Too many requests. {class} users can make {limit} requests per {window}.")]
    QuotaExceeded { class: String, limit: u32, window: String },
    #[error("{0}")]
    DownstreamFailure(#[from] LlmError),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Auth(AuthError::MissingCredentials) => StatusCode::UNAUTHORIZED,
            ApiError::Auth(AuthError::InvalidCredentials) => StatusCode::FORBIDDEN,
            ApiError::Auth(AuthError::InvalidToken(_)) => StatusCode::UNAUTHORIZED,
            ApiError::Auth(AuthError::Internal) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::MissingMessage => StatusCode::BAD_REQUEST,
            ApiError::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::DownstreamFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiError::Auth(AuthError::MissingCredentials) => "missing_credentials",
            ApiError::Auth(AuthError::InvalidCredentials) => "invalid_credentials",
            ApiError::Auth(AuthError::InvalidToken(_)) => "invalid_token",
            ApiError::Auth(AuthError::Internal) => "internal_error",
            ApiError::MissingMessage => "missing_message",
            ApiError::QuotaExceeded { .. } => "quota_exceeded",
            ApiError::DownstreamFailure(_) => "downstream_failure",
        }
    }
}

#[derive(Serialize)]
struct ErrorEnvelope {
    success: bool,
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    remaining_requests: Option<u32>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let remaining_requests = matches!(self, ApiError::QuotaExceeded { .. }).then_some(0);

        let envelope = ErrorEnvelope {
            success: false,
            error: self.kind(),
            message: self.to_string(),
            remaining_requests,
        };

        (self.status_code(), Json(envelope)).into_response()
    }
}
