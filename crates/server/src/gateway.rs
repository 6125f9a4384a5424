//! The chat endpoint: admission first, then the downstream generation call.

use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::{State, rejection::JsonRejection},
    routing::post,
};
use config::Identity;
use llm::Generator;
use rate_limit::{UsageTracker, describe_window};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub(crate) struct ChatRequest {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatResponse {
    success: bool,
    message: String,
    remaining_requests: u32,
}

/// Admits requests against the usage tracker and forwards admitted prompts to the generator.
pub(crate) struct RequestGateway {
    tracker: Arc<UsageTracker>,
    generator: Arc<dyn Generator>,
}

impl RequestGateway {
    pub fn new(tracker: Arc<UsageTracker>, generator: Arc<dyn Generator>) -> Self {
        Self { tracker, generator }
    }

    /// Counts the request against `identity`, then generates a reply for `message`.
    ///
    /// The request is counted before the message is checked, so an empty message still consumes quota.
    /// A failed generation is reported once and the consumed quota is not refunded.
    pub async fn handle(&self, identity: &Identity, message: Option<String>) -> Result<ChatResponse, ApiError> {
        let admission = self.tracker.admit(identity);

        if !admission.allowed {
            log::debug!("Quota exhausted for {} identity '{}'", identity.class, identity.key);

            return Err(ApiError::QuotaExceeded {
                class: identity.class.to_string(),
                limit: admission.limit,
                window: describe_window(self.tracker.policy().window()),
            });
        }

        let message = message.filter(|m| !m.is_empty()).ok_or(ApiError::MissingMessage)?;

        let text = self.generator.generate(&message).await.map_err(|e| {
            log::error!("Generation failed for {} identity: {e}", identity.class);
            ApiError::from(e)
        })?;

        Ok(ChatResponse {
            success: true,
            message: text,
            remaining_requests: admission.remaining,
        })
    }
}

pub(crate) fn router(gateway: Arc<RequestGateway>) -> Router {
    Router::new().route("/api/chat", post(chat)).with_state(gateway)
}

async fn chat(
    State(gateway): State<Arc<RequestGateway>>,
    Extension(identity): Extension<Identity>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    // A body that is not a JSON object with a message is handled as a missing message, after admission.
    let message = match body {
        Ok(Json(request)) => request.message,
        Err(rejection) => {
            log::debug!("Unreadable chat body: {rejection}");
            None
        }
    };

    gateway.handle(&identity, message).await.map(Json)
}
