use std::sync::Arc;

use axum::{Extension, Json, Router, extract::State, routing::get};
use config::Identity;
use rate_limit::{UsageTracker, describe_window};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub(crate) struct StatusResponse {
    success: bool,
    message: String,
    remaining_requests: u32,
}

/// Reports an identity's quota without consuming any of it.
pub(crate) struct StatusReporter {
    tracker: Arc<UsageTracker>,
}

impl StatusReporter {
    pub fn new(tracker: Arc<UsageTracker>) -> Self {
        Self { tracker }
    }

    pub fn report(&self, identity: &Identity) -> StatusResponse {
        let snapshot = self.tracker.peek(identity);
        let window = describe_window(self.tracker.policy().window());

        StatusResponse {
            success: true,
            message: format!(
                "You are using the {} class. Your limit is {} requests per {window}.",
                identity.class, snapshot.limit
            ),
            remaining_requests: snapshot.remaining,
        }
    }
}

pub(crate) fn router(reporter: Arc<StatusReporter>) -> Router {
    Router::new().route("/api/status", get(status)).with_state(reporter)
}

async fn status(
    State(reporter): State<Arc<StatusReporter>>,
    Extension(identity): Extension<Identity>,
) -> Json<StatusResponse> {
    Json(reporter.report(&identity))
}
