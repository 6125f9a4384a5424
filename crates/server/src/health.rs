use axum::{Json, Router, routing::get};
use config::HealthConfig;
use http::StatusCode;

#[derive(Debug, serde::Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub(crate) enum HealthState {
    /// Indicates that the server is healthy and operational.
    Healthy,
}

/// Handles health check requests and returns the current health status of the server.
pub(crate) async fn health() -> (StatusCode, Json<HealthState>) {
    (StatusCode::OK, Json(HealthState::Healthy))
}

pub(crate) fn router(config: &HealthConfig) -> Router {
    Router::new().route(&config.path, get(health))
}
