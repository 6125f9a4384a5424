use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    routing::post,
};
use serde::{Deserialize, Serialize};

use crate::{
    auth::{AuthError, CredentialIssuer},
    error::ApiError,
};

#[derive(Debug, Deserialize)]
pub(crate) struct LoginRequest {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct LoginResponse {
    success: bool,
    message: &'static str,
    token: String,
}

pub(crate) fn router(issuer: Arc<CredentialIssuer>) -> Router {
    Router::new().route("/api/login", post(login)).with_state(issuer)
}

async fn login(
    State(issuer): State<Arc<CredentialIssuer>>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Json(request) = body.map_err(|rejection| {
        log::debug!("Unreadable login body: {rejection}");
        AuthError::MissingCredentials
    })?;

    let token = issuer.issue(&request.username, &request.password)?;

    Ok(Json(LoginResponse {
        success: true,
        message: "User logged in successfully",
        token,
    }))
}
