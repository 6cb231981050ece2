//! Login and liveness handlers.

use crate::auth::constant_time_eq;
use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use skytrack_core::unix_ms;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(rename = "apiKey")]
    pub api_key: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    #[serde(rename = "apiKey")]
    pub api_key: String,
}

/// `POST /api/auth/login` - shared-key credential check.
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Some(key) = body.api_key.filter(|key| !key.is_empty()) else {
        return Err(ApiError::BadRequest("Missing API key".to_string()));
    };

    if !constant_time_eq(&key, &state.api_key) {
        return Err(ApiError::Unauthorized("Invalid API key".to_string()));
    }

    info!("login accepted");
    Ok(Json(LoginResponse {
        success: true,
        api_key: key,
    }))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: u64,
}

/// `GET /health` - liveness probe.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: unix_ms(),
    })
}
