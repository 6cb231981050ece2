//! API-key gate for the contact stream.
//!
//! Subscribers present the key either as an `x-api-key` header or a `key`
//! query parameter. Absence or mismatch rejects the request before a single
//! stream frame is written.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use tracing::warn;

pub const API_KEY_HEADER: &str = "x-api-key";
pub const API_KEY_QUERY_PARAM: &str = "key";

/// Middleware guarding the stream endpoint.
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let presented = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .or_else(|| {
            request
                .uri()
                .query()
                .and_then(|query| extract_query_param(query, API_KEY_QUERY_PARAM))
        });

    match presented {
        None => Err(ApiError::Unauthorized("Missing API key".to_string())),
        Some(key) if constant_time_eq(key, &state.api_key) => Ok(next.run(request).await),
        Some(_) => {
            warn!("stream connection presented an invalid API key");
            Err(ApiError::Unauthorized("Invalid API key".to_string()))
        }
    }
}

/// Constant-time string comparison to avoid leaking the key via timing.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut diff = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Pulls a raw parameter value out of a query string.
pub fn extract_query_param<'a>(query: &'a str, param: &str) -> Option<&'a str> {
    query.split('&').find_map(|pair| {
        let mut parts = pair.split('=');
        match (parts.next(), parts.next()) {
            (Some(k), Some(v)) if k == param => Some(v),
            _ => None,
        }
    })
}
