//! API error type mapping to JSON `{ "error": ... }` responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

/// Errors a handler can return to the client.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or malformed request data (400)
    #[error("{0}")]
    BadRequest(String),

    /// Missing or mismatched credential (401)
    #[error("{0}")]
    Unauthorized(String),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }
}

/// JSON error body.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        warn!(error = %self, "request rejected");
        let body = ErrorBody {
            error: self.to_string(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}
