//! SkyTrack Server - Contact Stream over Server-Sent Events
//!
//! Exposes the simulator's contact population to subscribers:
//! - `GET /api/contacts/stream` - API-key gated SSE push channel; a full
//!   snapshot on connect, then a lossy sampled batch per broadcast tick
//! - `POST /api/auth/login` - shared-key credential check
//! - `GET /health` - liveness probe
//!
//! Auth policy beyond the configured shared key is out of scope; the gate
//! only ensures a subscriber is pre-authorized before the first frame.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod state;
pub mod stream;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

pub use error::ApiError;
pub use state::AppState;

/// Builds the full application router.
pub fn create_router(state: AppState) -> Router {
    let gated = Router::new()
        .route("/api/contacts/stream", get(stream::stream_contacts))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_api_key,
        ));

    Router::new()
        .route("/api/auth/login", post(handlers::login))
        .route("/health", get(handlers::health))
        .merge(gated)
        .layer(CorsLayer::permissive())
        .with_state(state)
}
