//! Error types for the subscriber side.

use thiserror::Error;

/// Errors surfaced by the stream transport and login helper.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// The connection could not be established at all
    #[error("connection failed: {0}")]
    Connect(String),

    /// The stream endpoint refused the subscription (e.g. bad credential)
    #[error("stream rejected with HTTP status {0}")]
    Rejected(u16),

    /// The established transport failed or closed underneath us
    #[error("transport error: {0}")]
    Transport(String),

    /// The login endpoint rejected the credential
    #[error("login failed: {0}")]
    Auth(String),
}
