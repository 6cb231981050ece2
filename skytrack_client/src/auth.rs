//! Login helper for the credential gate in front of the stream.

use crate::error::ClientError;
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[allow(dead_code)]
    success: bool,
    #[serde(rename = "apiKey")]
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// Exchanges the API key against the login endpoint.
///
/// Returns the accepted key on success. A rejection maps to
/// [`ClientError::Auth`] with the server's error message when one was
/// provided.
pub async fn login(base_url: &str, api_key: &str) -> Result<String, ClientError> {
    let client = reqwest::Client::new();
    let response = client
        .post(format!("{base_url}/api/auth/login"))
        .json(&serde_json::json!({ "apiKey": api_key }))
        .send()
        .await
        .map_err(|err| ClientError::Connect(err.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let message = response
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|body| body.error)
            .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
        return Err(ClientError::Auth(message));
    }

    let body: LoginResponse = response
        .json()
        .await
        .map_err(|err| ClientError::Transport(err.to_string()))?;
    debug!("login accepted");
    Ok(body.api_key)
}
