//! Shared application state handed to every request handler.

use skytrack_core::{BroadcastConfig, ContactSimulator};
use std::sync::Arc;

/// Cloned per handler; all fields are cheap handles.
#[derive(Clone)]
pub struct AppState {
    /// The authoritative contact simulator
    pub simulator: Arc<ContactSimulator>,

    /// Per-subscriber broadcast loop settings
    pub broadcast: BroadcastConfig,

    /// The configured stream credential
    pub api_key: Arc<str>,
}

impl AppState {
    pub fn new(
        simulator: Arc<ContactSimulator>,
        broadcast: BroadcastConfig,
        api_key: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            simulator,
            broadcast,
            api_key: api_key.into(),
        }
    }
}
