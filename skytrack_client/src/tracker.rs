//! The Contact Tracker - Transport and Store, Wired Together
//!
//! Routes every received update into the reconciliation store and runs the
//! staleness sweep on its own timer. A transport outage leaves the store
//! untouched: contacts fade through `Lost` to removal via the sweep rather
//! than being wiped.

use crate::store::{ContactStore, DEFAULT_CLEANUP_INTERVAL_MS};
use crate::store::{DEFAULT_LOST_THRESHOLD_MS, DEFAULT_REMOVE_THRESHOLD_MS};
use crate::transport::{HandlerId, StreamClient};
use skytrack_core::unix_ms;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Subscriber-side timing configuration.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Sweep cadence in milliseconds
    pub cleanup_interval_ms: u64,

    /// Silence after which a contact is demoted to lost
    pub lost_threshold_ms: u64,

    /// Silence after which a contact is evicted
    pub remove_threshold_ms: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            cleanup_interval_ms: DEFAULT_CLEANUP_INTERVAL_MS,
            lost_threshold_ms: DEFAULT_LOST_THRESHOLD_MS,
            remove_threshold_ms: DEFAULT_REMOVE_THRESHOLD_MS,
        }
    }
}

/// Owns one stream client and one reconciliation store.
pub struct ContactTracker {
    client: Arc<StreamClient>,
    store: Arc<Mutex<ContactStore>>,
    config: TrackerConfig,
    update_handler: Mutex<Option<HandlerId>>,
    sweep_task: Mutex<Option<JoinHandle<()>>>,
}

impl ContactTracker {
    pub fn new(client: StreamClient, config: TrackerConfig) -> Self {
        let store = ContactStore::with_thresholds(
            config.lost_threshold_ms,
            config.remove_threshold_ms,
        );
        Self {
            client: Arc::new(client),
            store: Arc::new(Mutex::new(store)),
            config,
            update_handler: Mutex::new(None),
            sweep_task: Mutex::new(None),
        }
    }

    /// Handle to the store for reads (counts, listings).
    pub fn store(&self) -> Arc<Mutex<ContactStore>> {
        Arc::clone(&self.store)
    }

    /// The underlying stream client, e.g. for extra observers.
    pub fn client(&self) -> &StreamClient {
        &self.client
    }

    /// Subscribes the store to the stream, starts the sweep timer and
    /// opens the transport. Calling twice is a no-op.
    pub fn start(&self) {
        let mut sweep_task = self.sweep_task.lock().unwrap();
        if sweep_task.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }

        let store = Arc::clone(&self.store);
        let handler = self.client.on_update(move |update| {
            store.lock().unwrap().apply_update(update.clone(), unix_ms());
        });
        *self.update_handler.lock().unwrap() = Some(handler);

        let store = Arc::clone(&self.store);
        let interval_ms = self.config.cleanup_interval_ms;
        *sweep_task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms));
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let summary = store.lock().unwrap().sweep(unix_ms());
                if summary.marked_lost > 0 || summary.removed > 0 {
                    debug!(
                        lost = summary.marked_lost,
                        removed = summary.removed,
                        "staleness sweep"
                    );
                }
            }
        }));

        self.client.connect();
        info!("contact tracker started");
    }

    /// Disconnects the transport and stops the sweep. The store keeps its
    /// current picture.
    pub fn stop(&self) {
        self.client.disconnect();
        if let Some(handler) = self.update_handler.lock().unwrap().take() {
            self.client.off_update(handler);
        }
        if let Some(task) = self.sweep_task.lock().unwrap().take() {
            task.abort();
        }
        info!("contact tracker stopped");
    }
}

impl Drop for ContactTracker {
    fn drop(&mut self) {
        if let Ok(mut task) = self.sweep_task.lock() {
            if let Some(task) = task.take() {
                task.abort();
            }
        }
    }
}
