//! SkyTrack Client - Subscriber Side of the Contact Stream
//!
//! Turns a lossy, unordered push feed back into a coherent local picture:
//! 1. **Stream Transport**: one persistent SSE connection with an
//!    open/update/error observer registry
//! 2. **Reconciliation Store**: last-write-wins upserts keyed by receipt
//!    time, with a staleness sweep driving the active -> lost -> removed
//!    lifecycle
//! 3. **Contact Tracker**: the runtime gluing the two together

pub mod auth;
pub mod error;
pub mod store;
pub mod tracker;
pub mod transport;

// Re-export key types for convenience
pub use auth::login;
pub use error::ClientError;
pub use store::{ContactStatus, ContactStore, SweepSummary, TrackedContact};
pub use tracker::{ContactTracker, TrackerConfig};
pub use transport::{HandlerId, StreamClient};
