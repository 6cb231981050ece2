//! SkyTrack Core - Contact Simulation and Broadcast Sampling
//!
//! This library owns the authoritative side of the SkyTrack pipeline:
//! 1. **Geo Kernel**: great-circle projection and bounds math on a spherical earth
//! 2. **Contact Simulator**: a population of moving contacts advanced by three
//!    independent periodic processes (movement, spawn, despawn)
//! 3. **Broadcast Sampling**: the deliberately lossy per-tick selection policy
//!    applied to each subscriber's feed

pub mod broadcast;
pub mod contact;
pub mod geo;
pub mod simulator;

// Re-export key types for convenience
pub use broadcast::{sample_batch, BroadcastConfig};
pub use contact::{unix_ms, Contact, ContactUpdate};
pub use geo::{destination_point, normalize_heading, Bounds, Point};
pub use simulator::{ContactSimulator, SimulatorConfig};
