//! Contact data model and its wire projection.

use crate::geo::Point;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// One simulated moving contact, owned by the simulator.
///
/// `active` transitions true -> false exactly once; a retired contact is
/// retained for bookkeeping but never emitted again, and its id is never
/// reused.
#[derive(Debug, Clone)]
pub struct Contact {
    /// Opaque unique id, assigned at creation, immutable
    pub id: String,

    /// Current position in degrees
    pub position: Point,

    /// Course over ground in [0, 360)
    pub heading: f64,

    /// Ground speed in meters per second, fixed for the contact's lifetime
    pub speed_mps: f64,

    /// Unix milliseconds of the last position mutation
    pub last_update_ms: u64,

    /// False once retired (logically deleted)
    pub active: bool,
}

impl Contact {
    /// Creates a new active contact with a fresh id.
    pub fn new(position: Point, heading: f64, speed_mps: f64, now_ms: u64) -> Self {
        Self {
            id: new_contact_id(),
            position,
            heading,
            speed_mps,
            last_update_ms: now_ms,
            active: true,
        }
    }

    /// Wire projection of this contact.
    ///
    /// Coordinates are rounded to 6 decimals and heading to 1 decimal to
    /// bound payload size and avoid implying false precision. Speed and the
    /// active flag never cross the wire.
    pub fn to_update(&self) -> ContactUpdate {
        ContactUpdate {
            id: self.id.clone(),
            lat: round_decimals(self.position.lat, 6),
            lng: round_decimals(self.position.lng, 6),
            heading: round_decimals(self.heading, 1),
            ts: self.last_update_ms,
        }
    }
}

/// Wire-level contact update.
///
/// Presence-only protocol: an update announces that a contact exists at a
/// position; removal is never announced and must be inferred from silence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactUpdate {
    pub id: String,
    pub lat: f64,
    pub lng: f64,
    pub heading: f64,
    /// Simulator-side time of the underlying mutation, Unix milliseconds
    pub ts: u64,
}

/// Current wall-clock time as Unix milliseconds.
pub fn unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64
}

fn new_contact_id() -> String {
    let uuid = Uuid::new_v4().simple().to_string();
    format!("ct-{}", &uuid[..8])
}

fn round_decimals(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_contact_id_format() {
        let contact = Contact::new(Point { lat: 0.0, lng: 0.0 }, 0.0, 30.0, 1_000);

        assert!(contact.id.starts_with("ct-"));
        assert_eq!(contact.id.len(), 11);
        assert!(contact.active);
    }

    #[test]
    fn test_contact_ids_unique() {
        let a = Contact::new(Point { lat: 0.0, lng: 0.0 }, 0.0, 30.0, 0);
        let b = Contact::new(Point { lat: 0.0, lng: 0.0 }, 0.0, 30.0, 0);

        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_update_projection_rounding() {
        let contact = Contact {
            id: "ct-00000001".to_string(),
            position: Point {
                lat: 50.123456789,
                lng: 30.000000444,
            },
            heading: 89.96,
            speed_mps: 42.0,
            last_update_ms: 1_700_000_000_000,
            active: true,
        };

        let update = contact.to_update();

        assert_relative_eq!(update.lat, 50.123457);
        assert_relative_eq!(update.lng, 30.0);
        assert_relative_eq!(update.heading, 90.0);
        assert_eq!(update.ts, 1_700_000_000_000);
    }

    #[test]
    fn test_update_wire_shape() {
        let update = ContactUpdate {
            id: "ct-a1b2c3d4".to_string(),
            lat: 48.5,
            lng: 31.25,
            heading: 270.0,
            ts: 1_700_000_000_000,
        };

        let json = serde_json::to_value(&update).unwrap();

        // Exactly the five wire fields: no speed, no active flag
        let object = json.as_object().unwrap();
        assert_eq!(object.len(), 5);
        for key in ["id", "lat", "lng", "heading", "ts"] {
            assert!(object.contains_key(key), "missing wire field {key}");
        }

        let back: ContactUpdate = serde_json::from_value(json).unwrap();
        assert_eq!(back, update);
    }
}
