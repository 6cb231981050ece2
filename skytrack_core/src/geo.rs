//! The Geo Kernel - Great-Circle Math on a Spherical Earth
//!
//! Pure functions: forward projection along a bearing, inclusive bounds
//! containment, and heading normalization. No state, no I/O.
//!
//! All angles are degrees, all distances meters. Callers must not pass
//! non-finite input; the kernel propagates NaN rather than guessing.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Mean earth radius in meters.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A geographic position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Latitude in degrees, north positive
    pub lat: f64,

    /// Longitude in degrees, east positive
    pub lng: f64,
}

/// A rectangular lat/lng box with inclusive edges.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Inclusive containment test.
    pub fn contains(&self, point: Point) -> bool {
        point.lat >= self.min_lat
            && point.lat <= self.max_lat
            && point.lng >= self.min_lng
            && point.lng <= self.max_lng
    }

    /// Geometric center of the box.
    pub fn center(&self) -> Point {
        Point {
            lat: (self.min_lat + self.max_lat) / 2.0,
            lng: (self.min_lng + self.max_lng) / 2.0,
        }
    }
}

/// Projects a point forward along a great circle.
///
/// Standard forward-bearing formulas on a sphere of mean radius.
/// The resulting longitude is wrapped into (-180, 180].
pub fn destination_point(from: Point, bearing_deg: f64, distance_m: f64) -> Point {
    let delta = distance_m / EARTH_RADIUS_M;
    let theta = bearing_deg.to_radians();
    let phi1 = from.lat.to_radians();
    let lambda1 = from.lng.to_radians();

    let sin_phi2 = phi1.sin() * delta.cos() + phi1.cos() * delta.sin() * theta.cos();
    let phi2 = sin_phi2.asin();

    let y = theta.sin() * delta.sin() * phi1.cos();
    let x = delta.cos() - phi1.sin() * sin_phi2;
    let lambda2 = lambda1 + y.atan2(x);

    Point {
        lat: phi2.to_degrees(),
        lng: wrap_longitude(lambda2.to_degrees()),
    }
}

/// Reduces a heading to [0, 360).
///
/// The double modulo keeps the result correct for negative input and
/// avoids the `x + 360.0 == 360.0` rounding trap near zero.
pub fn normalize_heading(deg: f64) -> f64 {
    ((deg % 360.0) + 360.0) % 360.0
}

/// Uniform random position inside a bounding box.
pub fn random_point_in<R: Rng>(bounds: &Bounds, rng: &mut R) -> Point {
    Point {
        lat: rng.gen_range(bounds.min_lat..=bounds.max_lat),
        lng: rng.gen_range(bounds.min_lng..=bounds.max_lng),
    }
}

/// Uniform random heading in [0, 360).
pub fn random_heading<R: Rng>(rng: &mut R) -> f64 {
    rng.gen_range(0.0..360.0)
}

fn wrap_longitude(deg: f64) -> f64 {
    ((deg + 540.0) % 360.0 + 360.0) % 360.0 - 180.0
}
