//! Geographic primitives.
//!
//! Value types for regions and position fixes, plus great-circle distance
//! used by the selector's proximity ranking and the containment checks in
//! the sentinel and entry paths.

mod types;

pub use types::{Coordinate, Fix, Region};

/// Mean Earth radius in meters (IUGG).
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Great-circle distance between two coordinates in meters.
///
/// Haversine formula; accurate to well under a meter over the distances the
/// engine cares about (tens of kilometers).
pub fn distance_meters(a: Coordinate, b: Coordinate) -> f64 {
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (dlon / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}
