//! Geographic value types.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// A point on the Earth's surface in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude in degrees (-90.0 to 90.0).
    pub latitude: f64,
    /// Longitude in degrees (-180.0 to 180.0).
    pub longitude: f64,
}

impl Coordinate {
    /// Create a new coordinate.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Great-circle distance to another coordinate in meters.
    pub fn distance_meters(&self, other: &Coordinate) -> f64 {
        super::distance_meters(*self, *other)
    }
}

/// A circular area of interest.
///
/// Regions are produced by the external candidate source and never mutated
/// by the engine; selection and reconciliation work by `id` only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    /// Stable identifier, unique across the candidate universe.
    pub id: String,
    /// Center of the circular boundary.
    pub center: Coordinate,
    /// Boundary radius in meters (> 0).
    pub radius_m: f64,
    /// Relative importance; higher wins. Absent ranks below any present value.
    #[serde(default)]
    pub priority: Option<i32>,
}

impl Region {
    /// Create a region without a priority.
    pub fn new(id: impl Into<String>, center: Coordinate, radius_m: f64) -> Self {
        Self {
            id: id.into(),
            center,
            radius_m,
            priority: None,
        }
    }

    /// Attach a priority value.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Priority for ranking purposes; absent priority ranks below any present one.
    pub fn effective_priority(&self) -> i64 {
        match self.priority {
            Some(p) => p as i64,
            None => i64::MIN,
        }
    }

    /// Whether the coordinate lies inside (or on) the region boundary.
    pub fn contains(&self, point: &Coordinate) -> bool {
        self.center.distance_meters(point) <= self.radius_m
    }

    /// Distance from the region center to a coordinate in meters.
    pub fn distance_to(&self, point: &Coordinate) -> f64 {
        self.center.distance_meters(point)
    }
}

/// A position sample from the positioning capability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fix {
    /// Sampled position.
    pub coordinate: Coordinate,
    /// Horizontal accuracy radius in meters (smaller is better).
    pub accuracy_m: f64,
    /// When the sample was taken.
    pub taken_at: Instant,
}

impl Fix {
    /// Create a fix taken now.
    pub fn new(coordinate: Coordinate, accuracy_m: f64) -> Self {
        Self::at(coordinate, accuracy_m, Instant::now())
    }

    /// Create a fix with an explicit timestamp.
    pub fn at(coordinate: Coordinate, accuracy_m: f64, taken_at: Instant) -> Self {
        Self {
            coordinate,
            accuracy_m,
            taken_at,
        }
    }

    /// Age of the sample relative to `now`.
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.taken_at)
    }

    /// Whether the sample is recent and accurate enough to reuse.
    pub fn satisfies(&self, max_age: Duration, max_accuracy_m: f64, now: Instant) -> bool {
        self.age(now) <= max_age && self.accuracy_m <= max_accuracy_m
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_contains_center() {
        let region = Region::new("r1", Coordinate::new(53.55, 9.99), 100.0);
        assert!(region.contains(&Coordinate::new(53.55, 9.99)));
    }

    #[test]
    fn test_region_excludes_distant_point() {
        let region = Region::new("r1", Coordinate::new(53.55, 9.99), 100.0);
        // Roughly 7 km away
        assert!(!region.contains(&Coordinate::new(53.61, 9.99)));
    }

    #[test]
    fn test_effective_priority_absent_is_lowest() {
        let without = Region::new("a", Coordinate::new(0.0, 0.0), 50.0);
        let with = Region::new("b", Coordinate::new(0.0, 0.0), 50.0).with_priority(i32::MIN);
        assert!(without.effective_priority() < with.effective_priority());
    }

    #[test]
    fn test_fix_satisfies_fresh_and_accurate() {
        let now = Instant::now();
        let fix = Fix::at(Coordinate::new(1.0, 2.0), 20.0, now);
        assert!(fix.satisfies(Duration::from_secs(10), 100.0, now + Duration::from_secs(5)));
    }

    #[test]
    fn test_fix_satisfies_rejects_stale() {
        let now = Instant::now();
        let fix = Fix::at(Coordinate::new(1.0, 2.0), 20.0, now);
        assert!(!fix.satisfies(Duration::from_secs(10), 100.0, now + Duration::from_secs(11)));
    }

    #[test]
    fn test_fix_satisfies_rejects_inaccurate() {
        let now = Instant::now();
        let fix = Fix::at(Coordinate::new(1.0, 2.0), 200.0, now);
        assert!(!fix.satisfies(Duration::from_secs(10), 100.0, now));
    }

    #[test]
    fn test_region_deserializes_without_priority() {
        let region: Region =
            serde_json::from_str(r#"{"id":"r","center":{"latitude":1.0,"longitude":2.0},"radius_m":75.0}"#)
                .unwrap();
        assert_eq!(region.priority, None);
        assert_eq!(region.radius_m, 75.0);
    }
}
