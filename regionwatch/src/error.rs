//! Engine error types.
//!
//! The fix taxonomy mirrors what the positioning capability can report.
//! None of these abort an update cycle; failures downgrade the cycle to
//! location-agnostic selection and surface as `Status` events.

use thiserror::Error;

use crate::geo::Fix;

/// Failure modes of a location fix request.
#[derive(Debug, Clone, Error)]
pub enum FixError {
    /// The positioning capability has no usable authorization.
    ///
    /// Fatal to fix-dependent operations until externally resolved.
    #[error("positioning authorization denied")]
    AccessDenied,

    /// No fix of acceptable accuracy arrived within the deadline.
    #[error("no acceptable fix within the deadline")]
    Timeout,

    /// An update arrived but missed the accuracy bar.
    ///
    /// Carries the best-effort fix for callers that tolerate degraded
    /// precision.
    #[error("fix accuracy {:.0} m misses the requested bar", .0.accuracy_m)]
    Inaccurate(Fix),

    /// The underlying capability reported an error.
    #[error("positioning platform failure: {0}")]
    Platform(String),
}

impl FixError {
    /// The degraded fix attached to an `Inaccurate` failure, if any.
    pub fn best_effort_fix(&self) -> Option<Fix> {
        match self {
            FixError::Inaccurate(fix) => Some(*fix),
            _ => None,
        }
    }
}

/// Failure registering or unregistering a region with the watching capability.
///
/// Logged and surfaced as a diagnostic status; never crashes the engine.
#[derive(Debug, Clone, Error)]
#[error("region watch failure: {0}")]
pub struct PlatformError(pub String);

/// Failure fetching the candidate region list.
#[derive(Debug, Clone, Error)]
#[error("candidate fetch failure: {0}")]
pub struct CandidateError(pub String);

/// Invalid engine configuration.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Capacity must leave room for at least the sentinel slot.
    #[error("max_regions_to_monitor must be >= 1, got {0}")]
    InvalidCapacity(usize),

    /// A distance threshold was not a positive finite number.
    #[error("{name} must be positive and finite, got {value}")]
    InvalidDistance {
        /// Name of the offending field.
        name: &'static str,
        /// Rejected value.
        value: f64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Coordinate;

    #[test]
    fn test_inaccurate_carries_best_effort_fix() {
        let fix = Fix::new(Coordinate::new(53.55, 9.99), 350.0);
        let err = FixError::Inaccurate(fix);
        assert_eq!(err.best_effort_fix(), Some(fix));
        assert!(err.to_string().contains("350"));
    }

    #[test]
    fn test_other_errors_carry_no_fix() {
        assert!(FixError::Timeout.best_effort_fix().is_none());
        assert!(FixError::AccessDenied.best_effort_fix().is_none());
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::InvalidCapacity(0);
        assert!(err.to_string().contains("max_regions_to_monitor"));
    }
}
