//! Engine configuration.
//!
//! All environment-tuned constants live here rather than being hardcoded at
//! their point of use: the consideration and priority distances in
//! particular have historically drifted between deployments, so they are
//! plain configuration fields with named defaults.

use std::time::Duration;

use crate::error::ConfigError;

// ==================== Capacity ====================

/// Default cap on concurrently monitored regions, including the sentinel slot.
pub const DEFAULT_MAX_REGIONS_TO_MONITOR: usize = 20;

// ==================== Selection distances ====================

/// Default maximum consideration distance from the observer in meters.
///
/// Candidates farther than this are not selected when a fix is known.
pub const DEFAULT_MAX_DISTANCE_M: f64 = 10_000.0;

/// Default priority-relevant distance in meters.
///
/// Within this distance of the observer, priority outranks proximity.
pub const DEFAULT_PRIORITY_DISTANCE_M: f64 = 5_000.0;

// ==================== Entry deduplication ====================

/// Default cooldown window for repeat entries into the same region.
pub const DEFAULT_ENTRY_COOLDOWN_SECS: u64 = 120;

// ==================== Scheduling ====================

/// Default quiet interval for debounced updates in milliseconds.
pub const DEFAULT_DEBOUNCE_QUIET_MS: u64 = 2_500;

// ==================== Fix acquisition ====================

/// Default deadline for a fix request.
pub const DEFAULT_FIX_TIMEOUT_SECS: u64 = 30;

/// Default age under which a cached fix short-circuits a new request.
pub const DEFAULT_FIX_RECENCY_SECS: u64 = 10;

/// Default accuracy bar for an acceptable fix in meters.
pub const DEFAULT_FIX_ACCURACY_M: f64 = 100.0;

// ==================== Sentinel geometry ====================

/// Default margin added to the fix accuracy when sizing the sentinel, meters.
pub const DEFAULT_SENTINEL_RADIUS_DELTA_M: f64 = 50.0;

/// Default upper bound on the sentinel radius in meters.
pub const DEFAULT_SENTINEL_MAX_RADIUS_M: f64 = 2_000.0;

/// Default platform limit on any watchable region radius in meters.
pub const DEFAULT_PLATFORM_MAX_RADIUS_M: f64 = 100_000.0;

/// Configuration for a [`RegionMonitor`](crate::monitor::RegionMonitor).
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Cap on concurrently monitored regions, including the sentinel slot.
    ///
    /// Must be at least 1. A value of 1 leaves no candidate slots; the
    /// sentinel is monitored alone.
    pub max_regions_to_monitor: usize,

    /// Maximum consideration distance from the observer in meters (D_max).
    pub max_distance_m: f64,

    /// Priority-relevant distance in meters (D_prio).
    pub priority_distance_m: f64,

    /// Cooldown window for repeat entries into the same region.
    pub entry_cooldown: Duration,

    /// Quiet interval for debounced updates.
    pub debounce_quiet: Duration,

    /// Deadline for a fix request.
    pub fix_timeout: Duration,

    /// Age under which a cached fix short-circuits a new request.
    pub fix_recency: Duration,

    /// Accuracy bar for an acceptable fix in meters.
    pub fix_accuracy_m: f64,

    /// Margin added to the fix accuracy when sizing the sentinel, meters.
    pub sentinel_radius_delta_m: f64,

    /// Upper bound on the sentinel radius in meters.
    pub sentinel_max_radius_m: f64,

    /// Platform limit on any watchable region radius in meters.
    pub platform_max_radius_m: f64,

    /// Whether visit events trigger update cycles.
    pub enable_visit_monitoring: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            max_regions_to_monitor: DEFAULT_MAX_REGIONS_TO_MONITOR,
            max_distance_m: DEFAULT_MAX_DISTANCE_M,
            priority_distance_m: DEFAULT_PRIORITY_DISTANCE_M,
            entry_cooldown: Duration::from_secs(DEFAULT_ENTRY_COOLDOWN_SECS),
            debounce_quiet: Duration::from_millis(DEFAULT_DEBOUNCE_QUIET_MS),
            fix_timeout: Duration::from_secs(DEFAULT_FIX_TIMEOUT_SECS),
            fix_recency: Duration::from_secs(DEFAULT_FIX_RECENCY_SECS),
            fix_accuracy_m: DEFAULT_FIX_ACCURACY_M,
            sentinel_radius_delta_m: DEFAULT_SENTINEL_RADIUS_DELTA_M,
            sentinel_max_radius_m: DEFAULT_SENTINEL_MAX_RADIUS_M,
            platform_max_radius_m: DEFAULT_PLATFORM_MAX_RADIUS_M,
            enable_visit_monitoring: true,
        }
    }
}

impl MonitorConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the region cap, including the sentinel slot.
    pub fn with_max_regions(mut self, max: usize) -> Self {
        self.max_regions_to_monitor = max;
        self
    }

    /// Set the consideration distance in meters.
    pub fn with_max_distance_m(mut self, meters: f64) -> Self {
        self.max_distance_m = meters;
        self
    }

    /// Set the priority-relevant distance in meters.
    pub fn with_priority_distance_m(mut self, meters: f64) -> Self {
        self.priority_distance_m = meters;
        self
    }

    /// Set the entry cooldown window.
    pub fn with_entry_cooldown(mut self, window: Duration) -> Self {
        self.entry_cooldown = window;
        self
    }

    /// Set the debounce quiet interval.
    pub fn with_debounce_quiet(mut self, quiet: Duration) -> Self {
        self.debounce_quiet = quiet;
        self
    }

    /// Enable or disable visit-triggered updates.
    pub fn with_visit_monitoring(mut self, enabled: bool) -> Self {
        self.enable_visit_monitoring = enabled;
        self
    }

    /// Candidate slots left after reserving one for the sentinel.
    pub fn usable_capacity(&self) -> usize {
        self.max_regions_to_monitor.saturating_sub(1)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_regions_to_monitor < 1 {
            return Err(ConfigError::InvalidCapacity(self.max_regions_to_monitor));
        }

        for (name, value) in [
            ("max_distance_m", self.max_distance_m),
            ("priority_distance_m", self.priority_distance_m),
            ("fix_accuracy_m", self.fix_accuracy_m),
            ("sentinel_radius_delta_m", self.sentinel_radius_delta_m),
            ("sentinel_max_radius_m", self.sentinel_max_radius_m),
            ("platform_max_radius_m", self.platform_max_radius_m),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::InvalidDistance { name, value });
            }
        }

        Ok(())
    }
}
