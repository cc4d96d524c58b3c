//! Public event stream and update triggers.

use std::fmt;

use crate::geo::{Fix, Region};

/// Why an update cycle is running.
///
/// Passed through to the candidate source so it can tailor its fetch, and
/// included in status messages for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateTrigger {
    /// Engine start.
    Start,
    /// The observer left the sentinel area.
    DepartedCurrentArea,
    /// A visit (arrival/departure) was detected.
    VisitMonitoring,
    /// A monitored region boundary was crossed.
    RegionMonitoring,
    /// Explicit proximity check requested by the host.
    Manual,
    /// Candidate list supplied directly by the host.
    ExternalUpdate,
}

impl UpdateTrigger {
    /// Short name for logs and status messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateTrigger::Start => "start",
            UpdateTrigger::DepartedCurrentArea => "departed-current-area",
            UpdateTrigger::VisitMonitoring => "visit-monitoring",
            UpdateTrigger::RegionMonitoring => "region-monitoring",
            UpdateTrigger::Manual => "manual",
            UpdateTrigger::ExternalUpdate => "external-update",
        }
    }
}

impl fmt::Display for UpdateTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classification of a diagnostic status event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    /// An update cycle is running or has reconciled the watch set.
    Refreshing,
    /// The sentinel area was re-armed at a new position.
    SentinelUpdated,
    /// Diagnostic around region-entry handling (suppression, stale region).
    Entered,
    /// A visit event was received.
    Visit,
    /// Engine started or stopped.
    StateChange,
    /// A collaborator reported a failure; the cycle degraded but continued.
    Failure,
}

impl StatusKind {
    /// Short name for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusKind::Refreshing => "refreshing",
            StatusKind::SentinelUpdated => "sentinel-updated",
            StatusKind::Entered => "entered",
            StatusKind::Visit => "visit",
            StatusKind::StateChange => "state-change",
            StatusKind::Failure => "failure",
        }
    }
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Events delivered to the host on the public stream.
///
/// `Status` events are observability only; hosts reacting to region entries
/// should match on `Entered` and `Manual`.
#[derive(Debug, Clone)]
pub enum MonitorEvent {
    /// The observer entered a monitored region.
    ///
    /// `fix` is best effort; a failed location fetch does not suppress the
    /// event, it arrives without a fix attached.
    Entered {
        /// The region whose boundary was crossed.
        region: Region,
        /// Position at the time of entry, if one could be obtained.
        fix: Option<Fix>,
    },

    /// Result of an explicit `check_now()` proximity check.
    Manual {
        /// The nearest candidate region containing the current fix.
        region: Region,
        /// The fix the containment test ran against.
        fix: Fix,
    },

    /// Diagnostic status for observability.
    Status {
        /// Human-readable detail.
        message: String,
        /// Classification.
        kind: StatusKind,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_names_are_stable() {
        assert_eq!(UpdateTrigger::DepartedCurrentArea.as_str(), "departed-current-area");
        assert_eq!(UpdateTrigger::Manual.to_string(), "manual");
    }

    #[test]
    fn test_status_kind_display() {
        assert_eq!(StatusKind::SentinelUpdated.to_string(), "sentinel-updated");
        assert_eq!(StatusKind::Failure.as_str(), "failure");
    }
}
