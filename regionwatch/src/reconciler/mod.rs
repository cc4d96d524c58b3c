//! Watch-set reconciliation.
//!
//! Diff-based rather than clear-and-reinsert: regions present in both the
//! previous and the new selection are left untouched, so an unchanged
//! selection costs zero platform calls. The sentinel id is never part of the
//! diff; its lifecycle belongs to the sentinel manager alone.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::geo::Region;
use crate::platform::RegionWatcher;
use crate::selector::Selection;
use crate::sentinel::SENTINEL_REGION_ID;

/// Minimal add/remove operations to transform one watch set into another.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    /// Ids to start watching.
    pub added: Vec<String>,
    /// Ids to stop watching.
    pub removed: Vec<String>,
    /// Ids present in both sets, left untouched.
    pub kept: usize,
}

impl ReconcilePlan {
    /// Whether the plan changes nothing.
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Compute the minimal diff between the current watch set and a selection.
///
/// `removed = watched - selected - {sentinel}`, `added = selected - watched`.
pub fn plan(selected: &Selection, watched: &HashSet<String>) -> ReconcilePlan {
    let removed: Vec<String> = watched
        .iter()
        .filter(|id| *id != SENTINEL_REGION_ID && !selected.contains(id))
        .cloned()
        .collect();

    let added: Vec<String> = selected
        .ids()
        .iter()
        .filter(|id| !watched.contains(*id))
        .cloned()
        .collect();

    let kept = selected.len() - added.len();

    ReconcilePlan {
        added,
        removed,
        kept,
    }
}

/// Counters from one applied reconciliation, reported as a status event.
#[derive(Debug, Clone, Default)]
pub struct ReconcileStats {
    /// Candidates considered after de-duplication.
    pub considered: usize,
    /// Candidates within the consideration distance.
    pub nearby: usize,
    /// Regions selected for monitoring.
    pub selected: usize,
    /// Watches started.
    pub added: usize,
    /// Watches stopped.
    pub removed: usize,
    /// Watches left untouched.
    pub kept: usize,
    /// Platform registrations that failed (logged, not fatal).
    pub failures: usize,
}

impl ReconcileStats {
    /// One-line summary for the status stream.
    pub fn summary(&self) -> String {
        format!(
            "considered {} candidates, {} nearby, selected {}: +{} -{} ={} ({} failures)",
            self.considered, self.nearby, self.selected, self.added, self.removed, self.kept,
            self.failures
        )
    }
}

/// Applies reconcile plans against the watching capability.
pub struct MonitorSetReconciler {
    watcher: Arc<dyn RegionWatcher>,
}

impl MonitorSetReconciler {
    /// Create a reconciler issuing operations through the given watcher.
    pub fn new(watcher: Arc<dyn RegionWatcher>) -> Self {
        Self { watcher }
    }

    /// Diff the current watch set against `selected` and apply the changes.
    ///
    /// `candidates` supplies the region descriptors for newly added ids.
    /// Platform failures are logged and counted, never propagated; a region
    /// that fails to register is simply retried on the next cycle.
    pub fn reconcile(&self, selected: &Selection, candidates: &[Region]) -> ReconcileStats {
        let watched = self.watcher.watched_ids();
        let plan = plan(selected, &watched);

        let by_id: HashMap<&str, &Region> =
            candidates.iter().map(|r| (r.id.as_str(), r)).collect();

        let mut failures = 0;

        for id in &plan.removed {
            if let Err(e) = self.watcher.stop_watching(id) {
                warn!(region = %id, error = %e, "Failed to stop watching");
                failures += 1;
            }
        }

        for id in &plan.added {
            match by_id.get(id.as_str()) {
                Some(region) => {
                    if let Err(e) = self.watcher.start_watching(region) {
                        warn!(region = %id, error = %e, "Failed to start watching");
                        failures += 1;
                    }
                }
                None => {
                    // Selection only ever picks ids out of `candidates`
                    warn!(region = %id, "Selected id missing from candidate list");
                    failures += 1;
                }
            }
        }

        debug!(
            added = plan.added.len(),
            removed = plan.removed.len(),
            kept = plan.kept,
            failures,
            "Watch set reconciled"
        );

        ReconcileStats {
            considered: selected.considered,
            nearby: selected.nearby,
            selected: selected.len(),
            added: plan.added.len(),
            removed: plan.removed.len(),
            kept: plan.kept,
            failures,
        }
    }
}
