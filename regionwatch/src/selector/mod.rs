//! Region selection: which candidates deserve a monitoring slot.
//!
//! Pure and deterministic; no side effects. Given the full candidate list,
//! the capacity cap, and (optionally) the observer's position, `select`
//! computes the subset to watch.
//!
//! # Ranking policy
//!
//! One slot is always reserved for the sentinel, leaving `capacity - 1`
//! candidate slots. When the filtered candidates overflow those slots:
//!
//! - **With a fix**: candidates inside the priority-relevant distance
//!   (D_prio) rank by priority first, distance second; everything farther
//!   out ranks by distance alone. Since every near candidate is closer than
//!   every far one, this is equivalent to the pairwise rule "priority wins
//!   only when both lie within D_prio".
//! - **Without a fix**: priority descending, input order preserved on ties.
//!   Distance cannot be consulted, so priority is the only fair signal.
//!
//! Candidates beyond the consideration distance (D_max) are dropped outright
//! when a fix is known; without one, no candidate can safely be pruned.

use std::collections::HashSet;

use tracing::trace;

use crate::config::MonitorConfig;
use crate::geo::{Fix, Region};

/// Distance thresholds for selection.
///
/// Environment-tuned; see [`MonitorConfig`] for the defaults.
#[derive(Debug, Clone)]
pub struct SelectorConfig {
    /// Maximum consideration distance from the observer in meters (D_max).
    pub max_distance_m: f64,
    /// Priority-relevant distance in meters (D_prio).
    pub priority_distance_m: f64,
}

impl From<&MonitorConfig> for SelectorConfig {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            max_distance_m: config.max_distance_m,
            priority_distance_m: config.priority_distance_m,
        }
    }
}

/// The outcome of one selection pass.
///
/// Equality compares the id *set* only, so consecutive cycles that pick the
/// same regions in a different order still compare equal and skip
/// reconciliation.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    ranked: Vec<String>,
    set: HashSet<String>,
    /// Candidates considered after de-duplication.
    pub considered: usize,
    /// Candidates that survived the consideration-distance filter.
    pub nearby: usize,
}

impl Selection {
    /// Selected ids in rank order.
    pub fn ids(&self) -> &[String] {
        &self.ranked
    }

    /// Whether the id was selected.
    pub fn contains(&self, id: &str) -> bool {
        self.set.contains(id)
    }

    /// Selected ids as a set.
    pub fn id_set(&self) -> &HashSet<String> {
        &self.set
    }

    /// Number of selected regions.
    pub fn len(&self) -> usize {
        self.ranked.len()
    }

    /// Whether nothing was selected.
    pub fn is_empty(&self) -> bool {
        self.ranked.is_empty()
    }
}

impl PartialEq for Selection {
    fn eq(&self, other: &Self) -> bool {
        self.set == other.set
    }
}

impl Eq for Selection {}

/// Compute the subset of candidates to monitor.
///
/// `capacity` includes the sentinel slot; at most `capacity - 1` ids are
/// returned. Duplicate candidate ids are dropped, first occurrence wins.
pub fn select(
    candidates: &[Region],
    capacity: usize,
    observer: Option<&Fix>,
    config: &SelectorConfig,
) -> Selection {
    let usable = capacity.saturating_sub(1);

    // De-dup by id, preserving input order.
    let mut seen = HashSet::new();
    let deduped: Vec<&Region> = candidates
        .iter()
        .filter(|r| seen.insert(r.id.as_str()))
        .collect();
    let considered = deduped.len();

    let (picked, nearby): (Vec<&Region>, usize) = match observer {
        Some(fix) => select_with_fix(deduped, usable, fix, config),
        None => {
            let nearby = deduped.len();
            (select_without_fix(deduped, usable), nearby)
        }
    };

    let ranked: Vec<String> = picked.iter().map(|r| r.id.clone()).collect();
    let set: HashSet<String> = ranked.iter().cloned().collect();
    trace!(considered, nearby, selected = ranked.len(), "Selection computed");

    Selection {
        ranked,
        set,
        considered,
        nearby,
    }
}

/// Distance-aware selection: filter to D_max, then rank.
///
/// Returns the picked regions and the count that survived the filter.
fn select_with_fix<'a>(
    deduped: Vec<&'a Region>,
    usable: usize,
    fix: &Fix,
    config: &SelectorConfig,
) -> (Vec<&'a Region>, usize) {
    let mut with_distance: Vec<(&Region, f64)> = deduped
        .into_iter()
        .map(|r| {
            let d = r.distance_to(&fix.coordinate);
            (r, d)
        })
        .filter(|(_, d)| *d <= config.max_distance_m)
        .collect();
    let nearby = with_distance.len();

    if with_distance.len() <= usable {
        return (with_distance.into_iter().map(|(r, _)| r).collect(), nearby);
    }

    // Near block: priority first, distance second. Far block: distance only.
    // Every near candidate is closer than every far one, so the blocks
    // concatenate without interleaving.
    let (mut near, mut far): (Vec<_>, Vec<_>) = with_distance
        .drain(..)
        .partition(|(_, d)| *d <= config.priority_distance_m);

    near.sort_by(|(a, da), (b, db)| {
        b.effective_priority()
            .cmp(&a.effective_priority())
            .then_with(|| da.total_cmp(db))
    });
    far.sort_by(|(_, da), (_, db)| da.total_cmp(db));

    let picked = near
        .into_iter()
        .chain(far)
        .take(usable)
        .map(|(r, _)| r)
        .collect();
    (picked, nearby)
}

/// Distance-agnostic selection: priority descending, stable on ties.
fn select_without_fix(mut deduped: Vec<&Region>, usable: usize) -> Vec<&Region> {
    if deduped.len() <= usable {
        return deduped;
    }

    deduped.sort_by(|a, b| b.effective_priority().cmp(&a.effective_priority()));
    deduped.truncate(usable);
    deduped
}
