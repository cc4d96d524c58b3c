//! Collaborator seams for the host platform.
//!
//! The engine never talks to an OS location stack directly. Hosts implement
//! these traits and feed boundary-crossing and visit events into the engine's
//! platform-event channel; the engine consumes everything from its single
//! task, so implementations need no internal ordering guarantees beyond
//! being `Send + Sync`.

use std::collections::HashSet;

use futures::future::BoxFuture;
use tokio::sync::broadcast;

use crate::error::{CandidateError, FixError, PlatformError};
use crate::events::UpdateTrigger;
use crate::geo::{Fix, Region};

/// Authorization state of the positioning capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationStatus {
    /// Position fixes may be requested.
    Granted,
    /// The host user refused; fix requests fail with `AccessDenied`.
    Denied,
    /// Not yet decided; treated like `Denied` until resolved externally.
    Undetermined,
}

impl AuthorizationStatus {
    /// Whether a fix request can be issued.
    pub fn is_usable(&self) -> bool {
        matches!(self, AuthorizationStatus::Granted)
    }
}

/// Requested accuracy level on the positioning capability.
///
/// The fix broker temporarily raises this to `Precise` for the duration of
/// a fetch and restores the previous level afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accuracy {
    /// Coarse, low-power positioning.
    Coarse,
    /// Default balanced mode.
    Balanced,
    /// Best available precision; highest power draw.
    Precise,
}

/// The positioning capability.
///
/// `request_fix` is fire-and-forget; results (or failures) arrive on the
/// broadcast channel returned by `subscribe`. Callers subscribe before
/// requesting so no update can be missed.
pub trait Positioner: Send + Sync {
    /// Current authorization state.
    fn authorization(&self) -> AuthorizationStatus;

    /// Currently requested accuracy level.
    fn desired_accuracy(&self) -> Accuracy;

    /// Change the requested accuracy level.
    fn set_desired_accuracy(&self, accuracy: Accuracy);

    /// Ask the platform to begin acquiring a fix.
    fn request_fix(&self);

    /// Subscribe to fix updates and failures.
    fn subscribe(&self) -> broadcast::Receiver<Result<Fix, FixError>>;
}

/// The region watching capability.
///
/// Turns a region descriptor into a boundary-crossing notification stream.
/// Entry/exit notifications are not part of this trait; the host forwards
/// them as [`PlatformEvent`]s.
pub trait RegionWatcher: Send + Sync {
    /// Begin watching a region for boundary crossings.
    fn start_watching(&self, region: &Region) -> Result<(), PlatformError>;

    /// Stop watching the region with the given id.
    fn stop_watching(&self, id: &str) -> Result<(), PlatformError>;

    /// Ids of all currently watched regions.
    fn watched_ids(&self) -> HashSet<String>;
}

/// The external data source supplying the candidate region list.
///
/// Each fetch supersedes the previous candidate set in full; there is no
/// incremental merge.
pub trait CandidateSource: Send + Sync {
    /// Fetch the current candidate universe.
    fn fetch(&self, trigger: UpdateTrigger) -> BoxFuture<'_, Result<Vec<Region>, CandidateError>>;
}

/// Kind of visit reported by the visit detection source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitKind {
    /// The observer settled at a place.
    Arrival,
    /// The observer left a place.
    Departure,
}

/// Events the host feeds into the engine's platform-event channel.
///
/// External capabilities deliver notifications via message passing rather
/// than direct dispatch; the engine's single task consumes them in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformEvent {
    /// A watched region's boundary was crossed inward.
    RegionEntered(String),
    /// A watched region's boundary was crossed outward.
    RegionExited(String),
    /// The visit source detected an arrival or departure.
    Visit(VisitKind),
}
