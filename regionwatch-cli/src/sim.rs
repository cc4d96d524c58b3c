//! Simulated host platform.
//!
//! Stands in for an OS location stack: a positioner that answers with the
//! simulated position, a watcher whose boundary crossings are synthesized by
//! comparing that position against the watched set each tick, and a
//! candidate source over a fixed list.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info};

use regionwatch::error::{CandidateError, FixError, PlatformError};
use regionwatch::geo::{Coordinate, Fix, Region};
use regionwatch::platform::{
    Accuracy, AuthorizationStatus, CandidateSource, PlatformEvent, Positioner, RegionWatcher,
};
use regionwatch::UpdateTrigger;

/// Horizontal accuracy reported for every simulated fix, meters.
const SIM_ACCURACY_M: f64 = 15.0;

/// Positioner backed by the simulated position.
pub struct SimPositioner {
    position: Mutex<Coordinate>,
    desired: Mutex<Accuracy>,
    updates: broadcast::Sender<Result<Fix, FixError>>,
}

impl SimPositioner {
    pub fn new(start: Coordinate) -> Arc<Self> {
        let (updates, _) = broadcast::channel(16);
        Arc::new(Self {
            position: Mutex::new(start),
            desired: Mutex::new(Accuracy::Balanced),
            updates,
        })
    }

    pub fn set_position(&self, position: Coordinate) {
        *self.position.lock() = position;
    }
}

impl Positioner for SimPositioner {
    fn authorization(&self) -> AuthorizationStatus {
        AuthorizationStatus::Granted
    }

    fn desired_accuracy(&self) -> Accuracy {
        *self.desired.lock()
    }

    fn set_desired_accuracy(&self, accuracy: Accuracy) {
        debug!(?accuracy, "Desired accuracy changed");
        *self.desired.lock() = accuracy;
    }

    fn request_fix(&self) {
        let fix = Fix::new(*self.position.lock(), SIM_ACCURACY_M);
        let _ = self.updates.send(Ok(fix));
    }

    fn subscribe(&self) -> broadcast::Receiver<Result<Fix, FixError>> {
        self.updates.subscribe()
    }
}

/// Watcher that derives boundary crossings from position ticks.
pub struct SimWatcher {
    watched: Mutex<HashMap<String, Region>>,
    /// Regions the simulated observer was inside at the previous tick.
    inside: Mutex<HashSet<String>>,
}

impl SimWatcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            watched: Mutex::new(HashMap::new()),
            inside: Mutex::new(HashSet::new()),
        })
    }

    /// Compare the position against the watched set and synthesize
    /// entry/exit events for every boundary crossed since the last tick.
    pub fn observe(&self, position: &Coordinate, events: &mpsc::UnboundedSender<PlatformEvent>) {
        let watched = self.watched.lock();
        let mut inside = self.inside.lock();

        for (id, region) in watched.iter() {
            let contained = region.contains(position);
            if contained && inside.insert(id.clone()) {
                let _ = events.send(PlatformEvent::RegionEntered(id.clone()));
            } else if !contained && inside.remove(id) {
                let _ = events.send(PlatformEvent::RegionExited(id.clone()));
            }
        }

        // Watches can be dropped while the observer stands inside them
        inside.retain(|id| watched.contains_key(id));
    }
}

impl RegionWatcher for SimWatcher {
    fn start_watching(&self, region: &Region) -> Result<(), PlatformError> {
        info!(region = %region.id, radius_m = region.radius_m, "Watch started");
        self.watched
            .lock()
            .insert(region.id.clone(), region.clone());
        Ok(())
    }

    fn stop_watching(&self, id: &str) -> Result<(), PlatformError> {
        info!(region = %id, "Watch stopped");
        self.watched.lock().remove(id);
        Ok(())
    }

    fn watched_ids(&self) -> HashSet<String> {
        self.watched.lock().keys().cloned().collect()
    }
}

/// Candidate source over a fixed in-memory list.
pub struct StaticCandidates {
    candidates: Vec<Region>,
}

impl StaticCandidates {
    pub fn new(candidates: Vec<Region>) -> Arc<Self> {
        Arc::new(Self { candidates })
    }
}

impl CandidateSource for StaticCandidates {
    fn fetch(&self, trigger: UpdateTrigger) -> BoxFuture<'_, Result<Vec<Region>, CandidateError>> {
        debug!(%trigger, count = self.candidates.len(), "Serving candidate list");
        let list = self.candidates.clone();
        Box::pin(async move { Ok(list) })
    }
}

/// Built-in demo universe: a string of regions along the simulated track.
///
/// The observer walks north from `start`, so regions sit at increasing
/// northward offsets with mixed priorities and a couple of distant
/// never-selected entries.
pub fn demo_candidates(start: Coordinate) -> Vec<Region> {
    let at = |meters: f64| Coordinate::new(start.latitude + meters / 111_200.0, start.longitude);

    let mut candidates = vec![
        Region::new("cafe", at(250.0), 120.0).with_priority(800),
        Region::new("bookshop", at(600.0), 100.0).with_priority(650),
        Region::new("park-gate", at(1_100.0), 180.0),
        Region::new("museum", at(1_700.0), 150.0).with_priority(900),
        Region::new("harbor", at(2_400.0), 250.0).with_priority(400),
        Region::new("stadium", at(3_200.0), 300.0),
        Region::new("airport", at(9_000.0), 800.0).with_priority(700),
    ];

    // Beyond the consideration distance while at the start
    candidates.push(Region::new("other-town", at(15_000.0), 500.0).with_priority(990));
    candidates
}
