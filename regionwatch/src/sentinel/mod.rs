//! The sentinel area: movement detection without polling.
//!
//! A single synthetic region is kept centered on the observer's last known
//! fix. The platform's *exit* notification for this region is the engine's
//! only signal that the observer moved significantly; no periodic position
//! polling happens anywhere.
//!
//! The sentinel is replaced, never mutated: once the observer is confirmed
//! outside it, the old registration is stopped and a fresh region is started
//! at the new position.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::MonitorConfig;
use crate::error::{FixError, PlatformError};
use crate::fix::LocationFixBroker;
use crate::geo::{Fix, Region};
use crate::platform::RegionWatcher;

/// Fixed id of the sentinel region.
pub const SENTINEL_REGION_ID: &str = "current-location";

/// Result of [`SentinelAreaManager::ensure_current_area`].
#[derive(Debug, Clone)]
pub enum EnsureOutcome {
    /// The existing sentinel still contains the fix; nothing re-registered.
    Unchanged(Fix),
    /// A new sentinel was armed at the fix position.
    Rearmed(Fix),
    /// A fix was obtained but the replacement sentinel could not be
    /// registered. Movement detection is down until a later cycle succeeds.
    RearmFailed(Fix, PlatformError),
}

impl EnsureOutcome {
    /// The fix obtained while ensuring the area.
    pub fn fix(&self) -> Fix {
        match self {
            EnsureOutcome::Unchanged(fix)
            | EnsureOutcome::Rearmed(fix)
            | EnsureOutcome::RearmFailed(fix, _) => *fix,
        }
    }
}

/// Maintains the single dynamic "current area" region.
pub struct SentinelAreaManager {
    watcher: Arc<dyn RegionWatcher>,
    radius_delta_m: f64,
    max_radius_m: f64,
    platform_max_radius_m: f64,
    current: Option<Region>,
}

impl SentinelAreaManager {
    /// Create a manager registering sentinels through the given watcher.
    pub fn new(watcher: Arc<dyn RegionWatcher>, config: &MonitorConfig) -> Self {
        Self {
            watcher,
            radius_delta_m: config.sentinel_radius_delta_m,
            max_radius_m: config.sentinel_max_radius_m,
            platform_max_radius_m: config.platform_max_radius_m,
            current: None,
        }
    }

    /// Make sure a sentinel covers the observer's current position.
    ///
    /// Obtains a fix through the broker; if the existing sentinel already
    /// contains it, returns without touching the platform. Otherwise stops
    /// the old sentinel and starts a fresh one centered on the fix.
    ///
    /// An `Inaccurate` failure is downgraded to its best-effort fix: the
    /// larger accuracy figure simply inflates the sentinel radius, keeping
    /// movement detection alive on degraded positioning.
    ///
    /// A platform refusal of the replacement registration is reported as
    /// [`EnsureOutcome::RearmFailed`]; the fix is still usable for selection
    /// but no sentinel is armed until a later cycle succeeds.
    pub async fn ensure_current_area(
        &mut self,
        broker: &LocationFixBroker,
    ) -> Result<EnsureOutcome, FixError> {
        let fix = match broker.fetch_fix().await {
            Ok(fix) => fix,
            Err(FixError::Inaccurate(best)) => {
                debug!(accuracy_m = best.accuracy_m, "Arming sentinel on degraded fix");
                best
            }
            Err(e) => return Err(e),
        };

        if let Some(sentinel) = &self.current {
            if sentinel.contains(&fix.coordinate) {
                debug!("Observer still inside sentinel, no re-registration");
                return Ok(EnsureOutcome::Unchanged(fix));
            }
        }

        let radius = self.sentinel_radius(fix.accuracy_m);
        let replacement = Region::new(SENTINEL_REGION_ID, fix.coordinate, radius);

        if self.current.take().is_some() {
            if let Err(e) = self.watcher.stop_watching(SENTINEL_REGION_ID) {
                warn!(error = %e, "Failed to stop previous sentinel");
            }
        }

        match self.watcher.start_watching(&replacement) {
            Ok(()) => {
                info!(
                    latitude = fix.coordinate.latitude,
                    longitude = fix.coordinate.longitude,
                    radius_m = radius,
                    "Sentinel re-armed"
                );
                self.current = Some(replacement);
                Ok(EnsureOutcome::Rearmed(fix))
            }
            Err(e) => {
                // Leave no stale sentinel behind; the next cycle retries.
                warn!(error = %e, "Failed to register sentinel");
                Ok(EnsureOutcome::RearmFailed(fix, e))
            }
        }
    }

    /// Sentinel radius for a fix of the given accuracy.
    ///
    /// `min(max_radius, min(platform_max_radius, accuracy + radius_delta))`.
    fn sentinel_radius(&self, accuracy_m: f64) -> f64 {
        self.max_radius_m
            .min(self.platform_max_radius_m.min(accuracy_m + self.radius_delta_m))
    }

    /// The currently armed sentinel, if any.
    pub fn current(&self) -> Option<&Region> {
        self.current.as_ref()
    }

    /// Whether the given id is the sentinel id.
    pub fn is_sentinel(id: &str) -> bool {
        id == SENTINEL_REGION_ID
    }

    /// Stop watching the sentinel and forget it.
    pub fn teardown(&mut self) {
        if self.current.take().is_some() {
            if let Err(e) = self.watcher.stop_watching(SENTINEL_REGION_ID) {
                warn!(error = %e, "Failed to stop sentinel on teardown");
            } else {
                debug!("Sentinel torn down");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::time::Duration;

    use parking_lot::Mutex;
    use tokio::sync::broadcast;

    use crate::error::PlatformError;
    use crate::geo::Coordinate;
    use crate::platform::{Accuracy, AuthorizationStatus, Positioner};

    #[derive(Debug, Clone, PartialEq)]
    enum WatchOp {
        Start(String, f64),
        Stop(String),
    }

    #[derive(Default)]
    struct RecordingWatcher {
        ops: Mutex<Vec<WatchOp>>,
        watched: Mutex<HashSet<String>>,
    }

    impl RegionWatcher for RecordingWatcher {
        fn start_watching(&self, region: &Region) -> Result<(), PlatformError> {
            self.ops
                .lock()
                .push(WatchOp::Start(region.id.clone(), region.radius_m));
            self.watched.lock().insert(region.id.clone());
            Ok(())
        }

        fn stop_watching(&self, id: &str) -> Result<(), PlatformError> {
            self.ops.lock().push(WatchOp::Stop(id.to_string()));
            self.watched.lock().remove(id);
            Ok(())
        }

        fn watched_ids(&self) -> HashSet<String> {
            self.watched.lock().clone()
        }
    }

    struct FixedPositioner {
        fix: Fix,
        tx: broadcast::Sender<Result<Fix, FixError>>,
    }

    impl FixedPositioner {
        fn new(fix: Fix) -> Arc<Self> {
            let (tx, _) = broadcast::channel(8);
            Arc::new(Self { fix, tx })
        }
    }

    impl Positioner for FixedPositioner {
        fn authorization(&self) -> AuthorizationStatus {
            AuthorizationStatus::Granted
        }

        fn desired_accuracy(&self) -> Accuracy {
            Accuracy::Balanced
        }

        fn set_desired_accuracy(&self, _accuracy: Accuracy) {}

        fn request_fix(&self) {
            let _ = self.tx.send(Ok(self.fix));
        }

        fn subscribe(&self) -> broadcast::Receiver<Result<Fix, FixError>> {
            self.tx.subscribe()
        }
    }

    fn config() -> MonitorConfig {
        let mut config = MonitorConfig::default();
        config.fix_timeout = Duration::from_millis(100);
        config.fix_recency = Duration::from_secs(0);
        config
    }

    fn broker_for(fix: Fix, config: &MonitorConfig) -> LocationFixBroker {
        LocationFixBroker::new(FixedPositioner::new(fix), config)
    }

    #[tokio::test]
    async fn test_first_ensure_arms_sentinel() {
        let watcher = Arc::new(RecordingWatcher::default());
        let config = config();
        let mut manager = SentinelAreaManager::new(watcher.clone(), &config);
        let broker = broker_for(Fix::new(Coordinate::new(53.55, 9.99), 25.0), &config);

        let outcome = manager.ensure_current_area(&broker).await.unwrap();

        assert!(matches!(outcome, EnsureOutcome::Rearmed(_)));
        assert!(watcher.watched_ids().contains(SENTINEL_REGION_ID));
        // accuracy 25 + delta 50 = 75, well under both caps
        assert_eq!(
            watcher.ops.lock().as_slice(),
            &[WatchOp::Start(SENTINEL_REGION_ID.to_string(), 75.0)]
        );
    }

    #[tokio::test]
    async fn test_contained_fix_is_a_noop() {
        let watcher = Arc::new(RecordingWatcher::default());
        let config = config();
        let mut manager = SentinelAreaManager::new(watcher.clone(), &config);

        let position = Coordinate::new(53.55, 9.99);
        let broker = broker_for(Fix::new(position, 25.0), &config);
        manager.ensure_current_area(&broker).await.unwrap();

        // Same position again: sentinel contains it, no stop/start pair
        let outcome = manager.ensure_current_area(&broker).await.unwrap();
        assert!(matches!(outcome, EnsureOutcome::Unchanged(_)));
        assert_eq!(watcher.ops.lock().len(), 1, "Only the initial start");
    }

    #[tokio::test]
    async fn test_departed_fix_replaces_sentinel() {
        let watcher = Arc::new(RecordingWatcher::default());
        let config = config();
        let mut manager = SentinelAreaManager::new(watcher.clone(), &config);

        let broker = broker_for(Fix::new(Coordinate::new(53.55, 9.99), 25.0), &config);
        manager.ensure_current_area(&broker).await.unwrap();

        // ~1.1 km north, outside the 75 m sentinel
        let far_broker = broker_for(Fix::new(Coordinate::new(53.56, 9.99), 25.0), &config);
        let outcome = manager.ensure_current_area(&far_broker).await.unwrap();

        assert!(matches!(outcome, EnsureOutcome::Rearmed(_)));
        let ops = watcher.ops.lock().clone();
        assert_eq!(ops.len(), 3);
        assert_eq!(ops[1], WatchOp::Stop(SENTINEL_REGION_ID.to_string()));
        assert!(matches!(ops[2], WatchOp::Start(_, _)));
    }

    #[tokio::test]
    async fn test_radius_clamped_to_max() {
        let watcher = Arc::new(RecordingWatcher::default());
        let mut config = config();
        config.sentinel_max_radius_m = 500.0;
        let mut manager = SentinelAreaManager::new(watcher.clone(), &config);

        // Degraded fix: 5000 m accuracy misses the 100 m bar, broker reports
        // Inaccurate, manager uses the best-effort fix anyway
        let broker = broker_for(Fix::new(Coordinate::new(53.55, 9.99), 5_000.0), &config);
        let outcome = manager.ensure_current_area(&broker).await.unwrap();

        assert!(matches!(outcome, EnsureOutcome::Rearmed(_)));
        assert_eq!(
            watcher.ops.lock().as_slice(),
            &[WatchOp::Start(SENTINEL_REGION_ID.to_string(), 500.0)]
        );
    }

    /// Watcher whose registrations are always refused by the platform.
    struct RejectingWatcher;

    impl RegionWatcher for RejectingWatcher {
        fn start_watching(&self, _region: &Region) -> Result<(), PlatformError> {
            Err(PlatformError("radius exceeds platform maximum".into()))
        }

        fn stop_watching(&self, _id: &str) -> Result<(), PlatformError> {
            Ok(())
        }

        fn watched_ids(&self) -> HashSet<String> {
            HashSet::new()
        }
    }

    #[tokio::test]
    async fn test_refused_registration_reports_rearm_failed() {
        let config = config();
        let mut manager = SentinelAreaManager::new(Arc::new(RejectingWatcher), &config);
        let broker = broker_for(Fix::new(Coordinate::new(53.55, 9.99), 25.0), &config);

        let outcome = manager.ensure_current_area(&broker).await.unwrap();

        assert!(matches!(outcome, EnsureOutcome::RearmFailed(_, _)));
        assert!(
            manager.current().is_none(),
            "No sentinel may be remembered when the platform refused it"
        );
    }

    #[tokio::test]
    async fn test_teardown_stops_sentinel() {
        let watcher = Arc::new(RecordingWatcher::default());
        let config = config();
        let mut manager = SentinelAreaManager::new(watcher.clone(), &config);

        let broker = broker_for(Fix::new(Coordinate::new(53.55, 9.99), 25.0), &config);
        manager.ensure_current_area(&broker).await.unwrap();

        manager.teardown();
        assert!(manager.current().is_none());
        assert!(!watcher.watched_ids().contains(SENTINEL_REGION_ID));
    }

    #[test]
    fn test_is_sentinel() {
        assert!(SentinelAreaManager::is_sentinel("current-location"));
        assert!(!SentinelAreaManager::is_sentinel("home"));
    }
}
