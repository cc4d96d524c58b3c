//! Single-flight location fix acquisition.
//!
//! The broker sits between the engine and the positioning capability and
//! enforces three disciplines:
//!
//! - **Single flight**: at most one platform-level request is outstanding.
//!   Concurrent callers fan out: they join the in-flight request and all
//!   resolve with the same outcome.
//! - **Recency short-circuit**: a cached fix that is young and accurate
//!   enough answers a request without touching the platform, so repeated
//!   calls inside one update cycle cost nothing.
//! - **Accuracy restore**: the requested accuracy level is raised to
//!   `Precise` for the duration of a fetch and restored on every exit path,
//!   including cancellation, via a drop guard.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::{broadcast, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::config::MonitorConfig;
use crate::error::FixError;
use crate::geo::Fix;
use crate::platform::{Accuracy, Positioner};

/// Outcome channel for callers that joined an in-flight request.
type Waiter = oneshot::Sender<Result<Fix, FixError>>;

/// Timeout-bounded, single-flight fix acquisition.
pub struct LocationFixBroker {
    positioner: Arc<dyn Positioner>,
    timeout: Duration,
    recency: Duration,
    accuracy_m: f64,
    inner: Mutex<BrokerInner>,
}

#[derive(Default)]
struct BrokerInner {
    /// Most recent sufficiently-accurate fix.
    cached: Option<Fix>,
    /// Waiters joined to the in-flight request; `Some` while one is running.
    waiters: Option<Vec<Waiter>>,
    /// Cancels the in-flight request (engine stop).
    cancel: Option<CancellationToken>,
}

enum Role {
    Leader(CancellationToken),
    Follower(oneshot::Receiver<Result<Fix, FixError>>),
}

impl LocationFixBroker {
    /// Create a broker over the given positioning capability.
    pub fn new(positioner: Arc<dyn Positioner>, config: &MonitorConfig) -> Self {
        Self {
            positioner,
            timeout: config.fix_timeout,
            recency: config.fix_recency,
            accuracy_m: config.fix_accuracy_m,
            inner: Mutex::new(BrokerInner::default()),
        }
    }

    /// Obtain a current position fix.
    ///
    /// Suspends until a fix arrives, the deadline elapses, or the capability
    /// reports failure. A recent cached fix short-circuits the request.
    pub async fn fetch_fix(&self) -> Result<Fix, FixError> {
        let role = {
            let mut inner = self.inner.lock();

            if let Some(fix) = inner.cached {
                if fix.satisfies(self.recency, self.accuracy_m, Instant::now()) {
                    trace!(age_ms = fix.age(Instant::now()).as_millis() as u64, "Cached fix short-circuit");
                    return Ok(fix);
                }
            }

            match inner.waiters {
                Some(ref mut waiters) => {
                    let (tx, rx) = oneshot::channel();
                    waiters.push(tx);
                    Role::Follower(rx)
                }
                None => {
                    let token = CancellationToken::new();
                    inner.waiters = Some(Vec::new());
                    inner.cancel = Some(token.clone());
                    Role::Leader(token)
                }
            }
        };

        match role {
            // Joined an in-flight request; a dropped sender means the request
            // was torn down, which is timeout-shaped from our perspective.
            Role::Follower(rx) => {
                trace!("Joined in-flight fix request");
                rx.await.unwrap_or(Err(FixError::Timeout))
            }
            Role::Leader(token) => {
                // If the leading future is dropped before resolving (task
                // abort), the guard drains the waiter slot so later callers
                // start a fresh request instead of joining a dead one.
                let mut guard = LeaderGuard {
                    broker: self,
                    resolved: false,
                };
                let outcome = tokio::select! {
                    _ = token.cancelled() => Err(FixError::Timeout),
                    outcome = self.acquire() => outcome,
                };
                guard.resolved = true;
                self.resolve(outcome)
            }
        }
    }

    /// Resolve the in-flight request, fanning the outcome out to all waiters.
    fn resolve(&self, outcome: Result<Fix, FixError>) -> Result<Fix, FixError> {
        let waiters = {
            let mut inner = self.inner.lock();
            if let Ok(fix) = &outcome {
                inner.cached = Some(*fix);
            }
            inner.cancel = None;
            inner.waiters.take().unwrap_or_default()
        };

        debug!(waiters = waiters.len(), ok = outcome.is_ok(), "Fix request resolved");
        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }
        outcome
    }

    /// Issue the platform request and wait for the first update.
    async fn acquire(&self) -> Result<Fix, FixError> {
        if !self.positioner.authorization().is_usable() {
            return Err(FixError::AccessDenied);
        }

        // Restores the previous accuracy level on drop, cancellation included.
        let _guard = AccuracyGuard::raise(&self.positioner);

        // Subscribe before requesting so no update can be missed.
        let mut updates = self.positioner.subscribe();
        self.positioner.request_fix();

        let deadline = Instant::now() + self.timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(FixError::Timeout);
            }

            match tokio::time::timeout(remaining, updates.recv()).await {
                Err(_) => return Err(FixError::Timeout),
                Ok(Err(broadcast::error::RecvError::Lagged(n))) => {
                    trace!(lagged = n, "Fix update stream lagged");
                    continue;
                }
                Ok(Err(broadcast::error::RecvError::Closed)) => {
                    return Err(FixError::Platform("fix update channel closed".into()))
                }
                Ok(Ok(Err(e))) => return Err(e),
                Ok(Ok(Ok(fix))) => {
                    if fix.accuracy_m <= self.accuracy_m {
                        return Ok(fix);
                    }
                    return Err(FixError::Inaccurate(fix));
                }
            }
        }
    }

    /// Abort the in-flight request, resolving every waiter with `Timeout`.
    ///
    /// Called on engine stop so no caller hangs on a fix that will never
    /// arrive.
    pub fn cancel_pending(&self) {
        let (cancel, waiters) = {
            let mut inner = self.inner.lock();
            (inner.cancel.take(), inner.waiters.take())
        };

        if let Some(token) = cancel {
            token.cancel();
        }
        if let Some(waiters) = waiters {
            if !waiters.is_empty() {
                warn!(waiters = waiters.len(), "Cancelling pending fix request");
            }
            for waiter in waiters {
                let _ = waiter.send(Err(FixError::Timeout));
            }
        }
    }

    /// The most recent sufficiently-accurate fix, regardless of age.
    pub fn cached_fix(&self) -> Option<Fix> {
        self.inner.lock().cached
    }
}

/// Fails the waiters of a leading fetch that is dropped before resolving.
struct LeaderGuard<'a> {
    broker: &'a LocationFixBroker,
    resolved: bool,
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        if self.resolved {
            return;
        }

        let waiters = {
            let mut inner = self.broker.inner.lock();
            inner.cancel = None;
            inner.waiters.take()
        };
        if let Some(waiters) = waiters {
            warn!(waiters = waiters.len(), "Leading fix request dropped mid-flight");
            for waiter in waiters {
                let _ = waiter.send(Err(FixError::Timeout));
            }
        }
    }
}

/// Raises the desired accuracy for the duration of a fetch.
struct AccuracyGuard {
    positioner: Arc<dyn Positioner>,
    previous: Accuracy,
}

impl AccuracyGuard {
    fn raise(positioner: &Arc<dyn Positioner>) -> Self {
        let previous = positioner.desired_accuracy();
        positioner.set_desired_accuracy(Accuracy::Precise);
        Self {
            positioner: Arc::clone(positioner),
            previous,
        }
    }
}

impl Drop for AccuracyGuard {
    fn drop(&mut self) {
        self.positioner.set_desired_accuracy(self.previous);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Coordinate;
    use crate::platform::AuthorizationStatus;

    /// Scripted positioner for broker tests.
    struct MockPositioner {
        authorization: AuthorizationStatus,
        /// Response sent synchronously from `request_fix`, if any.
        response: Option<Result<Fix, FixError>>,
        accuracy: Mutex<Accuracy>,
        accuracy_log: Mutex<Vec<Accuracy>>,
        request_count: Mutex<usize>,
        tx: broadcast::Sender<Result<Fix, FixError>>,
    }

    impl MockPositioner {
        fn new(response: Option<Result<Fix, FixError>>) -> Arc<Self> {
            Self::with_authorization(response, AuthorizationStatus::Granted)
        }

        fn denied() -> Arc<Self> {
            Self::with_authorization(None, AuthorizationStatus::Denied)
        }

        fn with_authorization(
            response: Option<Result<Fix, FixError>>,
            authorization: AuthorizationStatus,
        ) -> Arc<Self> {
            let (tx, _) = broadcast::channel(8);
            Arc::new(Self {
                authorization,
                response,
                accuracy: Mutex::new(Accuracy::Balanced),
                accuracy_log: Mutex::new(Vec::new()),
                request_count: Mutex::new(0),
                tx,
            })
        }

        fn requests(&self) -> usize {
            *self.request_count.lock()
        }

        fn send(&self, update: Result<Fix, FixError>) {
            let _ = self.tx.send(update);
        }
    }

    impl Positioner for MockPositioner {
        fn authorization(&self) -> AuthorizationStatus {
            self.authorization
        }

        fn desired_accuracy(&self) -> Accuracy {
            *self.accuracy.lock()
        }

        fn set_desired_accuracy(&self, accuracy: Accuracy) {
            *self.accuracy.lock() = accuracy;
            self.accuracy_log.lock().push(accuracy);
        }

        fn request_fix(&self) {
            *self.request_count.lock() += 1;
            if let Some(response) = &self.response {
                let _ = self.tx.send(response.clone());
            }
        }

        fn subscribe(&self) -> broadcast::Receiver<Result<Fix, FixError>> {
            self.tx.subscribe()
        }
    }

    fn good_fix() -> Fix {
        Fix::new(Coordinate::new(53.55, 9.99), 25.0)
    }

    fn broker_config() -> MonitorConfig {
        let mut config = MonitorConfig::default();
        config.fix_timeout = Duration::from_millis(100);
        config
    }

    #[tokio::test]
    async fn test_fetch_resolves_with_platform_fix() {
        let positioner = MockPositioner::new(Some(Ok(good_fix())));
        let broker = LocationFixBroker::new(positioner.clone(), &broker_config());

        let fix = broker.fetch_fix().await.unwrap();
        assert_eq!(fix.accuracy_m, 25.0);
        assert_eq!(positioner.requests(), 1);
    }

    #[tokio::test]
    async fn test_cached_fix_short_circuits_second_call() {
        let positioner = MockPositioner::new(Some(Ok(good_fix())));
        let broker = LocationFixBroker::new(positioner.clone(), &broker_config());

        broker.fetch_fix().await.unwrap();
        broker.fetch_fix().await.unwrap();

        assert_eq!(positioner.requests(), 1, "Second call should hit the cache");
    }

    #[tokio::test]
    async fn test_access_denied_without_authorization() {
        let positioner = MockPositioner::denied();
        let broker = LocationFixBroker::new(positioner, &broker_config());

        assert!(matches!(
            broker.fetch_fix().await,
            Err(FixError::AccessDenied)
        ));
    }

    #[tokio::test]
    async fn test_timeout_when_platform_is_silent() {
        let positioner = MockPositioner::new(None);
        let broker = LocationFixBroker::new(positioner, &broker_config());

        assert!(matches!(broker.fetch_fix().await, Err(FixError::Timeout)));
    }

    #[tokio::test]
    async fn test_inaccurate_fix_carried_in_error() {
        let sloppy = Fix::new(Coordinate::new(53.55, 9.99), 500.0);
        let positioner = MockPositioner::new(Some(Ok(sloppy)));
        let broker = LocationFixBroker::new(positioner, &broker_config());

        match broker.fetch_fix().await {
            Err(FixError::Inaccurate(best)) => assert_eq!(best.accuracy_m, 500.0),
            other => panic!("Expected Inaccurate, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_platform_failure_propagates() {
        let positioner = MockPositioner::new(Some(Err(FixError::Platform("gps off".into()))));
        let broker = LocationFixBroker::new(positioner, &broker_config());

        assert!(matches!(
            broker.fetch_fix().await,
            Err(FixError::Platform(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_callers_fan_out_one_request() {
        let positioner = MockPositioner::new(None);
        let broker = Arc::new(LocationFixBroker::new(positioner.clone(), &broker_config()));

        let b1 = Arc::clone(&broker);
        let b2 = Arc::clone(&broker);
        let t1 = tokio::spawn(async move { b1.fetch_fix().await });
        let t2 = tokio::spawn(async move { b2.fetch_fix().await });

        // Let both callers reach the broker before the update arrives
        tokio::time::sleep(Duration::from_millis(10)).await;
        positioner.send(Ok(good_fix()));

        let r1 = t1.await.unwrap().unwrap();
        let r2 = t2.await.unwrap().unwrap();

        assert_eq!(r1, r2, "Both callers resolve with the same outcome");
        assert_eq!(positioner.requests(), 1, "Only one platform request");
    }

    #[tokio::test]
    async fn test_cancel_pending_resolves_waiters_with_timeout() {
        let positioner = MockPositioner::new(None);
        let broker = Arc::new(LocationFixBroker::new(positioner, &broker_config()));

        let b1 = Arc::clone(&broker);
        let b2 = Arc::clone(&broker);
        let t1 = tokio::spawn(async move { b1.fetch_fix().await });
        let t2 = tokio::spawn(async move { b2.fetch_fix().await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        broker.cancel_pending();

        assert!(matches!(t1.await.unwrap(), Err(FixError::Timeout)));
        assert!(matches!(t2.await.unwrap(), Err(FixError::Timeout)));
    }

    #[tokio::test]
    async fn test_aborted_leader_resolves_followers() {
        let positioner = MockPositioner::new(None);
        let broker = Arc::new(LocationFixBroker::new(positioner, &broker_config()));

        let b1 = Arc::clone(&broker);
        let leader = tokio::spawn(async move { b1.fetch_fix().await });
        tokio::time::sleep(Duration::from_millis(10)).await;

        let b2 = Arc::clone(&broker);
        let follower = tokio::spawn(async move { b2.fetch_fix().await });
        tokio::time::sleep(Duration::from_millis(10)).await;

        leader.abort();

        assert!(matches!(follower.await.unwrap(), Err(FixError::Timeout)));
        // The slot is free again: a new call leads a fresh request
        assert!(matches!(broker.fetch_fix().await, Err(FixError::Timeout)));
    }

    #[tokio::test]
    async fn test_accuracy_raised_and_restored() {
        let positioner = MockPositioner::new(Some(Ok(good_fix())));
        let broker = LocationFixBroker::new(positioner.clone(), &broker_config());

        broker.fetch_fix().await.unwrap();

        let log = positioner.accuracy_log.lock().clone();
        assert_eq!(log, vec![Accuracy::Precise, Accuracy::Balanced]);
        assert_eq!(positioner.desired_accuracy(), Accuracy::Balanced);
    }

    #[tokio::test]
    async fn test_accuracy_restored_on_timeout() {
        let positioner = MockPositioner::new(None);
        let broker = LocationFixBroker::new(positioner.clone(), &broker_config());

        let _ = broker.fetch_fix().await;
        assert_eq!(positioner.desired_accuracy(), Accuracy::Balanced);
    }
}
