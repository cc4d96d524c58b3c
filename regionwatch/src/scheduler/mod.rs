//! Debounced update scheduling.
//!
//! Multiple near-simultaneous triggers (a sentinel exit plus a visit event,
//! say) must not each run their own reconciliation pass. Debounced requests
//! cancel whatever was armed before them and re-arm a single delayed apply;
//! only the last request inside a quiet interval survives.
//!
//! Implemented as cancel-token-plus-sleep: cancelling the token kills the
//! scheduled unit of work before it delivers, with no observable effect.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Coalesces bursts of refresh requests into one delayed apply.
pub struct UpdateScheduler {
    quiet: Duration,
    pending: Option<CancellationToken>,
}

impl UpdateScheduler {
    /// Create a scheduler with the given quiet interval.
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            pending: None,
        }
    }

    /// Arm a delayed apply, replacing any previously armed one.
    ///
    /// `deliver` runs once the quiet interval elapses without another
    /// `schedule` or `cancel` call. Delivery happens on a spawned task, so
    /// the closure should hand work back to the owning loop (send a command)
    /// rather than doing it inline.
    pub fn schedule<F>(&mut self, deliver: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.cancel();

        let token = CancellationToken::new();
        let armed = token.clone();
        let quiet = self.quiet;

        tokio::spawn(async move {
            tokio::select! {
                _ = armed.cancelled() => {
                    trace!("Scheduled update cancelled before the quiet interval");
                }
                _ = tokio::time::sleep(quiet) => deliver(),
            }
        });

        self.pending = Some(token);
    }

    /// Cancel the armed apply, if any.
    pub fn cancel(&mut self) {
        if let Some(token) = self.pending.take() {
            token.cancel();
        }
    }
}

impl Drop for UpdateScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}
