//! The region monitor: public face of the engine.
//!
//! A [`RegionMonitor`] is a cheap, cloneable handle to a single engine task
//! that owns every piece of mutable monitoring state. Handles enqueue
//! commands; the engine applies them in order, so `start()` followed by
//! `update(...)` behaves exactly as written even though both return
//! immediately.
//!
//! # Example
//!
//! ```ignore
//! use regionwatch::config::MonitorConfig;
//! use regionwatch::monitor::RegionMonitor;
//! use tokio::sync::mpsc;
//!
//! let (platform_tx, platform_rx) = mpsc::unbounded_channel();
//! let (monitor, mut events) = RegionMonitor::spawn(
//!     MonitorConfig::default(),
//!     positioner,
//!     watcher,
//!     source,
//!     platform_rx,
//! )?;
//!
//! monitor.start();
//! while let Some(event) = events.recv().await {
//!     // react to Entered / Manual / Status
//! }
//! ```

mod cooldown;
mod engine;

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::warn;

use crate::config::MonitorConfig;
use crate::error::ConfigError;
use crate::events::MonitorEvent;
use crate::geo::Region;
use crate::platform::{CandidateSource, PlatformEvent, Positioner, RegionWatcher};

use engine::{EngineCommand, MonitorEngine};

/// Handle to a running monitoring engine.
#[derive(Clone)]
pub struct RegionMonitor {
    commands: mpsc::UnboundedSender<EngineCommand>,
}

impl RegionMonitor {
    /// Validate the configuration and spawn the engine task.
    ///
    /// `platform_events` is the channel the host feeds region entry/exit and
    /// visit notifications into. Returns the handle and the public event
    /// stream. Must be called from within a Tokio runtime.
    pub fn spawn(
        config: MonitorConfig,
        positioner: Arc<dyn Positioner>,
        watcher: Arc<dyn RegionWatcher>,
        source: Arc<dyn CandidateSource>,
        platform_events: mpsc::UnboundedReceiver<PlatformEvent>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<MonitorEvent>), ConfigError> {
        config.validate()?;

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let engine = MonitorEngine::new(
            config,
            positioner,
            watcher,
            source,
            events_tx,
            commands_tx.clone(),
        );
        tokio::spawn(engine.run(commands_rx, platform_events));

        Ok((
            Self {
                commands: commands_tx,
            },
            events_rx,
        ))
    }

    /// Begin monitoring. Idempotent; a no-op while already active.
    pub fn start(&self) {
        self.send(EngineCommand::Start);
    }

    /// Stop monitoring: tear down the sentinel, cancel pending work.
    /// Idempotent; a no-op while inactive.
    pub fn stop(&self) {
        self.send(EngineCommand::Stop);
    }

    /// Immediate reconciliation with an externally supplied candidate list.
    pub fn update(&self, candidates: Vec<Region>) {
        self.send(EngineCommand::Update(candidates));
    }

    /// Debounced variant of [`update`](Self::update): coalesces bursts of
    /// calls into one reconciliation using the candidates of the last call.
    pub fn schedule_update(&self, candidates: Vec<Region>) {
        self.send(EngineCommand::ScheduleUpdate(candidates));
    }

    /// Manual proximity check against candidate geometry; emits a
    /// [`MonitorEvent::Manual`] for the nearest containing region, if any.
    pub fn check_now(&self) {
        self.send(EngineCommand::CheckNow);
    }

    fn send(&self, command: EngineCommand) {
        if self.commands.send(command).is_err() {
            warn!("Engine task is gone, command dropped");
        }
    }
}
