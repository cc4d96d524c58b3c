//! The engine actor: one task owns all mutable monitoring state.
//!
//! External trigger callbacks never mutate state directly; they enqueue
//! commands or platform events, and this loop consumes them in order. Each
//! update cycle (re-arm sentinel, fetch candidates, select, reconcile) runs
//! inline in the loop, so no two reconciliation passes ever interleave and
//! the watched set is only read-modify-written from here.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::config::MonitorConfig;
use crate::events::{MonitorEvent, StatusKind, UpdateTrigger};
use crate::fix::LocationFixBroker;
use crate::geo::{Fix, Region};
use crate::monitor::cooldown::CooldownTable;
use crate::platform::{
    CandidateSource, PlatformEvent, Positioner, RegionWatcher, VisitKind,
};
use crate::reconciler::MonitorSetReconciler;
use crate::scheduler::UpdateScheduler;
use crate::selector::{select, Selection, SelectorConfig};
use crate::sentinel::{EnsureOutcome, SentinelAreaManager};

/// Commands from [`RegionMonitor`](super::RegionMonitor) handles.
#[derive(Debug)]
pub(crate) enum EngineCommand {
    Start,
    Stop,
    Update(Vec<Region>),
    ScheduleUpdate(Vec<Region>),
    ApplyScheduled(Vec<Region>),
    CheckNow,
}

pub(super) struct MonitorEngine {
    config: MonitorConfig,
    selector_config: SelectorConfig,
    watcher: Arc<dyn RegionWatcher>,
    source: Arc<dyn CandidateSource>,
    broker: LocationFixBroker,
    sentinel: SentinelAreaManager,
    reconciler: MonitorSetReconciler,
    scheduler: UpdateScheduler,
    cooldowns: CooldownTable,
    /// Last fetched candidate universe; superseded in full on every fetch.
    candidates: Vec<Region>,
    last_selection: Option<Selection>,
    /// Whether the last reconcile applied without platform failures.
    last_apply_clean: bool,
    active: bool,
    events: mpsc::UnboundedSender<MonitorEvent>,
    /// Self-loop sender for scheduler deliveries.
    commands: mpsc::UnboundedSender<EngineCommand>,
}

impl MonitorEngine {
    pub(super) fn new(
        config: MonitorConfig,
        positioner: Arc<dyn Positioner>,
        watcher: Arc<dyn RegionWatcher>,
        source: Arc<dyn CandidateSource>,
        events: mpsc::UnboundedSender<MonitorEvent>,
        commands: mpsc::UnboundedSender<EngineCommand>,
    ) -> Self {
        Self {
            selector_config: SelectorConfig::from(&config),
            broker: LocationFixBroker::new(positioner, &config),
            sentinel: SentinelAreaManager::new(Arc::clone(&watcher), &config),
            reconciler: MonitorSetReconciler::new(Arc::clone(&watcher)),
            scheduler: UpdateScheduler::new(config.debounce_quiet),
            cooldowns: CooldownTable::new(config.entry_cooldown),
            watcher,
            source,
            candidates: Vec::new(),
            last_selection: None,
            last_apply_clean: true,
            active: false,
            events,
            commands,
            config,
        }
    }

    /// Consume commands and platform events until every handle is dropped.
    pub(super) async fn run(
        mut self,
        mut commands_rx: mpsc::UnboundedReceiver<EngineCommand>,
        mut platform_rx: mpsc::UnboundedReceiver<PlatformEvent>,
    ) {
        let mut platform_open = true;
        loop {
            tokio::select! {
                command = commands_rx.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                event = platform_rx.recv(), if platform_open => match event {
                    Some(event) => self.handle_platform_event(event).await,
                    None => platform_open = false,
                },
            }
        }

        self.handle_stop();
        debug!("Engine loop exited");
    }

    async fn handle_command(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::Start => self.handle_start().await,
            EngineCommand::Stop => self.handle_stop(),
            EngineCommand::Update(candidates) => {
                if self.active {
                    self.update_cycle(UpdateTrigger::ExternalUpdate, Some(candidates))
                        .await;
                } else {
                    debug!("Ignoring update while inactive");
                }
            }
            EngineCommand::ScheduleUpdate(candidates) => {
                if self.active {
                    let commands = self.commands.clone();
                    self.scheduler.schedule(move || {
                        let _ = commands.send(EngineCommand::ApplyScheduled(candidates));
                    });
                } else {
                    debug!("Ignoring scheduled update while inactive");
                }
            }
            EngineCommand::ApplyScheduled(candidates) => {
                if self.active {
                    self.update_cycle(UpdateTrigger::ExternalUpdate, Some(candidates))
                        .await;
                }
            }
            EngineCommand::CheckNow => self.handle_check_now().await,
        }
    }

    async fn handle_platform_event(&mut self, event: PlatformEvent) {
        if !self.active {
            trace!(?event, "Dropping platform event while inactive");
            return;
        }

        match event {
            PlatformEvent::RegionExited(id) => {
                if SentinelAreaManager::is_sentinel(&id) {
                    info!("Departed current area");
                    self.update_cycle(UpdateTrigger::DepartedCurrentArea, None)
                        .await;
                } else {
                    trace!(region = %id, "Region exit noted");
                }
            }
            PlatformEvent::RegionEntered(id) => self.handle_region_entered(id).await,
            PlatformEvent::Visit(kind) => {
                if self.config.enable_visit_monitoring {
                    let kind_name = match kind {
                        VisitKind::Arrival => "arrival",
                        VisitKind::Departure => "departure",
                    };
                    self.status(StatusKind::Visit, format!("visit {} detected", kind_name));
                    self.update_cycle(UpdateTrigger::VisitMonitoring, None).await;
                }
            }
        }
    }

    async fn handle_start(&mut self) {
        if self.active {
            debug!("Already active, start is a no-op");
            return;
        }

        self.active = true;
        info!("Monitoring started");
        self.status(StatusKind::StateChange, "monitoring started");
        self.update_cycle(UpdateTrigger::Start, None).await;
    }

    fn handle_stop(&mut self) {
        if !self.active {
            return;
        }

        self.active = false;
        self.scheduler.cancel();
        self.broker.cancel_pending();

        for id in self.watcher.watched_ids() {
            if !SentinelAreaManager::is_sentinel(&id) {
                if let Err(e) = self.watcher.stop_watching(&id) {
                    warn!(region = %id, error = %e, "Failed to stop watching on shutdown");
                }
            }
        }
        self.sentinel.teardown();

        self.last_selection = None;
        self.last_apply_clean = true;
        self.cooldowns.clear();
        info!("Monitoring stopped");
        self.status(StatusKind::StateChange, "monitoring stopped");
    }

    /// One full update cycle: re-arm sentinel, refresh candidates, select,
    /// reconcile.
    ///
    /// A failed fix degrades the cycle to distance-agnostic selection; a
    /// failed candidate fetch keeps the previous candidate set. Neither
    /// aborts the cycle.
    async fn update_cycle(&mut self, trigger: UpdateTrigger, provided: Option<Vec<Region>>) {
        self.status(StatusKind::Refreshing, format!("update cycle ({})", trigger));

        let observer = match self.sentinel.ensure_current_area(&self.broker).await {
            Ok(EnsureOutcome::Rearmed(fix)) => {
                self.status(
                    StatusKind::SentinelUpdated,
                    format!(
                        "sentinel re-armed at {:.5},{:.5}",
                        fix.coordinate.latitude, fix.coordinate.longitude
                    ),
                );
                Some(fix)
            }
            Ok(EnsureOutcome::Unchanged(fix)) => Some(fix),
            Ok(EnsureOutcome::RearmFailed(fix, e)) => {
                self.status(
                    StatusKind::Failure,
                    format!("sentinel registration failed, movement detection degraded: {}", e),
                );
                Some(fix)
            }
            Err(e) => {
                self.status(
                    StatusKind::Failure,
                    format!("no fix, selection degrades to distance-agnostic: {}", e),
                );
                None
            }
        };

        match provided {
            Some(candidates) => self.candidates = candidates,
            None => match self.source.fetch(trigger).await {
                Ok(candidates) => self.candidates = candidates,
                Err(e) => {
                    self.status(
                        StatusKind::Failure,
                        format!("candidate fetch failed, keeping previous set: {}", e),
                    );
                }
            },
        }

        let selection = select(
            &self.candidates,
            self.config.max_regions_to_monitor,
            observer.as_ref(),
            &self.selector_config,
        );

        // The shortcut only holds when the previous reconcile applied in
        // full; a failed registration must be retried even though the
        // selection itself is stable.
        if self.last_apply_clean && self.last_selection.as_ref() == Some(&selection) {
            debug!(selected = selection.len(), "Selection unchanged, skipping reconciliation");
            return;
        }

        let stats = self.reconciler.reconcile(&selection, &self.candidates);
        self.status(StatusKind::Refreshing, stats.summary());
        self.last_selection = Some(selection);
        self.last_apply_clean = stats.failures == 0;
    }

    /// Entry signals are trusted only after a refresh: the region may have
    /// left the candidate universe or the selection since it was registered.
    async fn handle_region_entered(&mut self, id: String) {
        if SentinelAreaManager::is_sentinel(&id) {
            trace!("Ignoring entry into own sentinel");
            return;
        }

        self.update_cycle(UpdateTrigger::RegionMonitoring, None).await;

        let still_selected = self
            .last_selection
            .as_ref()
            .is_some_and(|s| s.contains(&id));
        if !still_selected {
            self.status(
                StatusKind::Entered,
                format!("entry for {} ignored: region no longer selected", id),
            );
            return;
        }

        // Best effort; a missing fix never suppresses the event
        let fix = self.best_effort_fix().await;

        if !self.cooldowns.check_and_record(&id, Instant::now()) {
            self.status(
                StatusKind::Entered,
                format!("entry for {} suppressed by cooldown", id),
            );
            return;
        }

        match self.candidates.iter().find(|r| r.id == id) {
            Some(region) => {
                info!(region = %id, with_fix = fix.is_some(), "Region entered");
                self.emit(MonitorEvent::Entered {
                    region: region.clone(),
                    fix,
                });
            }
            None => {
                // Selection only picks ids out of the candidate list
                warn!(region = %id, "Selected region missing from candidates");
            }
        }
    }

    /// Manual proximity check: test the fix against candidate geometry
    /// directly instead of waiting for the watching capability.
    async fn handle_check_now(&mut self) {
        if !self.active {
            debug!("Ignoring manual check while inactive");
            return;
        }

        self.update_cycle(UpdateTrigger::Manual, None).await;

        let fix = match self.best_effort_fix().await {
            Some(fix) => fix,
            None => {
                self.status(StatusKind::Failure, "manual check aborted: no fix");
                return;
            }
        };

        let containing = self
            .candidates
            .iter()
            .filter(|r| r.contains(&fix.coordinate))
            .min_by(|a, b| {
                a.distance_to(&fix.coordinate)
                    .total_cmp(&b.distance_to(&fix.coordinate))
            });

        match containing {
            Some(region) => {
                info!(region = %region.id, "Manual check matched");
                self.emit(MonitorEvent::Manual {
                    region: region.clone(),
                    fix,
                });
            }
            None => {
                self.status(StatusKind::Entered, "manual check: no containing region");
            }
        }
    }

    /// Fetch a fix, tolerating degraded precision.
    async fn best_effort_fix(&mut self) -> Option<Fix> {
        match self.broker.fetch_fix().await {
            Ok(fix) => Some(fix),
            Err(e) => {
                if let Some(best) = e.best_effort_fix() {
                    return Some(best);
                }
                self.status(StatusKind::Failure, format!("fix unavailable: {}", e));
                None
            }
        }
    }

    fn status(&self, kind: StatusKind, message: impl Into<String>) {
        let message = message.into();
        debug!(kind = %kind, "{}", message);
        self.emit(MonitorEvent::Status { message, kind });
    }

    fn emit(&self, event: MonitorEvent) {
        if self.events.send(event).is_err() {
            trace!("Event receiver dropped");
        }
    }
}
