//! RegionWatch CLI - drive the monitoring engine against a simulated walk.
//!
//! The simulated observer walks a straight track while the engine keeps the
//! bounded watch set centered on it. Region entries, manual check results
//! and engine status land on stdout via tracing.

mod error;
mod sim;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use regionwatch::config::MonitorConfig;
use regionwatch::geo::{Coordinate, Region};
use regionwatch::platform::{CandidateSource, Positioner, RegionWatcher};
use regionwatch::{MonitorEvent, RegionMonitor, StatusKind};

use error::CliError;
use sim::{SimPositioner, SimWatcher, StaticCandidates};

#[derive(Parser)]
#[command(name = "regionwatch", version, about = "Bounded geofence monitoring against a simulated platform")]
struct Cli {
    /// JSON file with the candidate region list (defaults to a built-in demo set)
    #[arg(long)]
    candidates: Option<PathBuf>,

    /// Starting latitude of the simulated observer
    #[arg(long, default_value_t = 53.5511)]
    latitude: f64,

    /// Starting longitude of the simulated observer
    #[arg(long, default_value_t = 9.9937)]
    longitude: f64,

    /// Walking speed in meters per second
    #[arg(long, default_value_t = 12.0)]
    speed_mps: f64,

    /// Simulation tick interval in milliseconds
    #[arg(long, default_value_t = 500)]
    interval_ms: u64,

    /// Stop after this many seconds (runs until Ctrl-C when omitted)
    #[arg(long)]
    duration_secs: Option<u64>,

    /// Cap on concurrently monitored regions, including the sentinel slot
    #[arg(long, default_value_t = 20)]
    max_regions: usize,
}

fn load_candidates(cli: &Cli, start: Coordinate) -> Result<Vec<Region>, CliError> {
    match &cli.candidates {
        Some(path) => {
            let data = std::fs::read_to_string(path)?;
            let candidates: Vec<Region> = serde_json::from_str(&data)?;
            info!(count = candidates.len(), path = %path.display(), "Loaded candidate file");
            Ok(candidates)
        }
        None => {
            let candidates = sim::demo_candidates(start);
            info!(count = candidates.len(), "Using built-in demo candidates");
            Ok(candidates)
        }
    }
}

fn log_event(event: &MonitorEvent) {
    match event {
        MonitorEvent::Entered { region, fix } => {
            info!(region = %region.id, with_fix = fix.is_some(), "ENTERED");
        }
        MonitorEvent::Manual { region, .. } => {
            info!(region = %region.id, "MANUAL CHECK MATCH");
        }
        MonitorEvent::Status { message, kind } => match kind {
            StatusKind::Failure => warn!(kind = %kind, "{}", message),
            _ => info!(kind = %kind, "{}", message),
        },
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let start = Coordinate::new(cli.latitude, cli.longitude);
    let candidates = load_candidates(&cli, start)?;

    let config = MonitorConfig::default()
        .with_max_regions(cli.max_regions)
        .with_debounce_quiet(Duration::from_millis(500));

    let positioner = SimPositioner::new(start);
    let watcher = SimWatcher::new();
    let source = StaticCandidates::new(candidates);
    let (platform_tx, platform_rx) = mpsc::unbounded_channel();

    let (monitor, mut events) = RegionMonitor::spawn(
        config,
        Arc::clone(&positioner) as Arc<dyn Positioner>,
        Arc::clone(&watcher) as Arc<dyn RegionWatcher>,
        source as Arc<dyn CandidateSource>,
        platform_rx,
    )?;

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            log_event(&event);
        }
    });

    monitor.start();

    // Walk north; each tick moves the observer and lets the watcher
    // synthesize boundary crossings from the new position
    let interval = Duration::from_millis(cli.interval_ms);
    let step_deg = cli.speed_mps * interval.as_secs_f64() / 111_200.0;
    let deadline = cli
        .duration_secs
        .map(|secs| tokio::time::Instant::now() + Duration::from_secs(secs));

    let mut ticker = tokio::time::interval(interval);
    let mut position = start;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                position = Coordinate::new(position.latitude + step_deg, position.longitude);
                positioner.set_position(position);
                watcher.observe(&position, &platform_tx);
                if deadline.is_some_and(|d| tokio::time::Instant::now() >= d) {
                    info!("Simulation duration elapsed");
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break;
            }
        }
    }

    monitor.stop();
    // Let the engine flush its teardown status before exiting
    tokio::time::sleep(Duration::from_millis(100)).await;
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
