//! RegionWatch - bounded geofence monitoring engine
//!
//! Maintains a continuously refreshed working set of geographic regions to
//! watch for entry events, under a hard platform cap on how many regions may
//! be monitored at once, while minimizing registration churn and battery
//! cost.
//!
//! The engine itself never talks to an OS location stack: hosts implement
//! the collaborator traits in [`platform`] and feed boundary-crossing and
//! visit notifications into a channel. One spawned task serializes every
//! mutation; see [`monitor`] for the public handle.
//!
//! # Architecture
//!
//! - [`geo`] - region, coordinate, and fix value types plus distance math
//! - [`fix`] - single-flight, timeout-bounded location fix acquisition
//! - [`sentinel`] - the self-re-arming "current area" region that turns
//!   platform exit events into movement detection
//! - [`selector`] - pure priority/proximity selection under the capacity cap
//! - [`reconciler`] - minimal add/remove diffing against the watch set
//! - [`scheduler`] - debounced coalescing of rapid refresh requests
//! - [`monitor`] - the engine actor and its cloneable handle

pub mod config;
pub mod error;
pub mod events;
pub mod fix;
pub mod geo;
pub mod monitor;
pub mod platform;
pub mod reconciler;
pub mod scheduler;
pub mod selector;
pub mod sentinel;

pub use config::MonitorConfig;
pub use events::{MonitorEvent, StatusKind, UpdateTrigger};
pub use geo::{Coordinate, Fix, Region};
pub use monitor::RegionMonitor;
pub use sentinel::SENTINEL_REGION_ID;
