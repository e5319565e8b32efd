//! HiveGrid core types and configuration.
//!
//! Everything the scheduling pipeline shares lives here:
//!
//! - **`types`** — nodes, operation requests, placements
//! - **`config`** — the TOML-backed run configuration, built once per run
//!   and passed into every component constructor

pub mod config;
pub mod types;

pub use config::{CostTable, FleetConfig, HiveConfig, PlayerConfig, SchedulerConfig};
pub use types::{Hostname, Node, OperationKind, OperationRequest, Placement, PlayerState};
