//! hive.toml configuration parser.
//!
//! One `HiveConfig` is constructed at startup and handed into every
//! component constructor — nothing reads configuration ambiently.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::types::{Node, OperationKind};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HiveConfig {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub fleet: FleetConfig,
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub costs: CostTable,
    /// Static node list for standalone mode.
    #[serde(default)]
    pub nodes: Vec<Node>,
}

/// Batcher/controller tick parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Minimum sleep between scheduling ticks.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Inter-stage completion gap within a batch.
    #[serde(default = "default_gap_ms")]
    pub gap_ms: u64,
    /// Hack-fraction candidates, tried largest-first against the tick's
    /// capacity budget.
    #[serde(default = "default_hack_fractions")]
    pub hack_fractions: Vec<f64>,
    /// Bound of the dispatch queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Fill leftover node capacity with share workers after packing.
    #[serde(default)]
    pub share_spare_capacity: bool,
}

/// Fleet-wide placement parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetConfig {
    /// Hostname of the distinguished home node.
    #[serde(default = "default_home")]
    pub home: String,
    /// Capacity units held back on the home node.
    #[serde(default = "default_home_reserve")]
    pub home_reserve: u64,
    /// Directory worker binaries are deployed from.
    #[serde(default = "default_payload_dir")]
    pub payload_dir: String,
}

/// Player skill snapshot read at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    #[serde(default = "default_hack_skill")]
    pub hack_skill: u32,
}

/// Per-thread memory cost of each worker binary, in capacity units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostTable {
    #[serde(default = "default_hack_cost")]
    pub hack: u64,
    #[serde(default = "default_weaken_cost")]
    pub weaken: u64,
    #[serde(default = "default_grow_cost")]
    pub grow: u64,
    #[serde(default = "default_share_cost")]
    pub share: u64,
}

impl CostTable {
    pub fn cost_of(&self, kind: OperationKind) -> u64 {
        match kind {
            OperationKind::Hack => self.hack,
            OperationKind::Weaken => self.weaken,
            OperationKind::Grow => self.grow,
            OperationKind::Share => self.share,
        }
    }
}

fn default_tick_interval_ms() -> u64 {
    1_000
}
fn default_gap_ms() -> u64 {
    200
}
fn default_hack_fractions() -> Vec<f64> {
    vec![0.5, 0.25, 0.1, 0.05]
}
fn default_queue_capacity() -> usize {
    64
}
fn default_home() -> String {
    "home".to_string()
}
fn default_home_reserve() -> u64 {
    64
}
fn default_payload_dir() -> String {
    "payloads".to_string()
}
fn default_hack_skill() -> u32 {
    100
}
fn default_hack_cost() -> u64 {
    17
}
fn default_weaken_cost() -> u64 {
    18
}
fn default_grow_cost() -> u64 {
    18
}
fn default_share_cost() -> u64 {
    40
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            gap_ms: default_gap_ms(),
            hack_fractions: default_hack_fractions(),
            queue_capacity: default_queue_capacity(),
            share_spare_capacity: false,
        }
    }
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            home: default_home(),
            home_reserve: default_home_reserve(),
            payload_dir: default_payload_dir(),
        }
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            hack_skill: default_hack_skill(),
        }
    }
}

impl Default for CostTable {
    fn default() -> Self {
        Self {
            hack: default_hack_cost(),
            weaken: default_weaken_cost(),
            grow: default_grow_cost(),
            share: default_share_cost(),
        }
    }
}

impl HiveConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: HiveConfig = toml::from_str(content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
