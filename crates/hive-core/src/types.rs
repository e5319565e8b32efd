//! Domain types for the HiveGrid scheduling pipeline.
//!
//! These types flow between the planner, the packer, the dispatch queue
//! and the controller. All of them are serializable — placements cross a
//! serialized channel boundary on their way to the executor.

use serde::{Deserialize, Serialize};

/// Unique identifier for a compute node (and for a batch target — targets
/// are nodes).
pub type Hostname = String;

// ── Node ──────────────────────────────────────────────────────────

/// A compute host in the fleet, as reported by the topology collaborator.
///
/// Refreshed wholesale each scheduling tick. Capacity figures are in
/// abstract memory units; money/security attributes describe the node in
/// its role as a batch target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    pub hostname: Hostname,
    /// Total memory capacity (units).
    pub max_capacity: u64,
    /// Memory currently in use (units).
    #[serde(default)]
    pub used_capacity: u64,
    /// Whether we have root access — only rooted nodes run workers or
    /// qualify as targets.
    #[serde(default = "default_rooted")]
    pub rooted: bool,
    /// Money currently available on this node as a target.
    #[serde(default)]
    pub money: f64,
    /// Maximum money this node can hold.
    #[serde(default)]
    pub money_max: f64,
    /// Current security level (raises operation durations).
    #[serde(default)]
    pub security: f64,
}

fn default_rooted() -> bool {
    true
}

impl Node {
    /// Free capacity, clamped at zero.
    pub fn free_capacity(&self) -> u64 {
        self.max_capacity.saturating_sub(self.used_capacity)
    }

    /// Free capacity after deducting a reserve (used for the home node).
    pub fn free_capacity_with_reserve(&self, reserve: u64) -> u64 {
        self.free_capacity().saturating_sub(reserve)
    }
}

// ── Operations ────────────────────────────────────────────────────

/// The four worker payloads a node can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Hack,
    Weaken,
    Grow,
    Share,
}

impl OperationKind {
    /// File name of the worker binary for this operation.
    pub fn binary_name(&self) -> &'static str {
        match self {
            OperationKind::Hack => "hack",
            OperationKind::Weaken => "weaken",
            OperationKind::Grow => "grow",
            OperationKind::Share => "share",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.binary_name())
    }
}

/// A single resource-demand request produced by the batch planner.
///
/// Consumed exactly once: either placed onto a node or declared
/// unplaceable for the tick.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OperationRequest {
    pub kind: OperationKind,
    /// The node this operation acts on.
    pub target: Hostname,
    pub threads: u32,
    /// Memory units consumed per thread.
    pub cost_per_thread: u64,
    /// Launch delay so the batch's completion ordering holds.
    pub delay_ms: u64,
}

impl OperationRequest {
    /// Total memory demand of this request.
    pub fn total_cost(&self) -> u64 {
        u64::from(self.threads) * self.cost_per_thread
    }
}

// ── Placement ─────────────────────────────────────────────────────

/// A request assigned to a specific node — the unit carried by the
/// dispatch queue. Immutable once created.
///
/// Serializes flat: {kind, target, threads, cost_per_thread, delay_ms,
/// node}, which is the wire record the executor side decodes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Placement {
    #[serde(flatten)]
    pub request: OperationRequest,
    /// Hostname of the node the request was packed onto.
    pub node: Hostname,
}

impl Placement {
    pub fn total_cost(&self) -> u64 {
        self.request.total_cost()
    }
}

// ── Player ────────────────────────────────────────────────────────

/// Player skill snapshot — operation durations depend on it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PlayerState {
    pub hack_skill: u32,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self { hack_skill: 1 }
    }
}
