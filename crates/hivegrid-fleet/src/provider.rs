//! Collaborator traits for topology and worker execution.

use hive_core::types::Node;

/// The topology collaborator — a refreshed view of the fleet.
///
/// Implementations are queried at tick boundaries (the batcher takes one
/// wholesale snapshot per tick) and again by the controller immediately
/// before each launch. An `Err` from `list` is tick-fatal; per-host
/// queries return `None`/`false` for unknown hosts instead of erroring.
pub trait NodeProvider: Send + Sync {
    /// Current node records, refreshed on demand.
    fn list(&self) -> anyhow::Result<Vec<Node>>;

    /// Free capacity on a single node, `None` if the node is gone.
    fn free_capacity(&self, hostname: &str) -> anyhow::Result<Option<u64>>;

    /// Whether the node holds a copy of the given worker binary.
    fn has_binary(&self, hostname: &str, path: &str) -> anyhow::Result<bool>;

    /// Copy a worker binary to the node. Returns false if the copy was
    /// refused.
    fn deploy(&self, path: &str, hostname: &str) -> anyhow::Result<bool>;
}

/// The execution substrate — owns all resource-mutating launch calls.
pub trait Launcher: Send + Sync {
    /// Launch a worker process.
    ///
    /// Returns a positive process id on success, or 0 when the node
    /// refuses the launch (insufficient memory, missing binary, process
    /// limits).
    fn launch(
        &self,
        path: &str,
        hostname: &str,
        threads: u32,
        target: &str,
        delay_ms: u64,
    ) -> anyhow::Result<u64>;

    /// Terminate every worker process fleet-wide. Returns the number of
    /// processes killed. Safe to call on an already-quiet fleet.
    fn kill_all(&self) -> anyhow::Result<u64>;
}
