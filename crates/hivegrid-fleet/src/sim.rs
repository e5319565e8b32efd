//! In-memory fleet — backs standalone mode and the test suite.
//!
//! `SimFleet` models the parts of the substrate the pipeline observes:
//! per-node capacity that launches consume, per-node binary sets, pid
//! allocation, and launch refusal when preconditions fail at launch time.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use tracing::debug;

use hive_core::types::{Hostname, Node};

use crate::provider::{Launcher, NodeProvider};

/// A worker process the fleet is running.
#[derive(Debug, Clone)]
pub struct RunningWorker {
    pub pid: u64,
    pub hostname: Hostname,
    pub path: String,
    pub threads: u32,
    pub target: Hostname,
    pub delay_ms: u64,
    /// Capacity charged on launch, released on kill.
    charge: u64,
}

struct SimNode {
    node: Node,
    binaries: HashSet<String>,
}

struct SimInner {
    nodes: HashMap<Hostname, SimNode>,
    processes: HashMap<u64, RunningWorker>,
    next_pid: u64,
    allow_deploy: bool,
    /// Per-binary memory cost per thread, used to charge launches.
    costs: HashMap<String, u64>,
}

/// An in-memory fleet implementing both collaborator traits.
pub struct SimFleet {
    inner: Mutex<SimInner>,
}

impl SimFleet {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(SimInner {
                nodes: HashMap::new(),
                processes: HashMap::new(),
                next_pid: 1,
                allow_deploy: true,
                costs: HashMap::new(),
            }),
        }
    }

    /// Build a fleet from a static node list.
    pub fn with_nodes(nodes: Vec<Node>) -> Self {
        let fleet = Self::new();
        for node in nodes {
            fleet.add_node(node);
        }
        fleet
    }

    /// Register the per-thread launch charge for a binary path.
    pub fn set_binary_cost(&self, path: &str, cost_per_thread: u64) {
        let mut inner = self.inner.lock().unwrap();
        inner.costs.insert(path.to_string(), cost_per_thread);
    }

    /// Refuse all future deploy calls (for exercising the missing-binary
    /// failure path).
    pub fn set_allow_deploy(&self, allow: bool) {
        self.inner.lock().unwrap().allow_deploy = allow;
    }

    pub fn add_node(&self, node: Node) {
        let mut inner = self.inner.lock().unwrap();
        inner.nodes.insert(
            node.hostname.clone(),
            SimNode {
                node,
                binaries: HashSet::new(),
            },
        );
    }

    /// Drop a node from the fleet, as if it vanished between placement
    /// and drain. Its processes go with it.
    pub fn remove_node(&self, hostname: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.nodes.remove(hostname);
        inner.processes.retain(|_, w| w.hostname != hostname);
    }

    /// Pre-seed a binary on a node without going through deploy.
    pub fn seed_binary(&self, hostname: &str, path: &str) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(slot) = inner.nodes.get_mut(hostname) {
            slot.binaries.insert(path.to_string());
        }
    }

    /// Number of worker processes currently running.
    pub fn running_count(&self) -> usize {
        self.inner.lock().unwrap().processes.len()
    }

    /// Snapshot of running workers, sorted by pid.
    pub fn running_workers(&self) -> Vec<RunningWorker> {
        let inner = self.inner.lock().unwrap();
        let mut workers: Vec<RunningWorker> = inner.processes.values().cloned().collect();
        workers.sort_by_key(|w| w.pid);
        workers
    }
}

impl Default for SimFleet {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeProvider for SimFleet {
    fn list(&self) -> anyhow::Result<Vec<Node>> {
        let inner = self.inner.lock().unwrap();
        let mut nodes: Vec<Node> = inner.nodes.values().map(|s| s.node.clone()).collect();
        nodes.sort_by(|a, b| a.hostname.cmp(&b.hostname));
        Ok(nodes)
    }

    fn free_capacity(&self, hostname: &str) -> anyhow::Result<Option<u64>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.nodes.get(hostname).map(|s| s.node.free_capacity()))
    }

    fn has_binary(&self, hostname: &str, path: &str) -> anyhow::Result<bool> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .nodes
            .get(hostname)
            .is_some_and(|s| s.binaries.contains(path)))
    }

    fn deploy(&self, path: &str, hostname: &str) -> anyhow::Result<bool> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.allow_deploy {
            return Ok(false);
        }
        match inner.nodes.get_mut(hostname) {
            Some(slot) => {
                slot.binaries.insert(path.to_string());
                debug!(%hostname, path, "binary deployed");
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl Launcher for SimFleet {
    fn launch(
        &self,
        path: &str,
        hostname: &str,
        threads: u32,
        target: &str,
        delay_ms: u64,
    ) -> anyhow::Result<u64> {
        let mut inner = self.inner.lock().unwrap();
        let charge = u64::from(threads) * inner.costs.get(path).copied().unwrap_or(0);

        let Some(slot) = inner.nodes.get_mut(hostname) else {
            return Ok(0);
        };
        if !slot.binaries.contains(path) {
            return Ok(0);
        }
        if threads == 0 || slot.node.free_capacity() < charge {
            return Ok(0);
        }

        slot.node.used_capacity += charge;

        let pid = inner.next_pid;
        inner.next_pid += 1;
        inner.processes.insert(
            pid,
            RunningWorker {
                pid,
                hostname: hostname.to_string(),
                path: path.to_string(),
                threads,
                target: target.to_string(),
                delay_ms,
                charge,
            },
        );

        debug!(pid, %hostname, path, threads, "worker launched");
        Ok(pid)
    }

    fn kill_all(&self) -> anyhow::Result<u64> {
        let mut inner = self.inner.lock().unwrap();
        let workers: Vec<RunningWorker> = inner.processes.drain().map(|(_, w)| w).collect();
        let killed = workers.len() as u64;
        for worker in workers {
            if let Some(slot) = inner.nodes.get_mut(&worker.hostname) {
                slot.node.used_capacity = slot.node.used_capacity.saturating_sub(worker.charge);
            }
        }
        debug!(killed, "fleet-wide kill");
        Ok(killed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_node(hostname: &str, max: u64) -> Node {
        Node {
            hostname: hostname.to_string(),
            max_capacity: max,
            used_capacity: 0,
            rooted: true,
            money: 0.0,
            money_max: 0.0,
            security: 10.0,
        }
    }

    fn test_fleet() -> SimFleet {
        let fleet = SimFleet::with_nodes(vec![make_node("n1", 100), make_node("n2", 50)]);
        fleet.set_binary_cost("payloads/hack", 2);
        fleet.seed_binary("n1", "payloads/hack");
        fleet
    }

    #[test]
    fn list_is_sorted_by_hostname() {
        let fleet = test_fleet();
        let nodes = fleet.list().unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].hostname, "n1");
        assert_eq!(nodes[1].hostname, "n2");
    }

    #[test]
    fn free_capacity_for_unknown_node_is_none() {
        let fleet = test_fleet();
        assert_eq!(fleet.free_capacity("n1").unwrap(), Some(100));
        assert_eq!(fleet.free_capacity("ghost").unwrap(), None);
    }

    #[test]
    fn launch_charges_capacity() {
        let fleet = test_fleet();

        let pid = fleet.launch("payloads/hack", "n1", 10, "t1", 0).unwrap();
        assert!(pid > 0);
        assert_eq!(fleet.free_capacity("n1").unwrap(), Some(80));
        assert_eq!(fleet.running_count(), 1);
    }

    #[test]
    fn launch_refused_when_memory_insufficient() {
        let fleet = test_fleet();

        // 60 threads at cost 2 = 120 > 100 free.
        let pid = fleet.launch("payloads/hack", "n1", 60, "t1", 0).unwrap();
        assert_eq!(pid, 0);
        assert_eq!(fleet.running_count(), 0);
        assert_eq!(fleet.free_capacity("n1").unwrap(), Some(100));
    }

    #[test]
    fn launch_refused_without_binary() {
        let fleet = test_fleet();
        // n2 never got the binary.
        let pid = fleet.launch("payloads/hack", "n2", 1, "t1", 0).unwrap();
        assert_eq!(pid, 0);
    }

    #[test]
    fn launch_refused_on_missing_node() {
        let fleet = test_fleet();
        let pid = fleet.launch("payloads/hack", "ghost", 1, "t1", 0).unwrap();
        assert_eq!(pid, 0);
    }

    #[test]
    fn deploy_installs_binary() {
        let fleet = test_fleet();
        assert!(!fleet.has_binary("n2", "payloads/hack").unwrap());

        assert!(fleet.deploy("payloads/hack", "n2").unwrap());
        assert!(fleet.has_binary("n2", "payloads/hack").unwrap());
    }

    #[test]
    fn deploy_can_be_refused() {
        let fleet = test_fleet();
        fleet.set_allow_deploy(false);
        assert!(!fleet.deploy("payloads/hack", "n2").unwrap());
        assert!(!fleet.has_binary("n2", "payloads/hack").unwrap());
    }

    #[test]
    fn kill_all_releases_capacity_and_is_idempotent() {
        let fleet = test_fleet();
        fleet.launch("payloads/hack", "n1", 10, "t1", 0).unwrap();
        fleet.launch("payloads/hack", "n1", 5, "t2", 0).unwrap();
        assert_eq!(fleet.free_capacity("n1").unwrap(), Some(70));

        assert_eq!(fleet.kill_all().unwrap(), 2);
        assert_eq!(fleet.running_count(), 0);
        assert_eq!(fleet.free_capacity("n1").unwrap(), Some(100));

        // Second kill finds nothing and changes nothing.
        assert_eq!(fleet.kill_all().unwrap(), 0);
        assert_eq!(fleet.free_capacity("n1").unwrap(), Some(100));
    }

    #[test]
    fn remove_node_takes_processes_with_it() {
        let fleet = test_fleet();
        fleet.launch("payloads/hack", "n1", 10, "t1", 0).unwrap();

        fleet.remove_node("n1");
        assert_eq!(fleet.free_capacity("n1").unwrap(), None);
        assert_eq!(fleet.running_count(), 0);
    }

    #[test]
    fn pids_are_unique_and_increasing() {
        let fleet = test_fleet();
        let a = fleet.launch("payloads/hack", "n1", 1, "t1", 0).unwrap();
        let b = fleet.launch("payloads/hack", "n1", 1, "t1", 0).unwrap();
        assert!(b > a);
    }
}
