//! Batcher — the producer side of the pipeline.
//!
//! One tick: take a wholesale inventory snapshot, plan a batch per
//! eligible target, pack every request onto the snapshot's capacities,
//! optionally share-fill what is left, and enqueue the placements with
//! bounded backpressure. The batcher never launches anything and never
//! mutates shared inventory — the packer works on the tick's private
//! capacity copy.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use hive_core::config::{CostTable, HiveConfig};
use hive_core::types::{Node, OperationKind, OperationRequest, Placement, PlayerState};
use hivegrid_dispatch::{DispatchError, DispatchQueue, QueueEntry};
use hivegrid_fleet::NodeProvider;
use hivegrid_metrics::SchedulerMetrics;
use hivegrid_placement::packer::{NodeCapacity, pack};
use hivegrid_placement::planner::plan_batch_with_candidates;

use crate::error::{SchedulerError, SchedulerResult};

/// Enqueue retry policy when the queue pushes back.
const ENQUEUE_ATTEMPTS: u32 = 3;
const ENQUEUE_BACKOFF: Duration = Duration::from_millis(50);

/// Everything the batcher reads from configuration, resolved once.
#[derive(Debug, Clone)]
pub struct BatcherConfig {
    pub gap_ms: u64,
    pub hack_fractions: Vec<f64>,
    pub home: String,
    pub home_reserve: u64,
    pub share_spare_capacity: bool,
    pub costs: CostTable,
    pub player: PlayerState,
}

impl BatcherConfig {
    pub fn from_hive(config: &HiveConfig) -> Self {
        Self {
            gap_ms: config.scheduler.gap_ms,
            hack_fractions: config.scheduler.hack_fractions.clone(),
            home: config.fleet.home.clone(),
            home_reserve: config.fleet.home_reserve,
            share_spare_capacity: config.scheduler.share_spare_capacity,
            costs: config.costs.clone(),
            player: PlayerState {
                hack_skill: config.player.hack_skill,
            },
        }
    }
}

/// What one tick did, for logs and tests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub batches_planned: usize,
    pub batches_skipped: usize,
    pub requests_planned: usize,
    pub placed: usize,
    pub unplaced: usize,
    pub enqueued: usize,
    pub dropped: usize,
    pub share_threads: u64,
}

/// The planning/packing/enqueue loop.
pub struct Batcher<P: NodeProvider> {
    provider: Arc<P>,
    queue: Arc<DispatchQueue>,
    metrics: Arc<SchedulerMetrics>,
    config: BatcherConfig,
}

impl<P: NodeProvider> Batcher<P> {
    pub fn new(
        provider: Arc<P>,
        queue: Arc<DispatchQueue>,
        metrics: Arc<SchedulerMetrics>,
        config: BatcherConfig,
    ) -> Self {
        Self {
            provider,
            queue,
            metrics,
            config,
        }
    }

    /// Run one scheduling tick.
    ///
    /// Only a failed topology scan or a closed queue is fatal; every
    /// per-target and per-request failure is counted and skipped.
    pub async fn tick(&self) -> SchedulerResult<TickReport> {
        let nodes = self
            .provider
            .list()
            .map_err(SchedulerError::Inventory)?;

        let capacities = self.capacity_snapshot(&nodes);
        let budget: u64 = capacities.iter().map(|c| c.free).sum();

        let mut report = TickReport::default();
        let mut requests: Vec<OperationRequest> = Vec::new();

        for target in nodes.iter().filter(|n| self.is_target(n)) {
            match plan_batch_with_candidates(
                target,
                &self.config.player,
                &self.config.hack_fractions,
                &self.config.costs,
                self.config.gap_ms,
                budget,
            ) {
                Some(plan) => {
                    debug!(
                        target = %plan.target,
                        hack_fraction = plan.hack_fraction,
                        stages = plan.requests.len(),
                        cost = plan.total_cost(),
                        "batch planned"
                    );
                    report.batches_planned += 1;
                    requests.extend(plan.requests);
                }
                None => {
                    // Degenerate target state — skipped, not a failure.
                    report.batches_skipped += 1;
                }
            }
        }
        report.requests_planned = requests.len();

        let outcome = pack(requests, capacities);
        report.placed = outcome.placements.len();
        report.unplaced = outcome.unplaced.len();
        for unmet in &outcome.unplaced {
            debug!(
                kind = %unmet.kind,
                target = %unmet.target,
                cost = unmet.cost,
                "request deferred to next tick"
            );
        }

        let mut placements = outcome.placements;
        if self.config.share_spare_capacity {
            report.share_threads = self.share_fill(&outcome.leftover, &mut placements);
        }

        for placement in placements {
            match self
                .queue
                .push_with_retry(
                    &QueueEntry::Job(placement),
                    ENQUEUE_ATTEMPTS,
                    ENQUEUE_BACKOFF,
                )
                .await
            {
                Ok(()) => report.enqueued += 1,
                Err(DispatchError::QueueFull { .. }) => report.dropped += 1,
                Err(other) => return Err(other.into()),
            }
        }

        self.metrics.add_batches_planned(report.batches_planned as u64);
        self.metrics.add_batches_skipped(report.batches_skipped as u64);
        self.metrics.add_requests_planned(report.requests_planned as u64);
        self.metrics.add_requests_placed(report.placed as u64);
        self.metrics
            .add_requests_unplaceable(report.unplaced as u64);
        self.metrics.add_share_threads(report.share_threads);
        self.metrics.add_enqueued(report.enqueued as u64);
        self.metrics.add_queue_drops(report.dropped as u64);

        info!(
            batches = report.batches_planned,
            planned = report.requests_planned,
            placed = report.placed,
            unplaced = report.unplaced,
            enqueued = report.enqueued,
            dropped = report.dropped,
            queue_fill = self.queue.fill(),
            "tick complete"
        );

        Ok(report)
    }

    /// Run the tick loop until shutdown.
    pub async fn run(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        info!(interval_ms = interval.as_millis() as u64, "batcher started");

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    if let Err(e) = self.tick().await {
                        warn!(error = %e, "tick failed");
                    }
                }
                _ = shutdown.changed() => {
                    info!("batcher shutting down");
                    break;
                }
            }
        }
    }

    // ── Internal helpers ────────────────────────────────────────────

    /// The tick's private capacity copy: rooted nodes only, home reserve
    /// already deducted.
    fn capacity_snapshot(&self, nodes: &[Node]) -> Vec<NodeCapacity> {
        nodes
            .iter()
            .filter(|n| n.rooted)
            .map(|n| {
                let free = if n.hostname == self.config.home {
                    n.free_capacity_with_reserve(self.config.home_reserve)
                } else {
                    n.free_capacity()
                };
                NodeCapacity {
                    hostname: n.hostname.clone(),
                    free,
                }
            })
            .collect()
    }

    /// A node qualifies as a batch target if we have root on it and it
    /// can hold money. The home node runs workers but is never a target.
    fn is_target(&self, node: &Node) -> bool {
        node.rooted && node.money_max > 0.0 && node.hostname != self.config.home
    }

    /// Turn leftover capacity into share workers, one pre-placed request
    /// per node. Returns the total threads added.
    fn share_fill(&self, leftover: &[NodeCapacity], placements: &mut Vec<Placement>) -> u64 {
        let cost = self.config.costs.cost_of(OperationKind::Share);
        if cost == 0 {
            return 0;
        }
        let mut total = 0u64;
        for node in leftover {
            let threads = (node.free / cost) as u32;
            if threads == 0 {
                continue;
            }
            total += u64::from(threads);
            placements.push(Placement {
                request: OperationRequest {
                    kind: OperationKind::Share,
                    target: node.hostname.clone(),
                    threads,
                    cost_per_thread: cost,
                    delay_ms: 0,
                },
                node: node.hostname.clone(),
            });
        }
        if total > 0 {
            debug!(threads = total, "spare capacity filled with share workers");
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hivegrid_fleet::SimFleet;

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

    fn make_target(hostname: &str, max: u64, money: f64, money_max: f64) -> Node {
        Node {
            money,
            money_max,
            ..make_node(hostname, max)
        }
    }

    fn test_config() -> BatcherConfig {
        BatcherConfig::from_hive(&HiveConfig::default())
    }

    fn test_batcher(
        fleet: Arc<SimFleet>,
        queue_capacity: usize,
        config: BatcherConfig,
    ) -> (Batcher<SimFleet>, Arc<DispatchQueue>, Arc<SchedulerMetrics>) {
        let queue = Arc::new(DispatchQueue::new(queue_capacity));
        let metrics = Arc::new(SchedulerMetrics::new());
        let batcher = Batcher::new(fleet, queue.clone(), metrics.clone(), config);
        (batcher, queue, metrics)
    }

    #[tokio::test]
    async fn tick_plans_packs_and_enqueues() {
        let fleet = Arc::new(SimFleet::with_nodes(vec![
            make_node("home", 2048),
            make_node("worker-1", 512),
            make_target("target-1", 64, 500_000.0, 1_000_000.0),
        ]));
        let (batcher, queue, metrics) = test_batcher(fleet, 64, test_config());

        let report = batcher.tick().await.unwrap();

        assert_eq!(report.batches_planned, 1);
        assert_eq!(report.requests_planned, 4);
        assert_eq!(report.enqueued, report.placed);
        assert!(report.placed > 0);
        assert_eq!(queue.fill(), report.enqueued);
        assert_eq!(metrics.snapshot().requests_planned, 4);
    }

    #[tokio::test]
    async fn moneyless_target_is_skipped_silently() {
        let fleet = Arc::new(SimFleet::with_nodes(vec![
            make_node("home", 2048),
            make_target("target-1", 64, 0.0, 1_000_000.0),
        ]));
        let (batcher, queue, _metrics) = test_batcher(fleet, 64, test_config());

        let report = batcher.tick().await.unwrap();

        assert_eq!(report.batches_planned, 0);
        assert_eq!(report.batches_skipped, 1);
        assert_eq!(queue.fill(), 0);
    }

    #[tokio::test]
    async fn unrooted_nodes_are_neither_targets_nor_capacity() {
        let mut locked = make_target("target-1", 512, 500_000.0, 1_000_000.0);
        locked.rooted = false;
        let fleet = Arc::new(SimFleet::with_nodes(vec![make_node("home", 2048), locked]));
        let (batcher, _queue, _metrics) = test_batcher(fleet, 64, test_config());

        let report = batcher.tick().await.unwrap();
        assert_eq!(report.batches_planned, 0);
        assert_eq!(report.batches_skipped, 0);
    }

    #[tokio::test]
    async fn home_reserve_limits_home_capacity() {
        let mut config = test_config();
        config.home_reserve = 100;
        // Home is the only compute node and it is small: after the
        // reserve nothing fits, so everything is unplaceable.
        let fleet = Arc::new(SimFleet::with_nodes(vec![
            make_node("home", 110),
            make_target("target-1", 0, 500_000.0, 1_000_000.0),
        ]));
        let (batcher, _queue, metrics) = test_batcher(fleet, 64, config);

        let report = batcher.tick().await.unwrap();

        assert!(report.requests_planned > 0);
        assert_eq!(report.placed, 0);
        assert_eq!(report.unplaced, report.requests_planned);
        assert!(metrics.placement_rate() < f64::EPSILON);
    }

    #[tokio::test]
    async fn full_queue_counts_drops_without_losing_buffered_entries() {
        let fleet = Arc::new(SimFleet::with_nodes(vec![
            make_node("home", 8192),
            make_target("target-1", 64, 500_000.0, 1_000_000.0),
        ]));
        // Queue holds fewer entries than one batch produces.
        let (batcher, queue, metrics) = test_batcher(fleet, 2, test_config());

        let report = batcher.tick().await.unwrap();

        assert_eq!(report.enqueued, 2);
        assert!(report.dropped > 0);
        assert_eq!(report.enqueued + report.dropped, report.placed);
        assert_eq!(queue.fill(), 2);
        assert_eq!(metrics.snapshot().queue_drops, report.dropped as u64);
    }

    #[tokio::test]
    async fn share_fill_uses_leftover_capacity() {
        let mut config = test_config();
        config.share_spare_capacity = true;
        let fleet = Arc::new(SimFleet::with_nodes(vec![
            make_node("home", 8192),
            make_target("target-1", 64, 500_000.0, 1_000_000.0),
        ]));
        let (batcher, _queue, metrics) = test_batcher(fleet, 256, config);

        let report = batcher.tick().await.unwrap();

        assert!(report.share_threads > 0);
        assert_eq!(metrics.snapshot().share_threads, report.share_threads);
    }

    #[tokio::test]
    async fn empty_fleet_yields_an_empty_tick() {
        let fleet = Arc::new(SimFleet::new());
        let (batcher, _queue, _metrics) = test_batcher(fleet, 8, test_config());

        let report = batcher.tick().await.unwrap();
        assert_eq!(report, TickReport::default());
    }
}
