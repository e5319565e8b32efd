//! Scheduling counters.
//!
//! One `SchedulerMetrics` handle is shared by the batcher and the
//! controller. Counters are cumulative over the run (snapshots do not
//! reset them) and every discarded item lands in exactly one counter, so
//! drops stay attributable to their failure category.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Shared atomic counters for one scheduler run.
#[derive(Debug, Default)]
pub struct SchedulerMetrics {
    batches_planned: AtomicU64,
    batches_skipped: AtomicU64,
    requests_planned: AtomicU64,
    requests_placed: AtomicU64,
    requests_unplaceable: AtomicU64,
    share_threads: AtomicU64,
    enqueued: AtomicU64,
    queue_drops: AtomicU64,
    launched: AtomicU64,
    rejected_node_missing: AtomicU64,
    rejected_binary_missing: AtomicU64,
    rejected_stale_capacity: AtomicU64,
    rejected_launch_refused: AtomicU64,
    unknown_entries: AtomicU64,
}

/// Point-in-time view of the counters.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MetricsSnapshot {
    pub batches_planned: u64,
    pub batches_skipped: u64,
    pub requests_planned: u64,
    pub requests_placed: u64,
    pub requests_unplaceable: u64,
    pub share_threads: u64,
    pub enqueued: u64,
    pub queue_drops: u64,
    pub launched: u64,
    pub rejected_node_missing: u64,
    pub rejected_binary_missing: u64,
    pub rejected_stale_capacity: u64,
    pub rejected_launch_refused: u64,
    pub unknown_entries: u64,
    /// requests_placed / requests_planned, 1.0 before anything planned.
    pub placement_rate: f64,
}

impl SchedulerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_batches_planned(&self, n: u64) {
        self.batches_planned.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_batches_skipped(&self, n: u64) {
        self.batches_skipped.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_requests_planned(&self, n: u64) {
        self.requests_planned.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_requests_placed(&self, n: u64) {
        self.requests_placed.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_requests_unplaceable(&self, n: u64) {
        self.requests_unplaceable.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_share_threads(&self, n: u64) {
        self.share_threads.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_enqueued(&self, n: u64) {
        self.enqueued.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_queue_drops(&self, n: u64) {
        self.queue_drops.fetch_add(n, Ordering::Relaxed);
    }

    pub fn inc_launched(&self) {
        self.launched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_rejected_node_missing(&self) {
        self.rejected_node_missing.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_rejected_binary_missing(&self) {
        self.rejected_binary_missing.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_rejected_stale_capacity(&self) {
        self.rejected_stale_capacity.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_rejected_launch_refused(&self) {
        self.rejected_launch_refused.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_unknown_entries(&self) {
        self.unknown_entries.fetch_add(1, Ordering::Relaxed);
    }

    /// Planned-to-placed ratio so operators can spot fleet-sizing
    /// mismatches.
    pub fn placement_rate(&self) -> f64 {
        let planned = self.requests_planned.load(Ordering::Relaxed);
        if planned == 0 {
            return 1.0;
        }
        self.requests_placed.load(Ordering::Relaxed) as f64 / planned as f64
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            batches_planned: self.batches_planned.load(Ordering::Relaxed),
            batches_skipped: self.batches_skipped.load(Ordering::Relaxed),
            requests_planned: self.requests_planned.load(Ordering::Relaxed),
            requests_placed: self.requests_placed.load(Ordering::Relaxed),
            requests_unplaceable: self.requests_unplaceable.load(Ordering::Relaxed),
            share_threads: self.share_threads.load(Ordering::Relaxed),
            enqueued: self.enqueued.load(Ordering::Relaxed),
            queue_drops: self.queue_drops.load(Ordering::Relaxed),
            launched: self.launched.load(Ordering::Relaxed),
            rejected_node_missing: self.rejected_node_missing.load(Ordering::Relaxed),
            rejected_binary_missing: self.rejected_binary_missing.load(Ordering::Relaxed),
            rejected_stale_capacity: self.rejected_stale_capacity.load(Ordering::Relaxed),
            rejected_launch_refused: self.rejected_launch_refused.load(Ordering::Relaxed),
            unknown_entries: self.unknown_entries.load(Ordering::Relaxed),
            placement_rate: self.placement_rate(),
        }
    }
}
