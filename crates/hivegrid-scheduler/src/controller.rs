//! Controller — the consumer side of the pipeline.
//!
//! Drains the dispatch queue and takes each placement through
//! Queued → Validating → {Launched | Rejected}. Validation re-checks
//! every precondition against the live fleet, because inventory may have
//! drifted since the packer's snapshot. A rejected placement is logged
//! with the precondition that failed, counted, and discarded — the next
//! tick re-plans against fresh state, so retrying a stale placement
//! would act on a world that no longer exists.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use hive_core::types::Placement;
use hivegrid_dispatch::{ControlSignal, DispatchError, DispatchQueue, QueueEntry};
use hivegrid_fleet::{Launcher, NodeProvider};
use hivegrid_metrics::SchedulerMetrics;

use crate::error::{SchedulerError, SchedulerResult};

/// Why a placement was rejected at launch time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The assigned node vanished between placement and drain.
    NodeMissing,
    /// The worker binary is absent and a deploy attempt failed.
    BinaryMissing,
    /// Free capacity drifted below the placement's demand.
    StaleCapacity,
    /// The substrate returned the zero-pid refusal sentinel.
    LaunchRefused,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::NodeMissing => "node missing",
            RejectReason::BinaryMissing => "binary missing",
            RejectReason::StaleCapacity => "stale capacity",
            RejectReason::LaunchRefused => "launch refused",
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal state of one placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchOutcome {
    Launched(u64),
    Rejected(RejectReason),
}

/// What one drain pass did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrainReport {
    pub launched: usize,
    pub rejected: usize,
    pub unknown_entries: usize,
    /// A shutdown control entry was consumed.
    pub shutdown: bool,
}

/// Result of the kill/reset path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetReport {
    pub cleared_entries: usize,
    pub killed_processes: u64,
}

/// The drain/validate/launch loop.
pub struct Controller<F: NodeProvider + Launcher> {
    fleet: Arc<F>,
    queue: Arc<DispatchQueue>,
    metrics: Arc<SchedulerMetrics>,
    payload_dir: String,
    /// (hostname, path) pairs we have already deployed — deploy once,
    /// then trust the cache.
    deployed: Mutex<HashSet<(String, String)>>,
}

impl<F: NodeProvider + Launcher> Controller<F> {
    pub fn new(
        fleet: Arc<F>,
        queue: Arc<DispatchQueue>,
        metrics: Arc<SchedulerMetrics>,
        payload_dir: String,
    ) -> Self {
        Self {
            fleet,
            queue,
            metrics,
            payload_dir,
            deployed: Mutex::new(HashSet::new()),
        }
    }

    /// Drain everything currently buffered.
    ///
    /// An undecodable entry is counted and skipped; only queue closure
    /// or a substrate error aborts the pass.
    pub fn drain_once(&self) -> SchedulerResult<DrainReport> {
        let mut report = DrainReport::default();

        loop {
            match self.queue.try_pop() {
                Ok(Some(QueueEntry::Job(placement))) => {
                    match self.execute(&placement)? {
                        LaunchOutcome::Launched(pid) => {
                            report.launched += 1;
                            self.metrics.inc_launched();
                            debug!(
                                pid,
                                kind = %placement.request.kind,
                                node = %placement.node,
                                target = %placement.request.target,
                                threads = placement.request.threads,
                                delay_ms = placement.request.delay_ms,
                                "worker launched"
                            );
                        }
                        LaunchOutcome::Rejected(reason) => {
                            report.rejected += 1;
                            self.count_rejection(reason);
                            warn!(
                                reason = %reason,
                                kind = %placement.request.kind,
                                node = %placement.node,
                                target = %placement.request.target,
                                cost = placement.total_cost(),
                                "placement rejected"
                            );
                        }
                    }
                }
                Ok(Some(QueueEntry::Control {
                    signal: ControlSignal::Shutdown,
                })) => {
                    info!("shutdown signal drained");
                    report.shutdown = true;
                    return Ok(report);
                }
                Ok(None) => return Ok(report),
                Err(DispatchError::UnknownEntry(detail)) => {
                    report.unknown_entries += 1;
                    self.metrics.inc_unknown_entries();
                    warn!(detail, "unrecognized queue entry discarded");
                }
                Err(other) => return Err(other.into()),
            }
        }
    }

    /// Run the drain loop until shutdown.
    pub async fn run(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_ms = interval.as_millis() as u64,
            "controller started"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    match self.drain_once() {
                        Ok(report) if report.shutdown => break,
                        Ok(_) => {}
                        Err(e) => warn!(error = %e, "drain pass failed"),
                    }
                }
                _ = shutdown.changed() => {
                    // Drain what is already buffered, then stop.
                    if let Err(e) = self.drain_once() {
                        warn!(error = %e, "final drain failed");
                    }
                    break;
                }
            }
        }

        info!("controller stopped");
    }

    /// Clear the queue and kill every running worker.
    ///
    /// The only externally triggered reset path; invoking it on an
    /// already-quiet system is a no-op with the same end state.
    pub fn reset(&self) -> SchedulerResult<ResetReport> {
        let cleared = self.queue.clear();
        let killed = self.fleet.kill_all().map_err(SchedulerError::Substrate)?;
        info!(cleared, killed, "scheduler reset");
        Ok(ResetReport {
            cleared_entries: cleared,
            killed_processes: killed,
        })
    }

    // ── Internal helpers ────────────────────────────────────────────

    /// Validate one placement against the live fleet and launch it.
    fn execute(&self, placement: &Placement) -> SchedulerResult<LaunchOutcome> {
        let request = &placement.request;
        let node = placement.node.as_str();

        let free = self
            .fleet
            .free_capacity(node)
            .map_err(SchedulerError::Substrate)?;
        let Some(free) = free else {
            return Ok(LaunchOutcome::Rejected(RejectReason::NodeMissing));
        };

        let path = format!("{}/{}", self.payload_dir, request.kind.binary_name());
        if !self.ensure_binary(node, &path)? {
            return Ok(LaunchOutcome::Rejected(RejectReason::BinaryMissing));
        }

        if free < request.total_cost() {
            return Ok(LaunchOutcome::Rejected(RejectReason::StaleCapacity));
        }

        let pid = self
            .fleet
            .launch(
                &path,
                node,
                request.threads,
                &request.target,
                request.delay_ms,
            )
            .map_err(SchedulerError::Substrate)?;

        if pid == 0 {
            Ok(LaunchOutcome::Rejected(RejectReason::LaunchRefused))
        } else {
            Ok(LaunchOutcome::Launched(pid))
        }
    }

    /// Check the binary is on the node, deploying it at most once.
    fn ensure_binary(&self, node: &str, path: &str) -> SchedulerResult<bool> {
        let key = (node.to_string(), path.to_string());
        {
            let deployed = self.deployed.lock().unwrap();
            if deployed.contains(&key) {
                return Ok(true);
            }
        }

        let present = self
            .fleet
            .has_binary(node, path)
            .map_err(SchedulerError::Substrate)?
            || self
                .fleet
                .deploy(path, node)
                .map_err(SchedulerError::Substrate)?;

        if present {
            self.deployed.lock().unwrap().insert(key);
        }
        Ok(present)
    }

    fn count_rejection(&self, reason: RejectReason) {
        match reason {
            RejectReason::NodeMissing => self.metrics.inc_rejected_node_missing(),
            RejectReason::BinaryMissing => self.metrics.inc_rejected_binary_missing(),
            RejectReason::StaleCapacity => self.metrics.inc_rejected_stale_capacity(),
            RejectReason::LaunchRefused => self.metrics.inc_rejected_launch_refused(),
        }
    }
}
