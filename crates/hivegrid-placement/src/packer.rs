//! First-fit-decreasing allocator.
//!
//! Packs one tick's requests onto a working copy of node capacities.
//! The working list stays in strict descending free-capacity order: after
//! every deduction the mutated node is re-positioned, so a later request
//! always sees the true current ordering rather than a stale one-time
//! sort. Ties break on hostname, which makes the whole pass
//! deterministic.

use tracing::{debug, warn};

use hive_core::types::{Hostname, OperationKind, OperationRequest, Placement};

/// One node's free capacity as observed at tick start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeCapacity {
    pub hostname: Hostname,
    pub free: u64,
}

/// A request no node could hold, reported with its demand size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnmetDemand {
    pub kind: OperationKind,
    pub target: Hostname,
    pub threads: u32,
    pub cost: u64,
}

/// Result of one packing pass.
#[derive(Debug, Clone)]
pub struct PackOutcome {
    pub placements: Vec<Placement>,
    pub unplaced: Vec<UnmetDemand>,
    /// Working capacities after all deductions, descending by free.
    pub leftover: Vec<NodeCapacity>,
}

impl PackOutcome {
    /// Fraction of requests that found a node, 1.0 when there was
    /// nothing to place.
    pub fn placement_rate(&self) -> f64 {
        let total = self.placements.len() + self.unplaced.len();
        if total == 0 {
            return 1.0;
        }
        self.placements.len() as f64 / total as f64
    }
}

/// Assign each request to a node or mark it unplaceable.
///
/// Requests are taken largest-cost-first; each goes to the first node in
/// the descending working list with enough remaining capacity, and the
/// deduction is visible to every later request. Unplaceable requests are
/// not retried within the tick.
pub fn pack(requests: Vec<OperationRequest>, nodes: Vec<NodeCapacity>) -> PackOutcome {
    let mut working = nodes;
    working.sort_by(|a, b| b.free.cmp(&a.free).then_with(|| a.hostname.cmp(&b.hostname)));

    let mut ordered = requests;
    // Stable sort: equal-cost requests keep their plan order.
    ordered.sort_by(|a, b| b.total_cost().cmp(&a.total_cost()));

    let mut placements = Vec::new();
    let mut unplaced = Vec::new();

    for request in ordered {
        let cost = request.total_cost();
        match working.iter().position(|n| n.free >= cost) {
            Some(index) => {
                working[index].free -= cost;
                let node = working[index].hostname.clone();
                resettle(&mut working, index);
                debug!(
                    kind = %request.kind,
                    target = %request.target,
                    threads = request.threads,
                    cost,
                    %node,
                    "request placed"
                );
                placements.push(Placement { request, node });
            }
            None => {
                warn!(
                    kind = %request.kind,
                    target = %request.target,
                    cost,
                    "no node can hold request"
                );
                unplaced.push(UnmetDemand {
                    kind: request.kind,
                    target: request.target,
                    threads: request.threads,
                    cost,
                });
            }
        }
    }

    PackOutcome {
        placements,
        unplaced,
        leftover: working,
    }
}

/// Restore descending order after `working[index]` shrank.
fn resettle(working: &mut [NodeCapacity], mut index: usize) {
    while index + 1 < working.len() {
        let ahead = &working[index + 1];
        let here = &working[index];
        if ahead.free > here.free
            || (ahead.free == here.free && ahead.hostname < here.hostname)
        {
            working.swap(index, index + 1);
            index += 1;
        } else {
            break;
        }
    }
}
