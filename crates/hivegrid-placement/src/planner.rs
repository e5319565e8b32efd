//! Batch planner — thread counts and delay offsets for one HWGW batch.
//!
//! A batch is Hack, Weaken, Grow, Weaken against one target. The weakens
//! cancel the security the other two stages add; the delays are chosen so
//! the four completions land in that order with a fixed gap between them.

use tracing::debug;

use hive_core::config::CostTable;
use hive_core::types::{Hostname, Node, OperationKind, OperationRequest, PlayerState};

/// Security added per hack thread.
pub const HACK_SEC_PER_THREAD: f64 = 0.002;
/// Security added per grow thread.
pub const GROW_SEC_PER_THREAD: f64 = 0.004;
/// Security removed per weaken thread.
pub const WEAKEN_SEC_PER_THREAD: f64 = 0.05;
/// Grow duration relative to hack duration.
pub const GROW_TIME_RATIO: f64 = 3.2;
/// Weaken duration relative to hack duration.
pub const WEAKEN_TIME_RATIO: f64 = 4.0;

/// One planned batch: 2–4 requests with mutually consistent delays.
///
/// Contains no placement information — the packer decides nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchPlan {
    pub target: Hostname,
    /// The hack fraction this plan was built for.
    pub hack_fraction: f64,
    pub requests: Vec<OperationRequest>,
}

impl BatchPlan {
    /// Combined memory demand of all stages.
    pub fn total_cost(&self) -> u64 {
        self.requests.iter().map(|r| r.total_cost()).sum()
    }
}

/// Duration of one operation against a target, in milliseconds.
///
/// Hack time grows with target security and shrinks with player skill;
/// grow and weaken are fixed multiples of it. Share workers run until
/// killed and have no meaningful duration.
pub fn operation_duration_ms(kind: OperationKind, target: &Node, player: &PlayerState) -> u64 {
    let hack = hack_time_ms(target, player);
    match kind {
        OperationKind::Hack => hack,
        OperationKind::Grow => (hack as f64 * GROW_TIME_RATIO).round() as u64,
        OperationKind::Weaken => hack * WEAKEN_TIME_RATIO as u64,
        OperationKind::Share => 0,
    }
}

fn hack_time_ms(target: &Node, player: &PlayerState) -> u64 {
    let skill = f64::from(player.hack_skill.max(1));
    let security = target.security.max(1.0);
    ((500.0 + 250.0 * security) * (100.0 / (skill + 50.0))).round() as u64
}

/// Fraction of a target's money one hack thread steals.
fn hack_fraction_per_thread(target: &Node, player: &PlayerState) -> f64 {
    let skill = f64::from(player.hack_skill.max(1));
    let security_factor = (100.0 - target.security.min(100.0)) / 100.0;
    let skill_factor = skill / (skill + 50.0);
    (security_factor * skill_factor / 240.0).max(0.0)
}

/// Grow threads needed to restore a target to full money.
///
/// Monotonic in the money deficit and in security: higher security means a
/// weaker per-thread growth factor, hence more threads.
fn grow_threads(money: f64, money_max: f64, security: f64) -> u32 {
    if money >= money_max || money_max <= 0.0 {
        return 0;
    }
    let base = 1.0 + 0.03 * ((100.0 - security.min(100.0)) / 100.0);
    let deficit = money_max / money.max(1.0);
    (deficit.ln() / base.ln()).ceil() as u32
}

fn weaken_threads_for(security_added: f64) -> u32 {
    (security_added / WEAKEN_SEC_PER_THREAD).ceil() as u32
}

/// Plan one batch against a target for a given hack fraction.
///
/// Returns `None` when the target state is degenerate (no money, or the
/// fraction rounds to zero hack threads) — the batcher skips the target
/// for the tick.
///
/// Completion timing: with hack duration `h`, the anchor is the weaken
/// duration `4h`, and the four stages complete at anchor, anchor+gap,
/// anchor+2·gap, anchor+3·gap (H, W1, G, W2).
pub fn plan_batch(
    target: &Node,
    player: &PlayerState,
    hack_fraction: f64,
    costs: &CostTable,
    gap_ms: u64,
) -> Option<BatchPlan> {
    if target.money <= 0.0 {
        debug!(target = %target.hostname, "no money available, batch skipped");
        return None;
    }

    let per_thread = hack_fraction_per_thread(target, player);
    if per_thread <= 0.0 {
        return None;
    }

    let hack_count = (hack_fraction / per_thread).floor() as u32;
    if hack_count == 0 {
        debug!(
            target = %target.hostname,
            hack_fraction,
            "fraction below one thread's yield, batch skipped"
        );
        return None;
    }

    let weaken1_count = weaken_threads_for(f64::from(hack_count) * HACK_SEC_PER_THREAD);
    let grow_count = grow_threads(target.money, target.money_max, target.security);
    let weaken2_count = weaken_threads_for(f64::from(grow_count) * GROW_SEC_PER_THREAD);

    let hack_time = operation_duration_ms(OperationKind::Hack, target, player);
    let grow_time = operation_duration_ms(OperationKind::Grow, target, player);
    let weaken_time = operation_duration_ms(OperationKind::Weaken, target, player);

    let mut requests = vec![
        OperationRequest {
            kind: OperationKind::Hack,
            target: target.hostname.clone(),
            threads: hack_count,
            cost_per_thread: costs.cost_of(OperationKind::Hack),
            delay_ms: weaken_time - hack_time,
        },
        OperationRequest {
            kind: OperationKind::Weaken,
            target: target.hostname.clone(),
            threads: weaken1_count,
            cost_per_thread: costs.cost_of(OperationKind::Weaken),
            delay_ms: gap_ms,
        },
    ];

    // A target already at full money needs no grow, and no second weaken
    // to cancel it.
    if grow_count > 0 {
        requests.push(OperationRequest {
            kind: OperationKind::Grow,
            target: target.hostname.clone(),
            threads: grow_count,
            cost_per_thread: costs.cost_of(OperationKind::Grow),
            delay_ms: weaken_time.saturating_sub(grow_time) + 2 * gap_ms,
        });
        requests.push(OperationRequest {
            kind: OperationKind::Weaken,
            target: target.hostname.clone(),
            threads: weaken2_count,
            cost_per_thread: costs.cost_of(OperationKind::Weaken),
            delay_ms: 3 * gap_ms,
        });
    }

    Some(BatchPlan {
        target: target.hostname.clone(),
        hack_fraction,
        requests,
    })
}

/// Plan against a candidate list of hack fractions, largest first.
///
/// Picks the first candidate whose batch cost fits `capacity_budget`. If
/// none fit, the smallest candidate's plan is returned anyway — the packer
/// will mark the oversized stages unplaceable, which keeps fleet-sizing
/// mismatches visible in the placement-rate metrics instead of silently
/// shrinking the plan to nothing.
pub fn plan_batch_with_candidates(
    target: &Node,
    player: &PlayerState,
    hack_fractions: &[f64],
    costs: &CostTable,
    gap_ms: u64,
    capacity_budget: u64,
) -> Option<BatchPlan> {
    let mut candidates: Vec<f64> = hack_fractions.to_vec();
    candidates.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));

    let mut fallback = None;
    for fraction in candidates {
        let Some(plan) = plan_batch(target, player, fraction, costs, gap_ms) else {
            continue;
        };
        if plan.total_cost() <= capacity_budget {
            return Some(plan);
        }
        fallback = Some(plan);
    }
    fallback
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_target(money: f64, money_max: f64, security: f64) -> Node {
        Node {
            hostname: "target-1".to_string(),
            max_capacity: 64,
            used_capacity: 0,
            rooted: true,
            money,
            money_max,
            security,
        }
    }

    fn player() -> PlayerState {
        PlayerState { hack_skill: 100 }
    }

    fn costs() -> CostTable {
        CostTable::default()
    }

    fn stage(plan: &BatchPlan, index: usize) -> &OperationRequest {
        &plan.requests[index]
    }

    #[test]
    fn full_batch_has_four_stages_in_order() {
        let target = make_target(500_000.0, 1_000_000.0, 10.0);
        let plan = plan_batch(&target, &player(), 0.25, &costs(), 200).unwrap();

        assert_eq!(plan.requests.len(), 4);
        assert_eq!(stage(&plan, 0).kind, OperationKind::Hack);
        assert_eq!(stage(&plan, 1).kind, OperationKind::Weaken);
        assert_eq!(stage(&plan, 2).kind, OperationKind::Grow);
        assert_eq!(stage(&plan, 3).kind, OperationKind::Weaken);
        assert!(plan.requests.iter().all(|r| r.threads > 0));
    }

    #[test]
    fn completions_land_at_gap_spacing() {
        let target = make_target(500_000.0, 1_000_000.0, 10.0);
        let p = player();
        let gap = 200;
        let plan = plan_batch(&target, &p, 0.25, &costs(), gap).unwrap();

        let completion: Vec<u64> = plan
            .requests
            .iter()
            .map(|r| r.delay_ms + operation_duration_ms(r.kind, &target, &p))
            .collect();

        assert_eq!(completion[1], completion[0] + gap);
        assert_eq!(completion[2], completion[0] + 2 * gap);
        assert_eq!(completion[3], completion[0] + 3 * gap);
    }

    #[test]
    fn full_money_target_gets_no_grow() {
        let target = make_target(1_000_000.0, 1_000_000.0, 10.0);
        let plan = plan_batch(&target, &player(), 0.25, &costs(), 200).unwrap();

        // Grow and its paired weaken are omitted entirely.
        assert_eq!(plan.requests.len(), 2);
        assert_eq!(stage(&plan, 0).kind, OperationKind::Hack);
        assert_eq!(stage(&plan, 1).kind, OperationKind::Weaken);
    }

    #[test]
    fn zero_money_target_is_skipped() {
        let target = make_target(0.0, 1_000_000.0, 10.0);
        assert!(plan_batch(&target, &player(), 0.25, &costs(), 200).is_none());
    }

    #[test]
    fn tiny_fraction_rounds_to_zero_threads_and_skips() {
        let target = make_target(500_000.0, 1_000_000.0, 10.0);
        assert!(plan_batch(&target, &player(), 1e-9, &costs(), 200).is_none());
    }

    #[test]
    fn weakens_cover_the_security_added() {
        let target = make_target(500_000.0, 1_000_000.0, 10.0);
        let plan = plan_batch(&target, &player(), 0.5, &costs(), 200).unwrap();

        let hack = stage(&plan, 0);
        let weaken1 = stage(&plan, 1);
        let grow = stage(&plan, 2);
        let weaken2 = stage(&plan, 3);

        assert!(
            f64::from(weaken1.threads) * WEAKEN_SEC_PER_THREAD
                >= f64::from(hack.threads) * HACK_SEC_PER_THREAD
        );
        assert!(
            f64::from(weaken2.threads) * WEAKEN_SEC_PER_THREAD
                >= f64::from(grow.threads) * GROW_SEC_PER_THREAD
        );
    }

    #[test]
    fn higher_security_means_longer_operations() {
        let calm = make_target(500_000.0, 1_000_000.0, 5.0);
        let hot = make_target(500_000.0, 1_000_000.0, 50.0);
        let p = player();

        assert!(
            operation_duration_ms(OperationKind::Hack, &hot, &p)
                > operation_duration_ms(OperationKind::Hack, &calm, &p)
        );
    }

    #[test]
    fn duration_ratios_hold() {
        let target = make_target(500_000.0, 1_000_000.0, 10.0);
        let p = player();

        let hack = operation_duration_ms(OperationKind::Hack, &target, &p);
        let grow = operation_duration_ms(OperationKind::Grow, &target, &p);
        let weaken = operation_duration_ms(OperationKind::Weaken, &target, &p);

        assert_eq!(weaken, hack * 4);
        assert_eq!(grow, (hack as f64 * 3.2).round() as u64);
    }

    #[test]
    fn bigger_deficit_needs_more_grow_threads() {
        let drained = make_target(100_000.0, 1_000_000.0, 10.0);
        let nearly_full = make_target(900_000.0, 1_000_000.0, 10.0);
        let p = player();

        let plan_drained = plan_batch(&drained, &p, 0.1, &costs(), 200).unwrap();
        let plan_full = plan_batch(&nearly_full, &p, 0.1, &costs(), 200).unwrap();

        assert!(stage(&plan_drained, 2).threads > stage(&plan_full, 2).threads);
    }

    #[test]
    fn candidates_pick_largest_fraction_that_fits() {
        let target = make_target(500_000.0, 1_000_000.0, 10.0);
        let p = player();
        let c = costs();
        let fractions = vec![0.05, 0.5, 0.25]; // Unordered on purpose.

        let big = plan_batch(&target, &p, 0.5, &c, 200).unwrap();
        let mid = plan_batch(&target, &p, 0.25, &c, 200).unwrap();

        // Budget fits the mid plan but not the big one.
        assert!(big.total_cost() > mid.total_cost());
        let budget = mid.total_cost();

        let picked =
            plan_batch_with_candidates(&target, &p, &fractions, &c, 200, budget).unwrap();
        assert_eq!(picked.hack_fraction, 0.25);
    }

    #[test]
    fn candidates_fall_back_to_smallest_when_nothing_fits() {
        let target = make_target(500_000.0, 1_000_000.0, 10.0);
        let picked = plan_batch_with_candidates(
            &target,
            &player(),
            &[0.5, 0.25, 0.05],
            &costs(),
            200,
            1, // Nothing fits a one-unit budget.
        )
        .unwrap();

        assert_eq!(picked.hack_fraction, 0.05);
    }

    #[test]
    fn plan_is_deterministic() {
        let target = make_target(500_000.0, 1_000_000.0, 10.0);
        let a = plan_batch(&target, &player(), 0.25, &costs(), 200).unwrap();
        let b = plan_batch(&target, &player(), 0.25, &costs(), 200).unwrap();
        assert_eq!(a, b);
    }
}
