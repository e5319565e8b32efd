//! HiveGrid placement — batch timing math and bin packing.
//!
//! This crate decides *what* to run and *where* to run it, but never runs
//! anything itself:
//!
//! - **`planner`** — per-target thread counts and delay offsets for one
//!   correctly-ordered batch
//! - **`packer`** — first-fit-decreasing assignment of requests onto a
//!   working copy of node capacities

pub mod packer;
pub mod planner;

pub use packer::{NodeCapacity, PackOutcome, UnmetDemand, pack};
pub use planner::{BatchPlan, operation_duration_ms, plan_batch, plan_batch_with_candidates};
