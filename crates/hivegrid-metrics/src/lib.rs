//! HiveGrid metrics — cumulative counters for the scheduling pipeline.

pub mod counters;

pub use counters::{MetricsSnapshot, SchedulerMetrics};
