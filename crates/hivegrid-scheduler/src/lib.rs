//! HiveGrid scheduler — the two cooperative loops of the pipeline.
//!
//! - **`batcher`** — the producer tick: snapshot inventory, plan batches,
//!   pack, enqueue
//! - **`controller`** — the consumer loop: drain, validate, launch
//! - **`error`** — the shared error type
//!
//! Each loop is a tokio task that suspends only between ticks and stops
//! on a `watch` shutdown signal. The dispatch queue is the only shared
//! mutable structure between them.

pub mod batcher;
pub mod controller;
pub mod error;

pub use batcher::{Batcher, BatcherConfig, TickReport};
pub use controller::{Controller, DrainReport, LaunchOutcome, RejectReason, ResetReport};
pub use error::{SchedulerError, SchedulerResult};
