//! Scheduler error types.

use thiserror::Error;

/// Errors that abort a whole tick or drain pass.
///
/// Per-item failures (a skipped batch, an unplaceable request, a rejected
/// launch) are not errors — they are counted and the pass continues.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("topology scan failed: {0}")]
    Inventory(#[source] anyhow::Error),

    #[error("launch substrate error: {0}")]
    Substrate(#[source] anyhow::Error),

    #[error("dispatch queue error: {0}")]
    Dispatch(#[from] hivegrid_dispatch::DispatchError),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
