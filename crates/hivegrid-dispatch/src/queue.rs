//! Bounded dispatch queue.
//!
//! A fixed-capacity FIFO of encoded [`QueueEntry`] records. The producer
//! side treats a full queue as backpressure (bounded retry, then a
//! counted drop); the consumer side treats an empty read as "no job
//! available now", never as an error. FIFO order is preserved end-to-end
//! and entries are never overwritten.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::warn;

use crate::entry::QueueEntry;

/// Errors on the dispatch channel.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("dispatch queue full ({capacity} entries)")]
    QueueFull { capacity: usize },

    #[error("dispatch queue closed")]
    Closed,

    #[error("unrecognized queue entry: {0}")]
    UnknownEntry(String),

    #[error("entry encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type DispatchResult<T> = Result<T, DispatchError>;

/// The bounded channel between batcher and controller.
pub struct DispatchQueue {
    tx: mpsc::Sender<String>,
    rx: Mutex<mpsc::Receiver<String>>,
    capacity: usize,
    drops: AtomicU64,
}

impl DispatchQueue {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            tx,
            rx: Mutex::new(rx),
            capacity: capacity.max(1),
            drops: AtomicU64::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries currently buffered.
    pub fn fill(&self) -> usize {
        self.capacity - self.tx.capacity()
    }

    /// Entries dropped after exhausting backpressure retries.
    pub fn dropped(&self) -> u64 {
        self.drops.load(Ordering::Relaxed)
    }

    /// Enqueue one entry, failing immediately if the queue is full.
    pub fn try_push(&self, entry: &QueueEntry) -> DispatchResult<()> {
        self.push_raw(entry.encode()?)
    }

    /// Enqueue an already-encoded entry.
    pub fn push_raw(&self, raw: String) -> DispatchResult<()> {
        self.tx.try_send(raw).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DispatchError::QueueFull {
                capacity: self.capacity,
            },
            mpsc::error::TrySendError::Closed(_) => DispatchError::Closed,
        })
    }

    /// Enqueue with bounded backpressure: retry up to `attempts` times
    /// with `backoff` between tries, then count the entry as dropped.
    pub async fn push_with_retry(
        &self,
        entry: &QueueEntry,
        attempts: u32,
        backoff: Duration,
    ) -> DispatchResult<()> {
        let raw = entry.encode()?;
        let mut remaining = attempts.max(1);
        loop {
            match self.push_raw(raw.clone()) {
                Ok(()) => return Ok(()),
                Err(DispatchError::QueueFull { .. }) if remaining > 1 => {
                    remaining -= 1;
                    tokio::time::sleep(backoff).await;
                }
                Err(DispatchError::QueueFull { capacity }) => {
                    self.drops.fetch_add(1, Ordering::Relaxed);
                    warn!(capacity, "dispatch queue full, entry dropped");
                    return Err(DispatchError::QueueFull { capacity });
                }
                Err(other) => return Err(other),
            }
        }
    }

    /// Dequeue and decode the next entry.
    ///
    /// `Ok(None)` means the queue is empty right now. An undecodable
    /// entry surfaces as [`DispatchError::UnknownEntry`]; the entry is
    /// consumed either way.
    pub fn try_pop(&self) -> DispatchResult<Option<QueueEntry>> {
        let mut rx = self.rx.lock().unwrap();
        match rx.try_recv() {
            Ok(raw) => QueueEntry::decode(&raw).map(Some),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => Err(DispatchError::Closed),
        }
    }

    /// Drain every buffered entry without decoding. Returns the number
    /// discarded. Part of the kill/reset path; calling on an empty queue
    /// is a no-op.
    pub fn clear(&self) -> usize {
        let mut rx = self.rx.lock().unwrap();
        let mut cleared = 0;
        while rx.try_recv().is_ok() {
            cleared += 1;
        }
        cleared
    }
}
