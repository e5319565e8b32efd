//! HiveGrid dispatch — the bounded channel between planning and execution.
//!
//! - **`entry`** — the closed tagged entry type and its wire codec
//! - **`queue`** — the bounded FIFO with backpressure accounting
//!
//! Exactly one queue connects the batcher to the controller. Entries
//! cross it serialized; the consumer decodes exhaustively and treats an
//! unrecognized entry as its own error category, never as a best-effort
//! payload.

pub mod entry;
pub mod queue;

pub use entry::{ControlSignal, QueueEntry};
pub use queue::{DispatchError, DispatchQueue, DispatchResult};
