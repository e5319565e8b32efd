//! Fleet collaborator seams.
//!
//! The scheduling pipeline never talks to the outside world directly — it
//! goes through two traits:
//!
//! - **`NodeProvider`** — the topology collaborator: node listing, free
//!   capacity, binary presence, deployment
//! - **`Launcher`** — the execution substrate: fire-and-forget worker
//!   launches and the fleet-wide kill switch
//!
//! `SimFleet` implements both in memory and backs the daemon's standalone
//! mode and the test suite.

pub mod provider;
pub mod sim;

pub use provider::{Launcher, NodeProvider};
pub use sim::SimFleet;
