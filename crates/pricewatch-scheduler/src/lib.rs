//! # PriceWatch Scheduler
//!
//! Tracking job lifecycle and polling.
//!
//! ## Architecture
//! ```text
//! Tracker (submit / confirm / cancel / list)
//!   ├── JobStore (SQLite): pending → active → stopped, survives restarts
//!   ├── JobRegistry: at most one poller per job, in-process only
//!   ├── Poller (one tokio task per active job)
//!   │     status check → snapshot → alert → stop at the ceiling
//!   └── Reconciler: startup + periodic: active jobs without a poller get one
//! ```

pub mod messages;
pub mod policy;
pub mod poller;
pub mod reconciler;
pub mod registry;
pub mod store;
pub mod tracker;

#[cfg(test)]
mod testing;

pub use policy::TrackingPolicy;
pub use poller::{CycleOutcome, Poller, StopReason};
pub use reconciler::spawn_reconciler;
pub use registry::{JobRegistry, PollerGuard, PollerInfo};
pub use store::JobStore;
pub use tracker::{ConfirmKey, Submission, Tracker};
