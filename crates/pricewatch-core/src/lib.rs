//! # PriceWatch Core
//! Shared vocabulary for every PriceWatch crate: the tracked `Job`, the
//! `SnapshotFetcher`/`Notifier` seams, errors and configuration.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::PriceWatchConfig;
pub use error::{PriceWatchError, Result};
pub use traits::{Notifier, SnapshotFetcher};
pub use types::{Job, JobId, JobStatus, Snapshot, parse_price_text};
