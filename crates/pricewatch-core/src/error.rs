//! Error types shared across PriceWatch crates.

use crate::types::{JobId, JobStatus};

#[derive(Debug, thiserror::Error)]
pub enum PriceWatchError {
    /// Snapshot could not be taken (network, timeout, missing fields).
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// A lifecycle guard rejected the requested transition.
    #[error("Invalid transition for job #{id}: {from} → {to}")]
    InvalidTransition {
        id: JobId,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid target price: {0}")]
    InvalidTargetPrice(String),

    /// Notifier could not deliver a message.
    #[error("Delivery error: {0}")]
    Delivery(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PriceWatchError {
    /// True when a confirmation lost the race to an earlier one.
    pub fn is_already_tracked(&self) -> bool {
        matches!(
            self,
            PriceWatchError::InvalidTransition {
                from: JobStatus::Active,
                to: JobStatus::Active,
                ..
            }
        )
    }
}

pub type Result<T> = std::result::Result<T, PriceWatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_tracked() {
        let err = PriceWatchError::InvalidTransition {
            id: 7,
            from: JobStatus::Active,
            to: JobStatus::Active,
        };
        assert!(err.is_already_tracked());
        assert_eq!(err.to_string(), "Invalid transition for job #7: active → active");

        let err = PriceWatchError::InvalidTransition {
            id: 7,
            from: JobStatus::Stopped,
            to: JobStatus::Active,
        };
        assert!(!err.is_already_tracked());
    }
}
