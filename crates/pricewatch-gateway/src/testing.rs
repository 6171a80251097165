//! Fakes for front-end tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pricewatch_core::error::{PriceWatchError, Result};
use pricewatch_core::traits::{Notifier, SnapshotFetcher};
use pricewatch_core::types::Snapshot;
use pricewatch_scheduler::{JobStore, Tracker, TrackingPolicy};

/// Always sees the same price, or never finds one.
pub struct StaticFetcher {
    price: Option<f64>,
}

impl StaticFetcher {
    pub fn price(price: f64) -> Self {
        Self { price: Some(price) }
    }

    pub fn failing() -> Self {
        Self { price: None }
    }
}

#[async_trait]
impl SnapshotFetcher for StaticFetcher {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch(&self, _url: &str) -> Result<Snapshot> {
        let price = self
            .price
            .ok_or_else(|| PriceWatchError::Fetch("price not found".into()))?;
        Ok(Snapshot {
            title: "Prestige Electric Kettle".into(),
            price,
            image: Some("https://img.example/kettle.jpg".into()),
        })
    }
}

pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    fn name(&self) -> &str {
        "null"
    }

    async fn send(&self, _recipient: &str, _text: &str, _image: Option<&str>) -> Result<()> {
        Ok(())
    }
}

/// Tracker over an in-memory store whose pollers sleep for an hour between cycles.
pub fn idle_tracker(fetcher: StaticFetcher) -> Tracker {
    Tracker::new(
        Arc::new(JobStore::open_in_memory().expect("in-memory store")),
        Arc::new(fetcher),
        Arc::new(NullNotifier),
        TrackingPolicy {
            poll_interval: Duration::from_secs(3600),
            ..TrackingPolicy::default()
        },
    )
}
