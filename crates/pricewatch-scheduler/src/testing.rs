//! Scripted collaborators for scheduler tests.

use async_trait::async_trait;
use pricewatch_core::error::{PriceWatchError, Result};
use pricewatch_core::traits::{Notifier, SnapshotFetcher};
use pricewatch_core::types::Snapshot;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Returns queued prices in order, then fails.
#[derive(Default)]
pub struct ScriptedFetcher {
    script: Mutex<VecDeque<f64>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl ScriptedFetcher {
    pub fn prices(prices: &[f64]) -> Self {
        Self {
            script: Mutex::new(prices.iter().copied().collect()),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnapshotFetcher for ScriptedFetcher {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn fetch(&self, _url: &str) -> Result<Snapshot> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.script.lock().unwrap().pop_front();
        next.map(|price| Snapshot {
            title: "Kettle".into(),
            price,
            image: Some("https://img/kettle.jpg".into()),
        })
        .ok_or_else(|| PriceWatchError::Fetch("no price on page".into()))
    }
}

#[derive(Debug, Clone)]
pub struct SentMessage {
    pub recipient: String,
    pub text: String,
    pub image: Option<String>,
}

/// Records every delivery attempt.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentMessage>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, recipient: &str, text: &str, image: Option<&str>) -> Result<()> {
        self.sent.lock().unwrap().push(SentMessage {
            recipient: recipient.into(),
            text: text.into(),
            image: image.map(String::from),
        });
        if self.fail {
            return Err(PriceWatchError::Delivery("chat not found".into()));
        }
        Ok(())
    }
}

/// Never completes a delivery.
pub struct HangingNotifier;

#[async_trait]
impl Notifier for HangingNotifier {
    fn name(&self) -> &str {
        "hanging"
    }

    async fn send(&self, _recipient: &str, _text: &str, _image: Option<&str>) -> Result<()> {
        std::future::pending().await
    }
}
