//! Seams to the outside world. The scheduler only talks to these traits.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::Snapshot;

/// Takes a point-in-time snapshot of a product page.
///
/// Implementations must return `PriceWatchError::Fetch` on network errors,
/// timeouts, or pages missing the title/price.
#[async_trait]
pub trait SnapshotFetcher: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self, url: &str) -> Result<Snapshot>;
}

/// Delivers a message to a recipient.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    /// Send `text`, as a photo caption when `image` is present.
    async fn send(&self, recipient: &str, text: &str, image: Option<&str>) -> Result<()>;
}
