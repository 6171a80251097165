//! Amazon product page fetcher: plain HTTP GET + HTML parsing.
//!
//! No JavaScript rendering: pages that only render prices client-side
//! come back as `Fetch` errors and the poller retries next cycle.

use std::time::Duration;

use async_trait::async_trait;
use pricewatch_core::config::FetcherConfig;
use pricewatch_core::error::{PriceWatchError, Result};
use pricewatch_core::traits::SnapshotFetcher;
use pricewatch_core::types::Snapshot;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};

use crate::html::extract_snapshot;

pub struct AmazonFetcher {
    client: reqwest::Client,
}

impl AmazonFetcher {
    /// `timeout` bounds the whole request, body included.
    pub fn new(config: &FetcherConfig, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,*/*;q=0.8"),
        );
        let language = HeaderValue::from_str(&config.accept_language)
            .map_err(|e| PriceWatchError::Config(format!("Invalid accept_language: {e}")))?;
        headers.insert(ACCEPT_LANGUAGE, language);

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .timeout(timeout)
            .gzip(true)
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| PriceWatchError::Fetch(format!("Client error: {e}")))?;

        Ok(Self { client })
    }

    async fn fetch_html(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PriceWatchError::Fetch(format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PriceWatchError::Fetch(format!("HTTP {status} for {url}")));
        }

        response
            .text()
            .await
            .map_err(|e| PriceWatchError::Fetch(format!("Read body failed: {e}")))
    }
}

#[async_trait]
impl SnapshotFetcher for AmazonFetcher {
    fn name(&self) -> &str {
        "amazon"
    }

    async fn fetch(&self, url: &str) -> Result<Snapshot> {
        let html = self.fetch_html(url).await?;
        let snapshot = extract_snapshot(&html)?;
        tracing::debug!("🔎 {url}: {} @ {}", snapshot.title, snapshot.price);
        Ok(snapshot)
    }
}
