//! Tracking policy: poll cadence, fetch budget and the notification ceiling.

use pricewatch_core::config::{FetcherConfig, TrackingConfig};
use pricewatch_core::error::{PriceWatchError, Result};
use pricewatch_core::types::parse_price_text;
use std::time::Duration;

/// Knobs shared by every poller.
#[derive(Debug, Clone)]
pub struct TrackingPolicy {
    /// Delay between two cycles of the same job.
    pub poll_interval: Duration,
    /// Upper bound for one snapshot fetch.
    pub fetch_timeout: Duration,
    /// Upper bound for one alert delivery.
    pub delivery_timeout: Duration,
    /// Below-target alerts before the job stops itself.
    pub notification_ceiling: u32,
    /// Prefix for prices in alert texts.
    pub currency_symbol: String,
}

impl Default for TrackingPolicy {
    fn default() -> Self {
        Self::from_config(&TrackingConfig::default(), &FetcherConfig::default())
    }
}

impl TrackingPolicy {
    pub fn from_config(tracking: &TrackingConfig, fetcher: &FetcherConfig) -> Self {
        Self {
            poll_interval: tracking.poll_interval(),
            fetch_timeout: tracking.fetch_timeout(),
            delivery_timeout: tracking.delivery_timeout(),
            notification_ceiling: tracking.notification_ceiling.max(1),
            currency_symbol: fetcher.currency_symbol.clone(),
        }
    }

    /// True once `count` alerts have used up the budget.
    pub fn ceiling_reached(&self, count: u32) -> bool {
        count >= self.notification_ceiling
    }
}

/// A target must be a finite, strictly positive price.
pub fn validate_target_price(target: f64) -> Result<f64> {
    if target.is_finite() && target > 0.0 {
        Ok(target)
    } else {
        Err(PriceWatchError::InvalidTargetPrice(format!(
            "{target} (must be greater than 0)"
        )))
    }
}

/// Parse a user-typed target ("999", "₹1,299.50").
pub fn parse_target_price(input: &str) -> Result<f64> {
    let target = parse_price_text(input)
        .ok_or_else(|| PriceWatchError::InvalidTargetPrice(format!("'{}' is not a price", input.trim())))?;
    validate_target_price(target)
}
