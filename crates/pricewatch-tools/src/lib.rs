//! # PriceWatch Tools
//! Snapshot fetchers: turn a product URL into title, price and image.

pub mod amazon;
pub mod html;

pub use amazon::AmazonFetcher;
pub use html::extract_snapshot;
