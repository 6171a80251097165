//! Product page parsing. Pure functions over HTML text, no I/O.

use pricewatch_core::error::{PriceWatchError, Result};
use pricewatch_core::types::{Snapshot, parse_price_text};
use scraper::{Html, Selector};

const TITLE_SELECTORS: &[&str] = &["#productTitle", "#title", "h1"];

/// Tried in order; the first that parses as a price wins.
const PRICE_SELECTORS: &[&str] = &[
    "span.a-price-whole",
    "span.a-offscreen",
    "#priceblock_ourprice",
    "#priceblock_dealprice",
];

const IMAGE_SELECTORS: &[&str] = &["img#landingImage", "#imgTagWrapperId img"];

/// Pull a snapshot out of a product page.
///
/// Fails with `Fetch` when either the title or a usable price is missing.
pub fn extract_snapshot(html: &str) -> Result<Snapshot> {
    let document = Html::parse_document(html);

    let title = first_text(&document, TITLE_SELECTORS)
        .ok_or_else(|| PriceWatchError::Fetch("product title not found".into()))?;
    let price = extract_price(&document)
        .ok_or_else(|| PriceWatchError::Fetch(format!("price not found for '{title}'")))?;
    let image = extract_image(&document);

    Ok(Snapshot { title, price, image })
}

fn first_text(document: &Html, selectors: &[&str]) -> Option<String> {
    selectors.iter().find_map(|css| {
        let selector = Selector::parse(css).ok()?;
        document
            .select(&selector)
            .map(|el| collapse_whitespace(&el.text().collect::<String>()))
            .find(|text| !text.is_empty())
    })
}

fn extract_price(document: &Html) -> Option<f64> {
    PRICE_SELECTORS.iter().find_map(|css| {
        let selector = Selector::parse(css).ok()?;
        document
            .select(&selector)
            .find_map(|el| parse_price_text(&el.text().collect::<String>()))
    })
}

fn extract_image(document: &Html) -> Option<String> {
    IMAGE_SELECTORS.iter().find_map(|css| {
        let selector = Selector::parse(css).ok()?;
        let el = document.select(&selector).next()?;
        // Lazy-loaded pages keep the real URL in data-old-hires
        ["src", "data-old-hires"]
            .iter()
            .filter_map(|attr| el.value().attr(attr))
            .map(str::trim)
            .find(|src| src.starts_with("http"))
            .map(String::from)
    })
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRODUCT_PAGE: &str = r#"
        <html><body>
          <span id="productTitle">
              Prestige  Electric Kettle
              1.5L
          </span>
          <div class="a-section">
            <span class="a-price"><span class="a-offscreen">₹1,299.00</span>
            <span class="a-price-whole">1,299.</span></span>
          </div>
          <div id="imgTagWrapperId">
            <img id="landingImage" src="https://m.media-amazon.com/images/kettle.jpg">
          </div>
        </body></html>
    "#;

    #[test]
    fn test_extracts_full_snapshot() {
        let snap = extract_snapshot(PRODUCT_PAGE).unwrap();
        assert_eq!(snap.title, "Prestige Electric Kettle 1.5L");
        assert_eq!(snap.price, 1299.0);
        assert_eq!(
            snap.image.as_deref(),
            Some("https://m.media-amazon.com/images/kettle.jpg")
        );
    }

    #[test]
    fn test_falls_back_to_deal_price() {
        let html = r#"<span id="productTitle">Mouse</span>
                      <span class="a-price-whole"></span>
                      <span id="priceblock_dealprice">$19.99</span>"#;
        let snap = extract_snapshot(html).unwrap();
        assert_eq!(snap.price, 19.99);
        assert!(snap.image.is_none());
    }

    #[test]
    fn test_missing_price_is_fetch_error() {
        let html = r#"<span id="productTitle">Mouse</span>
                      <span class="a-price-whole">Currently unavailable</span>"#;
        let err = extract_snapshot(html).unwrap_err();
        assert!(matches!(err, PriceWatchError::Fetch(_)));
    }

    #[test]
    fn test_missing_title_is_fetch_error() {
        let html = r#"<span class="a-price-whole">499</span>"#;
        assert!(matches!(
            extract_snapshot(html),
            Err(PriceWatchError::Fetch(_))
        ));
    }

    #[test]
    fn test_image_from_lazy_attribute() {
        let html = r#"<span id="productTitle">Lamp</span>
                      <span class="a-price-whole">899</span>
                      <img id="landingImage" src="data:image/gif;base64,R0lGOD"
                           data-old-hires="https://img.example/lamp.jpg">"#;
        let snap = extract_snapshot(html).unwrap();
        assert_eq!(snap.image.as_deref(), Some("https://img.example/lamp.jpg"));
    }
}
