//! User-facing texts. Shared by pollers, the Telegram bot and the web front.

use pricewatch_core::types::{Job, Snapshot};

const LIST_TITLE_CHARS: usize = 50;

/// `1299` → "1299", `1299.5` → "1299.50".
pub fn format_price(price: f64) -> String {
    if price.fract() == 0.0 {
        format!("{price:.0}")
    } else {
        format!("{price:.2}")
    }
}

fn price_or_dash(currency: &str, price: Option<f64>) -> String {
    price
        .map(|p| format!("{currency}{}", format_price(p)))
        .unwrap_or_else(|| "—".into())
}

/// Below-target alert. The last one of the budget also announces the stop.
pub fn price_alert(job: &Job, price: f64, count: u32, ceiling: u32, currency: &str) -> String {
    let mut text = format!(
        "🎉 Good news!\n\n{}\nPrice: {currency}{}\nTarget: {}\n{}",
        job.title,
        format_price(price),
        price_or_dash(currency, job.target_price),
        job.url,
    );
    if count >= ceiling {
        text.push_str(&format!(
            "\n\n🔔 Reached {count} notifications. Stopping tracking for this product."
        ));
    }
    text
}

pub fn tracking_started(job: &Job, currency: &str) -> String {
    format!(
        "✅ Tracking started for:\n{}\nPrice: {}\nTarget: {}\nYou will receive updates here.",
        job.title,
        price_or_dash(currency, job.current_price),
        price_or_dash(currency, job.target_price),
    )
}

/// Reply to a submission: product summary plus both ways to confirm.
pub fn product_found(job: &Job, snapshot: &Snapshot, deep_link: &str, currency: &str) -> String {
    format!(
        "🛒 Product found:\n{}\nPrice: {currency}{}\n\nReply with /confirm {} <target_price> to start tracking or open this link to confirm:\n{deep_link}",
        snapshot.title,
        format_price(snapshot.price),
        job.id,
    )
}

/// `/list` rendering, one line per job.
pub fn job_list(jobs: &[Job], currency: &str) -> String {
    if jobs.is_empty() {
        return "No tracks found for this chat.".into();
    }
    let mut text = String::from("Your tracks:\n");
    for job in jobs {
        let title: String = job.title.chars().take(LIST_TITLE_CHARS).collect();
        let ellipsis = if job.title.chars().count() > LIST_TITLE_CHARS { " ..." } else { "" };
        text.push_str(&format!(
            "#{} {title}{ellipsis} | target {} | {}\n",
            job.id,
            price_or_dash(currency, job.target_price),
            job.status,
        ));
    }
    text
}
