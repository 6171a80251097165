//! API route handlers for the web front-end.

use axum::Json;
use axum::extract::{Path, Query, State};
use pricewatch_core::error::PriceWatchError;
use pricewatch_core::types::JobId;
use pricewatch_scheduler::policy::{parse_target_price, validate_target_price};
use serde::Deserialize;
use std::sync::Arc;

use crate::server::AppState;

/// Health check endpoint.
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "pricewatch-gateway",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Uptime and running pollers.
pub async fn system_info(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let registry = state.tracker.registry();
    Json(serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "poll_interval_secs": state.tracker.policy().poll_interval.as_secs(),
        "notification_ceiling": state.tracker.policy().notification_ceiling,
        "pollers": registry.snapshot(),
    }))
}

fn error_json(e: &PriceWatchError) -> Json<serde_json::Value> {
    Json(serde_json::json!({"ok": false, "error": e.to_string()}))
}

/// Look up a product without creating anything.
pub async fn preview_product(
    State(state): State<Arc<AppState>>,
    Json(body): Json<serde_json::Value>,
) -> Json<serde_json::Value> {
    let url = body["url"].as_str().unwrap_or("").trim();
    if url.is_empty() {
        return Json(serde_json::json!({"ok": false, "error": "Paste a product link."}));
    }
    match state.tracker.preview(url).await {
        Ok(snapshot) => Json(serde_json::json!({"ok": true, "product": snapshot})),
        Err(e) => {
            tracing::warn!("⚠️ Preview {url}: {e}");
            error_json(&e)
        }
    }
}

/// `target_price` may arrive as a JSON number or as form-style text.
fn target_from(body: &serde_json::Value) -> Option<pricewatch_core::Result<f64>> {
    match &body["target_price"] {
        serde_json::Value::Number(n) => n.as_f64().map(validate_target_price),
        serde_json::Value::String(s) => Some(parse_target_price(s)),
        _ => None,
    }
}

/// Submit a product with a proposed target. The job stays pending until the
/// user opens the returned deep link in Telegram.
pub async fn track_product(
    State(state): State<Arc<AppState>>,
    Json(body): Json<serde_json::Value>,
) -> Json<serde_json::Value> {
    let url = body["url"].as_str().unwrap_or("").trim();
    let target = match target_from(&body) {
        Some(Ok(target)) => target,
        Some(Err(e)) => return error_json(&e),
        None => return Json(serde_json::json!({"ok": false, "error": "Missing data."})),
    };
    if url.is_empty() {
        return Json(serde_json::json!({"ok": false, "error": "Missing data."}));
    }

    match state.tracker.submit(url, Some(target)).await {
        Ok(sub) => Json(serde_json::json!({
            "ok": true,
            "job_id": sub.job.id,
            "token": sub.job.token,
            "deep_link": state.telegram.deep_link(&sub.job.token),
            "product": sub.snapshot,
        })),
        Err(e) => {
            tracing::warn!("⚠️ Track {url}: {e}");
            error_json(&e)
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct JobsQuery {
    pub recipient: String,
}

/// Jobs of one recipient, most recent first.
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<JobsQuery>,
) -> Json<serde_json::Value> {
    match state.tracker.list(&query.recipient) {
        Ok(jobs) => Json(serde_json::json!({"ok": true, "jobs": jobs})),
        Err(e) => error_json(&e),
    }
}

pub async fn cancel_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<JobId>,
) -> Json<serde_json::Value> {
    match state.tracker.cancel(id) {
        Ok(stopped) => Json(serde_json::json!({"ok": true, "id": id, "stopped": stopped})),
        Err(e) => error_json(&e),
    }
}
