//! HTTP server implementation using Axum.

use axum::{
    Router,
    routing::{get, post},
};
use pricewatch_core::config::{GatewayConfig, TelegramConfig};
use pricewatch_scheduler::Tracker;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared state for the gateway server.
#[derive(Clone)]
pub struct AppState {
    pub tracker: Tracker,
    /// Deep links point at this bot.
    pub telegram: TelegramConfig,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(tracker: Tracker, telegram: TelegramConfig) -> Self {
        Self {
            tracker,
            telegram,
            start_time: std::time::Instant::now(),
        }
    }
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    let shared = Arc::new(state);

    Router::new()
        .route("/health", get(super::routes::health_check))
        .route("/api/v1/info", get(super::routes::system_info))
        .route("/api/v1/preview", post(super::routes::preview_product))
        .route("/api/v1/track", post(super::routes::track_product))
        .route("/api/v1/jobs", get(super::routes::list_jobs))
        .route("/api/v1/jobs/{id}/cancel", post(super::routes::cancel_job))
        .layer({
            let cors = CorsLayer::new()
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers(Any)
                .max_age(std::time::Duration::from_secs(3600));

            // Example: PRICEWATCH_CORS_ORIGINS=https://deals.example.com
            if let Ok(origins_str) = std::env::var("PRICEWATCH_CORS_ORIGINS") {
                let origins: Vec<_> = origins_str
                    .split(',')
                    .filter_map(|s| s.trim().parse::<axum::http::HeaderValue>().ok())
                    .collect();
                cors.allow_origin(origins)
            } else {
                cors.allow_origin(Any)
            }
        })
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}

/// Start the HTTP server. Runs until the listener fails.
pub async fn start(config: &GatewayConfig, state: AppState) -> anyhow::Result<()> {
    let app = build_router(state);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("🌐 Gateway server listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
