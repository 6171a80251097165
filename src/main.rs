//! # PriceWatch: product price tracker
//!
//! Watches product pages and alerts a Telegram chat when the price drops to
//! the user's target. Jobs live in SQLite; pollers are re-attached on start.
//!
//! Usage:
//!   pricewatch                          # Bot + web API with ~/.pricewatch/config.toml
//!   pricewatch --port 8080              # Custom web API port
//!   pricewatch --no-gateway             # Telegram bot only
//!   pricewatch --init-config            # Write a default config and exit

use anyhow::{Context, Result};
use clap::Parser;
use pricewatch_channels::TelegramChannel;
use pricewatch_core::PriceWatchConfig;
use pricewatch_core::traits::{Notifier, SnapshotFetcher};
use pricewatch_gateway::{AppState, Bot};
use pricewatch_scheduler::{JobStore, Tracker, TrackingPolicy, spawn_reconciler};
use pricewatch_tools::AmazonFetcher;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "pricewatch",
    version,
    about = "🛒 PriceWatch — price drop alerts over Telegram"
)]
struct Cli {
    /// Config file (default: ~/.pricewatch/config.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Database path (overrides config and DATABASE_PATH)
    #[arg(long)]
    db_path: Option<String>,

    /// Web API port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Poll interval in seconds (overrides config and CHECK_INTERVAL)
    #[arg(long)]
    interval: Option<u64>,

    /// Do not start the web API
    #[arg(long)]
    no_gateway: bool,

    /// Write the default config file and exit
    #[arg(long)]
    init_config: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn expand_path(p: &str) -> String {
    shellexpand::tilde(p).to_string()
}

fn load_config(cli: &Cli) -> Result<PriceWatchConfig> {
    let mut config = match &cli.config {
        Some(path) => PriceWatchConfig::load_from(&PathBuf::from(expand_path(path)))?,
        None => PriceWatchConfig::load()?,
    };
    config.apply_env_overrides();

    if let Some(db_path) = &cli.db_path {
        config.store.path = db_path.clone();
    }
    if let Some(port) = cli.port {
        config.gateway.port = port;
    }
    if let Some(secs) = cli.interval {
        config.tracking.poll_interval_secs = secs;
    }
    if cli.no_gateway {
        config.gateway.enabled = false;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "pricewatch=debug,pricewatch_scheduler=debug,pricewatch_tools=debug,tower_http=debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    if cli.init_config {
        let path = cli
            .config
            .as_deref()
            .map(|p| PathBuf::from(expand_path(p)))
            .unwrap_or_else(PriceWatchConfig::default_path);
        if path.exists() {
            println!("⚠️  {} already exists.", path.display());
        } else {
            PriceWatchConfig::default().save_to(&path)?;
            println!("✅ Wrote {}", path.display());
        }
        return Ok(());
    }

    let config = load_config(&cli)?;

    // The store is required; failing to open it is fatal
    let db_path = expand_path(&config.store.path);
    let store = JobStore::open(std::path::Path::new(&db_path))
        .with_context(|| format!("Failed to open job store at {db_path}"))?;
    let store = Arc::new(store);
    tracing::info!("💾 Job store: {db_path}");

    let policy = TrackingPolicy::from_config(&config.tracking, &config.fetcher);
    let fetcher: Arc<dyn SnapshotFetcher> =
        Arc::new(AmazonFetcher::new(&config.fetcher, policy.fetch_timeout)?);

    if config.telegram.bot_token.is_empty() {
        tracing::warn!("⚠️  BOT_TOKEN not set — alerts and the Telegram bot are disabled");
    }
    let telegram = TelegramChannel::new(config.telegram.clone());
    let notifier: Arc<dyn Notifier> = Arc::new(telegram.clone());

    let tracker = Tracker::new(store, fetcher, notifier, policy);

    // Startup reconciliation: active jobs from the previous run get their pollers back
    // An unreadable store here would leave every active job silently unpolled
    let resumed = tracker.reconcile().context("Startup reconcile failed")?;
    if resumed > 0 {
        tracing::info!("🔄 Resumed {resumed} active job(s)");
    }
    if let Some(every) = config.tracking.reconcile_interval() {
        tokio::spawn(spawn_reconciler(tracker.clone(), every));
    }

    if config.telegram.enabled && !config.telegram.bot_token.is_empty() {
        let bot = Bot::new(tracker.clone(), config.telegram.clone());
        tokio::spawn(bot.run(telegram));
    }

    println!("🛒 PriceWatch v{}", env!("CARGO_PKG_VERSION"));
    println!("   🗄️  Database:       {db_path}");
    println!("   ⏱️  Poll interval:  {}s", config.tracking.poll_interval_secs);
    println!("   🔔 Alert ceiling:  {}", tracker.policy().notification_ceiling);
    if config.gateway.enabled {
        println!(
            "   🌐 Web API:        http://{}:{}",
            config.gateway.host, config.gateway.port
        );
    }
    println!();

    let gateway = {
        let state = AppState::new(tracker.clone(), config.telegram.clone());
        let gateway_config = config.gateway.clone();
        async move {
            if gateway_config.enabled {
                pricewatch_gateway::start(&gateway_config, state).await
            } else {
                std::future::pending().await
            }
        }
    };

    tokio::select! {
        result = gateway => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down");
        }
    }

    let aborted = tracker.shutdown();
    tracing::info!("📴 Stopped {aborted} poller(s)");
    Ok(())
}
