//! PriceWatch configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{PriceWatchError, Result};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceWatchConfig {
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
}

impl PriceWatchConfig {
    /// Load config from the default path (~/.pricewatch/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PriceWatchError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| PriceWatchError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path())
    }

    /// Save config to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| PriceWatchError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply the environment variables the bot has always honoured.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(token) = lookup("BOT_TOKEN").filter(|v| !v.is_empty()) {
            self.telegram.bot_token = token;
            self.telegram.enabled = true;
        }
        if let Some(username) = lookup("BOT_USERNAME").filter(|v| !v.is_empty()) {
            self.telegram.bot_username = username;
        }
        if let Some(path) = lookup("DATABASE_PATH").filter(|v| !v.is_empty()) {
            self.store.path = path;
        }
        if let Some(interval) = lookup("CHECK_INTERVAL") {
            match interval.parse::<u64>() {
                Ok(secs) => self.tracking.poll_interval_secs = secs,
                Err(_) => tracing::warn!("⚠️ Ignoring invalid CHECK_INTERVAL '{interval}'"),
            }
        }
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the PriceWatch home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".pricewatch")
    }
}

/// Poller and reconciler timing plus the auto-stop policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    /// Upper bound for one alert delivery.
    #[serde(default = "default_delivery_timeout_secs")]
    pub delivery_timeout_secs: u64,
    /// Below-target alerts sent before a job stops itself.
    #[serde(default = "default_notification_ceiling")]
    pub notification_ceiling: u32,
    /// 0 disables the periodic reconciler (startup pass still runs).
    #[serde(default = "default_reconcile_interval_secs")]
    pub reconcile_interval_secs: u64,
}

fn default_poll_interval_secs() -> u64 { 300 }
fn default_fetch_timeout_secs() -> u64 { 10 }
fn default_delivery_timeout_secs() -> u64 { 15 }
fn default_notification_ceiling() -> u32 { 5 }
fn default_reconcile_interval_secs() -> u64 { 600 }

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            delivery_timeout_secs: default_delivery_timeout_secs(),
            notification_ceiling: default_notification_ceiling(),
            reconcile_interval_secs: default_reconcile_interval_secs(),
        }
    }
}

impl TrackingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_secs(self.delivery_timeout_secs)
    }

    pub fn reconcile_interval(&self) -> Option<Duration> {
        (self.reconcile_interval_secs > 0).then(|| Duration::from_secs(self.reconcile_interval_secs))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: String,
}

fn default_store_path() -> String { "~/.pricewatch/pricewatch.db".into() }

impl Default for StoreConfig {
    fn default() -> Self {
        Self { path: default_store_path() }
    }
}

/// Telegram bot settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub bot_token: String,
    /// Used to build `https://t.me/<username>?start=<token>` deep links.
    #[serde(default = "default_bot_username")]
    pub bot_username: String,
    #[serde(default = "default_telegram_poll_interval")]
    pub poll_interval: u64,
}

fn default_bot_username() -> String { "PriceWatchBot".into() }
fn default_telegram_poll_interval() -> u64 { 1 }

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bot_token: String::new(),
            bot_username: default_bot_username(),
            poll_interval: default_telegram_poll_interval(),
        }
    }
}

impl TelegramConfig {
    pub fn deep_link(&self, token: &str) -> String {
        format!("https://t.me/{}?start={}", self.bot_username, token)
    }
}

/// Web front-end settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn bool_true() -> bool { true }
fn default_host() -> String { "127.0.0.1".into() }
fn default_port() -> u16 { 3000 }

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Product page fetcher settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_accept_language")]
    pub accept_language: String,
    /// Shown in alert texts.
    #[serde(default = "default_currency_symbol")]
    pub currency_symbol: String,
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/114.0.0.0 Safari/537.36".into()
}
fn default_accept_language() -> String { "en-US,en;q=0.9".into() }
fn default_currency_symbol() -> String { "₹".into() }

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            accept_language: default_accept_language(),
            currency_symbol: default_currency_symbol(),
        }
    }
}
