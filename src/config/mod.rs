//! Configuration management for the funding arbitrage monitor.
//!
//! Loads settings from an optional `config.toml` and `FAM__`-prefixed
//! environment variables (e.g. `FAM__TELEGRAM__BOT_TOKEN`).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Pass cadence
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Exchange A gateway
    #[serde(default)]
    pub extended: ExtendedConfig,
    /// Exchange B gateway
    #[serde(default)]
    pub hyperliquid: HyperliquidConfig,
    /// Alert delivery
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Defaults for new alert rules
    #[serde(default)]
    pub notifications: NotificationsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between pipeline passes
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtendedConfig {
    #[serde(default = "default_extended_url")]
    pub base_url: String,
    /// Per-request timeout in seconds
    #[serde(default = "default_extended_timeout")]
    pub timeout_secs: u64,
    /// Markets reported by the gateway, in venue notation (e.g. `BTC-USD`)
    #[serde(default = "default_extended_markets")]
    pub markets: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HyperliquidConfig {
    #[serde(default = "default_hyperliquid_url")]
    pub base_url: String,
    /// Per-request timeout in seconds
    #[serde(default = "default_hyperliquid_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token; empty disables notifications
    #[serde(default)]
    pub bot_token: String,
    #[serde(default = "default_telegram_url")]
    pub api_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file path
    #[serde(default = "default_database_path")]
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_cooldown_minutes")]
    pub default_cooldown_minutes: u32,
}

fn default_interval_secs() -> u64 {
    30
}

fn default_extended_url() -> String {
    crate::exchange::extended::MAINNET_API_URL.to_string()
}

fn default_extended_timeout() -> u64 {
    15
}

fn default_extended_markets() -> Vec<String> {
    crate::exchange::extended::DEFAULT_MARKETS
        .iter()
        .map(|m| m.to_string())
        .collect()
}

fn default_hyperliquid_url() -> String {
    crate::exchange::hyperliquid::MAINNET_API_URL.to_string()
}

fn default_hyperliquid_timeout() -> u64 {
    10
}

fn default_telegram_url() -> String {
    crate::notify::TELEGRAM_API_URL.to_string()
}

fn default_database_path() -> String {
    "data/funding_arb.db".to_string()
}

fn default_cooldown_minutes() -> u32 {
    crate::notify::DEFAULT_COOLDOWN_MINUTES
}

impl Config {
    /// Load configuration from environment variables and config files.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::default().separator("__").prefix("FAM"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.scheduler.interval_secs > 0,
            "scheduler.interval_secs must be positive"
        );

        for (name, timeout) in [
            ("extended", self.extended.timeout_secs),
            ("hyperliquid", self.hyperliquid.timeout_secs),
        ] {
            // A fetch must finish before the next tick can find the scheduler idle
            anyhow::ensure!(
                timeout > 0 && timeout <= self.scheduler.interval_secs,
                "{}.timeout_secs must be between 1 and scheduler.interval_secs",
                name
            );
        }

        anyhow::ensure!(
            !self.extended.markets.is_empty(),
            "extended.markets must not be empty"
        );

        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.scheduler.interval_secs)
    }

    /// Whether alert delivery is configured.
    pub fn notifications_enabled(&self) -> bool {
        !self.telegram.bot_token.trim().is_empty()
    }
}

impl ExtendedConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl HyperliquidConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            extended: ExtendedConfig::default(),
            hyperliquid: HyperliquidConfig::default(),
            telegram: TelegramConfig::default(),
            database: DatabaseConfig::default(),
            notifications: NotificationsConfig::default(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

impl Default for ExtendedConfig {
    fn default() -> Self {
        Self {
            base_url: default_extended_url(),
            timeout_secs: default_extended_timeout(),
            markets: default_extended_markets(),
        }
    }
}

impl Default for HyperliquidConfig {
    fn default() -> Self {
        Self {
            base_url: default_hyperliquid_url(),
            timeout_secs: default_hyperliquid_timeout(),
        }
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            api_url: default_telegram_url(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            default_cooldown_minutes: default_cooldown_minutes(),
        }
    }
}
