//! # Funding Arbitrage Monitor
//!
//! Compares perpetual funding rates between Extended and Hyperliquid, detects
//! material divergences and alerts subscribed users over Telegram.
//!
//! ## Architecture
//!
//! - `config`: Configuration management and validation
//! - `exchange`: Read-only gateways for both venues
//! - `strategy`: Comparison, opportunity detection and the pipeline pass
//! - `notify`: Alert rules, cooldown matching and Telegram delivery
//! - `scheduler`: Single-flight periodic driver
//! - `persistence`: SQLite storage for rates, opportunities, rules and alert log
//! - `utils`: Shared utilities and decimal formatting

pub mod config;
pub mod error;
pub mod exchange;
pub mod notify;
pub mod persistence;
pub mod scheduler;
pub mod strategy;
pub mod utils;

pub use config::Config;
