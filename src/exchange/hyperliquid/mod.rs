//! Hyperliquid exchange integration (comparison side B).
//!
//! Provides read-only access to Hyperliquid perpetuals market data.
//!
//! # Funding Rate Notes
//!
//! Hyperliquid reports the current hourly funding rate. Rates are compared
//! as reported, without rescaling to another interval.

mod client;
mod types;

pub use client::{HyperliquidClient, MAINNET_API_URL};
pub use types::*;
