//! Type definitions for Hyperliquid API requests and responses.

use crate::utils::decimal::deserialize_decimal_lenient;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Request type for Hyperliquid info endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum InfoRequest {
    /// Get metadata and asset contexts (funding rates, prices, OI).
    #[serde(rename = "metaAndAssetCtxs")]
    MetaAndAssetCtxs,
}

/// Response from metaAndAssetCtxs endpoint.
/// Returns a tuple of (Meta, Vec<AssetCtx>), index-aligned.
pub type MetaAndAssetCtxsResponse = (Meta, Vec<AssetCtx>);

/// Universe metadata for perpetuals.
#[derive(Debug, Clone, Deserialize)]
pub struct Meta {
    pub universe: Vec<AssetMeta>,
}

/// Metadata for a single asset in the universe.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetMeta {
    /// Asset name (e.g., "BTC", "kPEPE")
    #[serde(default)]
    pub name: Option<String>,
    /// Delisted assets keep their slot in the universe
    #[serde(default)]
    pub is_delisted: bool,
}

/// Real-time context for an asset.
///
/// Every field is optional so one malformed entry cannot fail the batch.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetCtx {
    /// Current funding rate (hourly, as decimal string)
    #[serde(default, deserialize_with = "deserialize_decimal_lenient")]
    pub funding: Option<Decimal>,
    /// Mark price
    #[serde(default, deserialize_with = "deserialize_decimal_lenient")]
    pub mark_px: Option<Decimal>,
    /// Open interest
    #[serde(default, deserialize_with = "deserialize_decimal_lenient")]
    pub open_interest: Option<Decimal>,
}
