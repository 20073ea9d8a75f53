//! Type definitions for Extended API responses.

use crate::utils::decimal::{deserialize_decimal_lenient, deserialize_i64_lenient};
use rust_decimal::Decimal;
use serde::Deserialize;

/// Envelope used by every Extended public endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    /// "OK" on success
    pub status: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Payload of a successful response.
    pub fn into_ok(self) -> Option<T> {
        if self.status.eq_ignore_ascii_case("OK") {
            self.data
        } else {
            None
        }
    }
}

/// One market from `/api/v1/info/markets`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketInfo {
    /// Market name (e.g., "BTC-USD")
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub market_stats: Option<MarketStats>,
}

/// Live statistics attached to a market.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketStats {
    /// Current funding rate
    #[serde(default, deserialize_with = "deserialize_decimal_lenient")]
    pub funding_rate: Option<Decimal>,
    /// Mark price
    #[serde(default, deserialize_with = "deserialize_decimal_lenient")]
    pub mark_price: Option<Decimal>,
    /// Next funding settlement, unix milliseconds
    #[serde(default, deserialize_with = "deserialize_i64_lenient")]
    pub next_funding_rate: Option<i64>,
}

/// Funding history record from `/api/v1/info/{market}/funding`.
#[derive(Debug, Clone, Deserialize)]
pub struct FundingRecord {
    /// Market name
    #[serde(rename = "m", default)]
    pub market: Option<String>,
    /// Settlement time, unix milliseconds
    #[serde(rename = "T", default)]
    pub timestamp: Option<i64>,
    /// Funding rate
    #[serde(rename = "f", default, deserialize_with = "deserialize_decimal_lenient")]
    pub funding_rate: Option<Decimal>,
}
