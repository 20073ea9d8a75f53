//! Venue-agnostic types and the rate gateway trait.
//!
//! Every exchange integration normalizes its market data into
//! [`FundingRateSample`]s keyed by a shared base-asset symbol, which is the
//! join key for cross-venue comparison.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

/// Exchange identifier. `Extended` is side A, `Hyperliquid` is side B.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Exchange {
    Extended,
    Hyperliquid,
}

impl Exchange {
    /// Side A of every comparison.
    pub const A: Exchange = Exchange::Extended;
    /// Side B of every comparison.
    pub const B: Exchange = Exchange::Hyperliquid;

    /// Storage label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Exchange::Extended => "extended",
            Exchange::Hyperliquid => "hyperliquid",
        }
    }

    /// Short code for display (2-3 chars).
    pub fn short_code(&self) -> &'static str {
        match self {
            Exchange::Extended => "EXT",
            Exchange::Hyperliquid => "HL",
        }
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exchange::Extended => write!(f, "Extended"),
            Exchange::Hyperliquid => write!(f, "Hyperliquid"),
        }
    }
}

/// Venue-specific secondary metric carried alongside a rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ExtraMetric {
    /// Extended reports the next funding settlement time.
    NextFundingTime(DateTime<Utc>),
    /// Hyperliquid reports open interest.
    OpenInterest(Decimal),
}

/// One normalized funding rate observation.
#[derive(Debug, Clone, PartialEq)]
pub struct FundingRateSample {
    /// Normalized base-asset symbol (e.g., "BTC")
    pub symbol: String,
    pub exchange: Exchange,
    /// Funding rate per funding interval as a fraction
    pub funding_rate: Decimal,
    pub mark_price: Option<Decimal>,
    pub extra: Option<ExtraMetric>,
    pub observed_at: DateTime<Utc>,
}

impl FundingRateSample {
    /// Create a sample with required fields, observed now.
    pub fn new(symbol: impl Into<String>, exchange: Exchange, funding_rate: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            exchange,
            funding_rate,
            mark_price: None,
            extra: None,
            observed_at: Utc::now(),
        }
    }

    /// Set the mark price.
    pub fn with_mark_price(mut self, mark_price: Option<Decimal>) -> Self {
        self.mark_price = mark_price;
        self
    }

    /// Set the venue-specific metric.
    pub fn with_extra(mut self, extra: Option<ExtraMetric>) -> Self {
        self.extra = extra;
        self
    }

    /// Set the observation time.
    pub fn observed_at(mut self, at: DateTime<Utc>) -> Self {
        self.observed_at = at;
        self
    }
}

/// Normalize a venue-native market name to the shared base-asset symbol.
///
/// Strips separators and quote-currency suffixes, then uppercases:
/// `BTC-USD` -> `BTC`, `ethusdt` -> `ETH`, `kPEPE` -> `KPEPE`.
/// Returns `None` only when nothing usable remains.
pub fn normalize_symbol(raw: &str) -> Option<String> {
    const QUOTE_SUFFIXES: [&str; 3] = ["USDT", "USDC", "USD"];

    let upper = raw.trim().to_uppercase();
    let base = match upper.split(['-', '/', '_', ':']).next() {
        Some(head) if head.len() < upper.len() => head.to_string(),
        _ => QUOTE_SUFFIXES
            .iter()
            .find_map(|quote| {
                upper
                    .strip_suffix(quote)
                    .filter(|rest| !rest.is_empty())
                    .map(str::to_string)
            })
            .unwrap_or(upper),
    };

    let base = base.trim().to_string();
    if base.is_empty() {
        None
    } else {
        Some(base)
    }
}

/// Source of funding rate snapshots from one exchange.
///
/// `fetch_rates` never fails: transport, parsing and upstream errors are
/// logged inside the gateway and turned into an empty result. Samples without
/// a symbol or rate are dropped individually.
#[async_trait]
pub trait RateGateway: Send + Sync {
    /// Returns the exchange this gateway reads from.
    fn exchange(&self) -> Exchange;

    /// Fetch current funding rates, normalized.
    async fn fetch_rates(&self) -> Vec<FundingRateSample>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_normalize_symbol() {
        assert_eq!(normalize_symbol("BTC-USD").as_deref(), Some("BTC"));
        assert_eq!(normalize_symbol("eth/usdt").as_deref(), Some("ETH"));
        assert_eq!(normalize_symbol("SOLUSDT").as_deref(), Some("SOL"));
        assert_eq!(normalize_symbol("DOGEUSDC").as_deref(), Some("DOGE"));
        assert_eq!(normalize_symbol("kPEPE").as_deref(), Some("KPEPE"));
        assert_eq!(normalize_symbol(" btc ").as_deref(), Some("BTC"));
        // A bare quote asset is not stripped to nothing
        assert_eq!(normalize_symbol("USD").as_deref(), Some("USD"));
        assert_eq!(normalize_symbol(""), None);
        assert_eq!(normalize_symbol("-USD"), None);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for raw in ["BTC-USD", "ethusdt", "kPEPE", "AVAX"] {
            let once = normalize_symbol(raw).unwrap();
            assert_eq!(normalize_symbol(&once).as_deref(), Some(once.as_str()));
        }
    }

    #[test]
    fn test_sample_builder() {
        let sample = FundingRateSample::new("BTC", Exchange::Hyperliquid, dec!(0.0001))
            .with_mark_price(Some(dec!(50000)))
            .with_extra(Some(ExtraMetric::OpenInterest(dec!(1000))));

        assert_eq!(sample.mark_price, Some(dec!(50000)));
        assert_eq!(sample.extra, Some(ExtraMetric::OpenInterest(dec!(1000))));
    }

    #[test]
    fn test_exchange_display() {
        assert_eq!(Exchange::A.to_string(), "Extended");
        assert_eq!(Exchange::B.short_code(), "HL");
        assert_eq!(Exchange::Hyperliquid.as_str(), "hyperliquid");
    }
}
