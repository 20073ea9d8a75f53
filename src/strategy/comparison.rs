//! Cross-venue comparison table.
//!
//! Joins the samples from both gateways on the normalized symbol. The table is
//! rebuilt from scratch on every pass.

use crate::exchange::{Exchange, ExtraMetric, FundingRateSample};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// One venue's view of a symbol.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VenueQuote {
    pub funding_rate: Decimal,
    pub mark_price: Option<Decimal>,
    pub extra: Option<ExtraMetric>,
}

impl From<&FundingRateSample> for VenueQuote {
    fn from(sample: &FundingRateSample) -> Self {
        Self {
            funding_rate: sample.funding_rate,
            mark_price: sample.mark_price,
            extra: sample.extra,
        }
    }
}

/// Which venues reported a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    pub has_a: bool,
    pub has_b: bool,
    pub has_both: bool,
}

/// Joined view of one symbol across both venues.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonEntry {
    pub symbol: String,
    side_a: Option<VenueQuote>,
    side_b: Option<VenueQuote>,
}

impl ComparisonEntry {
    pub fn new(symbol: String, side_a: Option<VenueQuote>, side_b: Option<VenueQuote>) -> Self {
        Self {
            symbol,
            side_a,
            side_b,
        }
    }

    /// Quote from the given exchange, if it reported this symbol.
    pub fn quote(&self, exchange: Exchange) -> Option<&VenueQuote> {
        if exchange == Exchange::A {
            self.side_a.as_ref()
        } else {
            self.side_b.as_ref()
        }
    }

    pub fn availability(&self) -> Availability {
        let has_a = self.side_a.is_some();
        let has_b = self.side_b.is_some();
        Availability {
            has_a,
            has_b,
            has_both: has_a && has_b,
        }
    }

    /// Both rates, when both venues reported the symbol.
    pub fn rates(&self) -> Option<(Decimal, Decimal)> {
        match (&self.side_a, &self.side_b) {
            (Some(a), Some(b)) => Some((a.funding_rate, b.funding_rate)),
            _ => None,
        }
    }
}

/// Comparison table keyed by symbol, iterated in symbol order.
pub type ComparisonTable = BTreeMap<String, ComparisonEntry>;

/// Join samples from side A and side B into one entry per symbol.
///
/// Within one side, the last sample for a symbol wins.
pub fn compare(samples_a: &[FundingRateSample], samples_b: &[FundingRateSample]) -> ComparisonTable {
    let map_a: HashMap<&str, &FundingRateSample> =
        samples_a.iter().map(|s| (s.symbol.as_str(), s)).collect();
    let map_b: HashMap<&str, &FundingRateSample> =
        samples_b.iter().map(|s| (s.symbol.as_str(), s)).collect();

    map_a
        .keys()
        .chain(map_b.keys())
        .map(|symbol| {
            let entry = ComparisonEntry::new(
                symbol.to_string(),
                map_a.get(symbol).map(|s| VenueQuote::from(*s)),
                map_b.get(symbol).map(|s| VenueQuote::from(*s)),
            );
            (symbol.to_string(), entry)
        })
        .collect()
}
