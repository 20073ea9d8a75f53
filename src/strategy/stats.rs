//! Historical funding rate statistics for one pair.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// Rates from both venues within one time bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPoint {
    pub at: DateTime<Utc>,
    pub rate_a: Option<Decimal>,
    pub rate_b: Option<Decimal>,
}

impl HistoryPoint {
    /// Signed spread `rate_a - rate_b`, when both venues reported.
    pub fn spread(&self) -> Option<Decimal> {
        Some(self.rate_a? - self.rate_b?)
    }
}

/// Summary over the points where both venues reported.
///
/// Spreads are signed (`rate_a - rate_b`), so `min_spread` may be negative
/// and `avg_spread` is the net divergence.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PairStats {
    pub samples: usize,
    pub avg_rate_a: Decimal,
    pub avg_rate_b: Decimal,
    pub max_spread: Decimal,
    pub min_spread: Decimal,
    pub avg_spread: Decimal,
}

impl PairStats {
    /// Returns `None` if no point carries both rates.
    pub fn from_history(points: &[HistoryPoint]) -> Option<Self> {
        let paired: Vec<(Decimal, Decimal, Decimal)> = points
            .iter()
            .filter_map(|p| Some((p.rate_a?, p.rate_b?, p.spread()?)))
            .collect();

        let n = Decimal::from(paired.len());
        let max_spread = paired.iter().map(|(_, _, s)| *s).max()?;
        let min_spread = paired.iter().map(|(_, _, s)| *s).min()?;

        Some(Self {
            samples: paired.len(),
            avg_rate_a: paired.iter().map(|(a, _, _)| *a).sum::<Decimal>() / n,
            avg_rate_b: paired.iter().map(|(_, b, _)| *b).sum::<Decimal>() / n,
            max_spread,
            min_spread,
            avg_spread: paired.iter().map(|(_, _, s)| *s).sum::<Decimal>() / n,
        })
    }
}
