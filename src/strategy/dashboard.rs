//! Market-wide aggregates over stored opportunities.

use crate::error::InvalidTimeframe;
use crate::persistence::StoredOpportunity;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Window covered by the market summary.
pub const SUMMARY_WINDOW_HOURS: i64 = 24;

/// Number of symbols listed in the summary.
pub const SUMMARY_TOP_N: usize = 5;

/// Supported overview windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Timeframe {
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "4h")]
    FourHours,
    #[serde(rename = "24h")]
    OneDay,
    #[serde(rename = "7d")]
    SevenDays,
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::OneHour => "1h",
            Timeframe::FourHours => "4h",
            Timeframe::OneDay => "24h",
            Timeframe::SevenDays => "7d",
        }
    }

    /// How far back the overview reaches.
    pub fn lookback(&self) -> Duration {
        match self {
            Timeframe::OneHour => Duration::hours(1),
            Timeframe::FourHours => Duration::hours(4),
            Timeframe::OneDay => Duration::hours(24),
            Timeframe::SevenDays => Duration::days(7),
        }
    }

    /// Width of one overview bucket.
    pub fn bucket(&self) -> Duration {
        match self {
            Timeframe::OneHour => Duration::minutes(5),
            Timeframe::FourHours => Duration::minutes(30),
            Timeframe::OneDay => Duration::hours(2),
            Timeframe::SevenDays => Duration::hours(6),
        }
    }
}

impl FromStr for Timeframe {
    type Err = InvalidTimeframe;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1h" => Ok(Timeframe::OneHour),
            "4h" => Ok(Timeframe::FourHours),
            "24h" => Ok(Timeframe::OneDay),
            "7d" => Ok(Timeframe::SevenDays),
            other => Err(InvalidTimeframe(other.to_string())),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Snapshot of the recent market.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSummary {
    /// Distinct symbols with at least one opportunity in the window
    pub total_pairs: usize,
    /// Mean absolute rate difference across all opportunities in the window
    pub avg_spread: Decimal,
    /// Best opportunity per symbol, highest first
    pub top_opportunities: Vec<StoredOpportunity>,
}

impl MarketSummary {
    pub fn from_opportunities(opportunities: &[StoredOpportunity]) -> Self {
        let mut best: HashMap<&str, &StoredOpportunity> = HashMap::new();
        for opp in opportunities {
            best.entry(opp.symbol.as_str())
                .and_modify(|current| {
                    if opp.abs_rate_difference > current.abs_rate_difference {
                        *current = opp;
                    }
                })
                .or_insert(opp);
        }

        let mut top: Vec<StoredOpportunity> = best.into_values().cloned().collect();
        top.sort_by(|a, b| {
            b.abs_rate_difference
                .cmp(&a.abs_rate_difference)
                .then_with(|| a.symbol.cmp(&b.symbol))
        });
        let total_pairs = top.len();
        top.truncate(SUMMARY_TOP_N);

        Self {
            total_pairs,
            avg_spread: mean(opportunities.iter().map(|o| o.abs_rate_difference)),
            top_opportunities: top,
        }
    }
}

/// Aggregates for one overview bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewBucket {
    /// Bucket start
    pub timestamp: DateTime<Utc>,
    pub active_opportunities: usize,
    pub avg_spread: Decimal,
    pub max_profit_potential: Decimal,
}

/// Bucket opportunities over `timeframe` ending at `now`.
///
/// Every bucket in the window is returned, empty ones with zeros.
pub fn market_overview(
    timeframe: Timeframe,
    opportunities: &[StoredOpportunity],
    now: DateTime<Utc>,
) -> Vec<OverviewBucket> {
    let start = now - timeframe.lookback();
    let step = timeframe.bucket();

    let mut buckets = Vec::new();
    let mut bucket_start = start;
    while bucket_start < now {
        let bucket_end = bucket_start + step;
        let in_bucket: Vec<Decimal> = opportunities
            .iter()
            .filter(|o| o.detected_at >= bucket_start && o.detected_at < bucket_end)
            .map(|o| o.abs_rate_difference)
            .collect();

        buckets.push(OverviewBucket {
            timestamp: bucket_start,
            active_opportunities: in_bucket.len(),
            avg_spread: mean(in_bucket.iter().copied()),
            max_profit_potential: in_bucket.iter().copied().max().unwrap_or_default(),
        });
        bucket_start = bucket_end;
    }
    buckets
}

fn mean(values: impl Iterator<Item = Decimal>) -> Decimal {
    let (sum, count) = values.fold((Decimal::ZERO, 0u32), |(s, n), v| (s + v, n + 1));
    if count == 0 {
        Decimal::ZERO
    } else {
        sum / Decimal::from(count)
    }
}
