//! Arbitrage opportunity detection over a comparison table.

use super::comparison::{ComparisonEntry, ComparisonTable};
use crate::exchange::Exchange;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::fmt;

/// Differentials at or below this are noise (0.001%).
pub const MIN_MATERIALITY_THRESHOLD: Decimal = dec!(0.00001);

/// Risk band boundaries on the absolute rate difference.
pub const HIGH_RISK_ABOVE: Decimal = dec!(0.005);
pub const MEDIUM_RISK_ABOVE: Decimal = dec!(0.001);

/// Hours between funding payments used for profit projection.
const FUNDING_INTERVAL_HOURS: Decimal = dec!(8);

/// Direction for funding spread arbitrage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SpreadDirection {
    /// Side A pays more: short A, long B
    ShortALongB,
    /// Side B pays more: long A, short B
    LongAShortB,
}

impl SpreadDirection {
    /// Direction implied by the sign of `rate_a - rate_b`.
    pub fn from_difference(rate_difference: Decimal) -> Self {
        if rate_difference > Decimal::ZERO {
            SpreadDirection::ShortALongB
        } else {
            SpreadDirection::LongAShortB
        }
    }

    /// Human-readable strategy, e.g. "SHORT Extended, LONG Hyperliquid".
    pub fn label(&self) -> String {
        match self {
            SpreadDirection::ShortALongB => format!("SHORT {}, LONG {}", Exchange::A, Exchange::B),
            SpreadDirection::LongAShortB => format!("LONG {}, SHORT {}", Exchange::A, Exchange::B),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SpreadDirection::ShortALongB => "short_a_long_b",
            SpreadDirection::LongAShortB => "long_a_short_b",
        }
    }
}

/// Risk classification of an opportunity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Classify an absolute rate difference into a fixed band.
    pub fn classify(abs_rate_difference: Decimal) -> Self {
        if abs_rate_difference > HIGH_RISK_ABOVE {
            RiskLevel::High
        } else if abs_rate_difference > MEDIUM_RISK_ABOVE {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Projected return of holding the offsetting position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProfitProjection {
    pub hourly: Decimal,
    pub daily: Decimal,
    pub annualized: Decimal,
}

impl ProfitProjection {
    fn from_abs_difference(abs_rate_difference: Decimal) -> Self {
        let hourly = abs_rate_difference / FUNDING_INTERVAL_HOURS;
        let daily = hourly * dec!(24);
        Self {
            hourly,
            daily,
            annualized: daily * dec!(365),
        }
    }
}

/// A material funding rate divergence on one symbol.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Opportunity {
    pub symbol: String,
    pub rate_a: Decimal,
    pub rate_b: Decimal,
    /// rate_a - rate_b
    pub rate_difference: Decimal,
    pub abs_rate_difference: Decimal,
    pub direction: SpreadDirection,
    pub profit: ProfitProjection,
    pub risk_level: RiskLevel,
    pub detected_at: DateTime<Utc>,
}

impl Opportunity {
    /// Build an opportunity from an entry reported by both venues.
    ///
    /// Returns `None` when a side is missing or the divergence is immaterial.
    pub fn from_entry(entry: &ComparisonEntry, detected_at: DateTime<Utc>) -> Option<Self> {
        let (rate_a, rate_b) = entry.rates()?;
        let rate_difference = rate_a - rate_b;
        let abs_rate_difference = rate_difference.abs();

        if abs_rate_difference <= MIN_MATERIALITY_THRESHOLD {
            return None;
        }

        Some(Self {
            symbol: entry.symbol.clone(),
            rate_a,
            rate_b,
            rate_difference,
            abs_rate_difference,
            direction: SpreadDirection::from_difference(rate_difference),
            profit: ProfitProjection::from_abs_difference(abs_rate_difference),
            risk_level: RiskLevel::classify(abs_rate_difference),
            detected_at,
        })
    }
}

/// Scans a comparison table for opportunities.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpportunityDetector;

impl OpportunityDetector {
    /// Detect opportunities, sorted by absolute difference (highest first).
    ///
    /// Ties keep the table's symbol order.
    pub fn detect(table: &ComparisonTable) -> Vec<Opportunity> {
        Self::detect_at(table, Utc::now())
    }

    /// Detect opportunities stamped with the given time.
    pub fn detect_at(table: &ComparisonTable, now: DateTime<Utc>) -> Vec<Opportunity> {
        let mut opportunities: Vec<Opportunity> = table
            .values()
            .filter_map(|entry| Opportunity::from_entry(entry, now))
            .collect();

        // sort_by is stable
        opportunities.sort_by(|a, b| b.abs_rate_difference.cmp(&a.abs_rate_difference));
        opportunities
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::FundingRateSample;
    use crate::strategy::comparison::compare;

    fn table(pairs: &[(&str, Decimal, Decimal)]) -> ComparisonTable {
        let a: Vec<_> = pairs
            .iter()
            .map(|(s, ra, _)| FundingRateSample::new(*s, Exchange::A, *ra))
            .collect();
        let b: Vec<_> = pairs
            .iter()
            .map(|(s, _, rb)| FundingRateSample::new(*s, Exchange::B, *rb))
            .collect();
        compare(&a, &b)
    }

    #[test]
    fn test_btc_scenario() {
        let opps = OpportunityDetector::detect(&table(&[("BTC", dec!(0.0003), dec!(-0.0002))]));

        assert_eq!(opps.len(), 1);
        let btc = &opps[0];
        assert_eq!(btc.rate_difference, dec!(0.0005));
        assert_eq!(btc.abs_rate_difference, dec!(0.0005));
        assert_eq!(btc.direction, SpreadDirection::ShortALongB);
        assert_eq!(btc.risk_level, RiskLevel::Low);
        assert_eq!(btc.profit.hourly, dec!(0.0000625));
        assert_eq!(btc.profit.daily, dec!(0.0015));
        assert_eq!(btc.profit.annualized, dec!(0.5475));
    }

    #[test]
    fn test_negative_difference_direction() {
        let opps = OpportunityDetector::detect(&table(&[("ETH", dec!(-0.001), dec!(0.002))]));
        assert_eq!(opps[0].rate_difference, dec!(-0.003));
        assert_eq!(opps[0].abs_rate_difference, dec!(0.003));
        assert_eq!(opps[0].direction, SpreadDirection::LongAShortB);
        assert_eq!(opps[0].direction.label(), "LONG Extended, SHORT Hyperliquid");
    }

    #[test]
    fn test_materiality_threshold_is_exclusive() {
        let opps = OpportunityDetector::detect(&table(&[
            ("AT", dec!(0.00002), dec!(0.00001)),   // exactly 0.00001 -> skipped
            ("ABOVE", dec!(0.000021), dec!(0.00001)),
            ("SAME", dec!(0.0001), dec!(0.0001)),
        ]));

        assert_eq!(opps.len(), 1);
        assert_eq!(opps[0].symbol, "ABOVE");
        assert!(opps.iter().all(|o| o.abs_rate_difference > MIN_MATERIALITY_THRESHOLD));
    }

    #[test]
    fn test_one_sided_entries_never_produce_opportunities() {
        let b = vec![
            FundingRateSample::new("SOL", Exchange::B, dec!(0.01)),
            FundingRateSample::new("AVAX", Exchange::B, dec!(-0.01)),
        ];
        assert!(OpportunityDetector::detect(&compare(&[], &b)).is_empty());
    }

    #[test]
    fn test_risk_bands_partition() {
        assert_eq!(RiskLevel::classify(dec!(0.0051)), RiskLevel::High);
        assert_eq!(RiskLevel::classify(dec!(0.005)), RiskLevel::Medium);
        assert_eq!(RiskLevel::classify(dec!(0.0011)), RiskLevel::Medium);
        assert_eq!(RiskLevel::classify(dec!(0.001)), RiskLevel::Low);
        assert_eq!(RiskLevel::classify(dec!(0.00002)), RiskLevel::Low);
    }

    #[test]
    fn test_sorted_descending_and_stable() {
        let opps = OpportunityDetector::detect(&table(&[
            ("AAA", dec!(0.001), Decimal::ZERO),
            ("BBB", dec!(0.004), Decimal::ZERO),
            ("CCC", Decimal::ZERO, dec!(0.001)),
            ("DDD", dec!(0.0005), Decimal::ZERO),
        ]));

        let symbols: Vec<&str> = opps.iter().map(|o| o.symbol.as_str()).collect();
        // AAA and CCC tie at 0.001 and keep symbol order
        assert_eq!(symbols, vec!["BBB", "AAA", "CCC", "DDD"]);

        for pair in opps.windows(2) {
            assert!(pair[0].abs_rate_difference >= pair[1].abs_rate_difference);
        }
    }

    #[test]
    fn test_abs_difference_invariant() {
        let opps = OpportunityDetector::detect(&table(&[
            ("X", dec!(0.0123), dec!(-0.004)),
            ("Y", dec!(-0.0007), dec!(0.0002)),
        ]));

        for o in &opps {
            assert_eq!(o.abs_rate_difference, (o.rate_a - o.rate_b).abs());
            assert_eq!(
                o.direction == SpreadDirection::ShortALongB,
                o.rate_difference > Decimal::ZERO
            );
        }
    }
}
