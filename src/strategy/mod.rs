//! Funding rate comparison pipeline.
//!
//! - Comparison: join both venues' samples on the normalized symbol
//! - Detection: material divergences, ranked with risk and profit projections
//! - Monitoring: one scheduled pass end to end
//! - Stats: history summaries for a single pair
//! - Dashboard: market-wide aggregates over stored opportunities

mod comparison;
mod dashboard;
mod detector;
mod monitor;
mod stats;

pub use comparison::{compare, Availability, ComparisonEntry, ComparisonTable, VenueQuote};
pub use dashboard::{
    market_overview, MarketSummary, OverviewBucket, Timeframe, SUMMARY_TOP_N, SUMMARY_WINDOW_HOURS,
};
pub use detector::{
    Opportunity, OpportunityDetector, ProfitProjection, RiskLevel, SpreadDirection,
    HIGH_RISK_ABOVE, MEDIUM_RISK_ABOVE, MIN_MATERIALITY_THRESHOLD,
};
pub use monitor::{FundingMonitor, PassReport, ScanResult};
pub use stats::{HistoryPoint, PairStats};
