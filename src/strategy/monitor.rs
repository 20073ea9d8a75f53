//! One full pipeline pass: fetch, compare, detect, persist, notify.

use super::comparison::{compare, ComparisonTable};
use super::detector::{Opportunity, OpportunityDetector};
use crate::exchange::{FundingRateSample, RateGateway};
use crate::notify::NotificationMatcher;
use crate::persistence::PersistenceSink;
use crate::scheduler::PassRunner;
use anyhow::Result;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

/// Result of the side-effect-free part of a pass.
#[derive(Debug, Clone)]
pub struct ScanResult {
    pub samples_a: Vec<FundingRateSample>,
    pub samples_b: Vec<FundingRateSample>,
    pub table: ComparisonTable,
    pub opportunities: Vec<Opportunity>,
}

/// Counters describing a completed pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    pub samples_a: usize,
    pub samples_b: usize,
    pub symbols: usize,
    pub paired: usize,
    pub opportunities: usize,
    pub notifications: usize,
}

impl fmt::Display for PassReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} + {} samples, {} symbols ({} paired), {} opportunities, {} notifications",
            self.samples_a,
            self.samples_b,
            self.symbols,
            self.paired,
            self.opportunities,
            self.notifications
        )
    }
}

/// Drives the pipeline for one pair of venues.
pub struct FundingMonitor {
    gateway_a: Arc<dyn RateGateway>,
    gateway_b: Arc<dyn RateGateway>,
    sink: Arc<dyn PersistenceSink>,
    matcher: Option<NotificationMatcher>,
}

impl FundingMonitor {
    pub fn new(
        gateway_a: Arc<dyn RateGateway>,
        gateway_b: Arc<dyn RateGateway>,
        sink: Arc<dyn PersistenceSink>,
    ) -> Self {
        Self {
            gateway_a,
            gateway_b,
            sink,
            matcher: None,
        }
    }

    /// Enable notifications.
    pub fn with_matcher(mut self, matcher: NotificationMatcher) -> Self {
        self.matcher = Some(matcher);
        self
    }

    /// Fetch both venues concurrently, then compare and detect.
    ///
    /// Gateways never fail; a venue that is down contributes no samples.
    #[instrument(skip(self))]
    pub async fn scan(&self) -> ScanResult {
        let (samples_a, samples_b) =
            tokio::join!(self.gateway_a.fetch_rates(), self.gateway_b.fetch_rates());

        let table = compare(&samples_a, &samples_b);
        let opportunities = OpportunityDetector::detect(&table);

        debug!(
            a = samples_a.len(),
            b = samples_b.len(),
            symbols = table.len(),
            opportunities = opportunities.len(),
            "Scan complete"
        );

        ScanResult {
            samples_a,
            samples_b,
            table,
            opportunities,
        }
    }

    /// Scan, persist what was seen and notify subscribers.
    ///
    /// Storage failures are logged; the pass continues with in-memory results.
    pub async fn run_once(&self) -> PassReport {
        let scan = self.scan().await;

        for (samples, exchange) in [
            (&scan.samples_a, self.gateway_a.exchange()),
            (&scan.samples_b, self.gateway_b.exchange()),
        ] {
            if samples.is_empty() {
                continue;
            }
            if let Err(e) = self.sink.save_funding_rates(samples, exchange) {
                error!(exchange = %exchange, error = %e, "Failed to save funding rates");
            }
        }

        for opportunity in &scan.opportunities {
            info!(
                "💹 [OPP] {} {} diff={} risk={}",
                opportunity.symbol,
                opportunity.direction.label(),
                opportunity.abs_rate_difference,
                opportunity.risk_level
            );
            if let Err(e) = self.sink.save_opportunity(opportunity) {
                error!(symbol = %opportunity.symbol, error = %e, "Failed to save opportunity");
            }
        }

        let notifications = match &self.matcher {
            Some(matcher) => matcher.run(&scan.opportunities).await.len(),
            None => 0,
        };

        PassReport {
            samples_a: scan.samples_a.len(),
            samples_b: scan.samples_b.len(),
            symbols: scan.table.len(),
            paired: scan
                .table
                .values()
                .filter(|e| e.availability().has_both)
                .count(),
            opportunities: scan.opportunities.len(),
            notifications,
        }
    }
}

#[async_trait]
impl PassRunner for FundingMonitor {
    async fn run_pass(&self) -> Result<PassReport> {
        Ok(self.run_once().await)
    }
}
