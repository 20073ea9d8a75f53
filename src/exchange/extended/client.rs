//! Extended (Starknet perpetuals) REST API client.
//!
//! Reads funding rates from the markets endpoint and falls back to the
//! per-market funding history when the markets endpoint is unavailable.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures_util::future::join_all;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use super::types::*;
use crate::exchange::traits::{
    normalize_symbol, Exchange, ExtraMetric, FundingRateSample, RateGateway,
};

/// Base URL for Extended mainnet API.
pub const MAINNET_API_URL: &str = "https://api.starknet.extended.exchange";

/// Markets reported when no explicit list is configured.
pub const DEFAULT_MARKETS: [&str; 10] = [
    "BTC-USD", "ETH-USD", "SOL-USD", "AVAX-USD", "MATIC-USD", "DOGE-USD", "ADA-USD", "DOT-USD",
    "UNI-USD", "LINK-USD",
];

const USER_AGENT: &str = concat!("funding-arb-monitor/", env!("CARGO_PKG_VERSION"));

/// Extended API client for fetching market data.
#[derive(Debug, Clone)]
pub struct ExtendedClient {
    client: Client,
    base_url: String,
    markets: Vec<String>,
}

impl ExtendedClient {
    /// Create a new Extended client for mainnet with the default market list.
    pub fn new(timeout: Duration) -> Result<Self> {
        let markets = DEFAULT_MARKETS.iter().map(|m| m.to_string()).collect();
        Self::with_base_url(MAINNET_API_URL, timeout, markets)
    }

    /// Create a new Extended client with a custom base URL and market list.
    pub fn with_base_url(base_url: &str, timeout: Duration, markets: Vec<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            markets,
        })
    }

    /// Get all markets with their live statistics.
    #[instrument(skip(self), name = "ext_get_markets")]
    pub async fn get_markets(&self) -> Result<Vec<MarketInfo>> {
        let url = format!("{}/api/v1/info/markets", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to fetch Extended markets")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Extended API error {}: {}", status, body);
        }

        let envelope: ApiResponse<Vec<MarketInfo>> = response
            .json()
            .await
            .context("Failed to parse Extended markets response")?;

        let markets = envelope
            .into_ok()
            .context("Extended markets response not OK")?;

        debug!(markets = markets.len(), "Fetched Extended markets");
        Ok(markets)
    }

    /// Get the most recent funding record for a market within a time range.
    #[instrument(skip(self), name = "ext_get_latest_funding")]
    pub async fn get_latest_funding(
        &self,
        market: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Option<FundingRecord>> {
        let url = format!("{}/api/v1/info/{}/funding", self.base_url, market);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("startTime", start.timestamp_millis()),
                ("endTime", end.timestamp_millis()),
            ])
            .send()
            .await
            .with_context(|| format!("Failed to fetch funding for {}", market))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Extended API error {} for {}", status, market);
        }

        let envelope: ApiResponse<Vec<FundingRecord>> = response
            .json()
            .await
            .with_context(|| format!("Failed to parse funding response for {}", market))?;

        Ok(envelope
            .into_ok()
            .unwrap_or_default()
            .into_iter()
            .max_by_key(|r| r.timestamp.unwrap_or(i64::MIN)))
    }

    /// Fetch and normalize funding rates, propagating upstream failures.
    pub async fn try_fetch_rates(&self) -> Result<Vec<FundingRateSample>> {
        let samples = match self.fetch_from_markets().await {
            Ok(samples) if !samples.is_empty() => samples,
            Ok(_) => {
                debug!("Extended markets endpoint returned no rates, using funding history");
                self.fetch_from_history().await
            }
            Err(e) => {
                warn!(error = %e, "Extended markets endpoint failed, using funding history");
                self.fetch_from_history().await
            }
        };

        info!("Fetched {} Extended funding rates", samples.len());
        Ok(samples)
    }

    async fn fetch_from_markets(&self) -> Result<Vec<FundingRateSample>> {
        let observed_at = Utc::now();
        let markets = self.get_markets().await?;

        Ok(markets
            .into_iter()
            .filter_map(|m| {
                let name = m.name?;
                if !self.markets.iter().any(|wanted| *wanted == name) {
                    return None;
                }
                let stats = m.market_stats.unwrap_or_default();
                let symbol = normalize_symbol(&name)?;
                let funding_rate = stats.funding_rate?;
                let next_funding = stats
                    .next_funding_rate
                    .and_then(DateTime::<Utc>::from_timestamp_millis)
                    .map(ExtraMetric::NextFundingTime);

                Some(
                    FundingRateSample::new(symbol, Exchange::Extended, funding_rate)
                        .with_mark_price(stats.mark_price)
                        .with_extra(next_funding)
                        .observed_at(observed_at),
                )
            })
            .collect())
    }

    async fn fetch_from_history(&self) -> Vec<FundingRateSample> {
        let end = Utc::now();
        let start = end - ChronoDuration::hours(1);

        let requests = self
            .markets
            .iter()
            .map(|market| async move { (market, self.get_latest_funding(market, start, end).await) });

        join_all(requests)
            .await
            .into_iter()
            .filter_map(|(market, result)| match result {
                Ok(Some(record)) => {
                    let symbol = normalize_symbol(market)?;
                    let funding_rate = record.funding_rate?;
                    Some(
                        FundingRateSample::new(symbol, Exchange::Extended, funding_rate)
                            .observed_at(end),
                    )
                }
                Ok(None) => None,
                Err(e) => {
                    debug!(market = %market, error = %e, "Skipping market in funding fallback");
                    None
                }
            })
            .collect()
    }
}

#[async_trait]
impl RateGateway for ExtendedClient {
    fn exchange(&self) -> Exchange {
        Exchange::Extended
    }

    async fn fetch_rates(&self) -> Vec<FundingRateSample> {
        match self.try_fetch_rates().await {
            Ok(samples) => samples,
            Err(e) => {
                warn!(error = %e, "Extended funding fetch failed, using empty result");
                Vec::new()
            }
        }
    }
}
