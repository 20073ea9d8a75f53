//! Hyperliquid REST API client.
//!
//! Provides read-only access to perpetuals funding rates, mark prices and
//! open interest through the `/info` endpoint.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use super::types::*;
use crate::exchange::traits::{
    normalize_symbol, Exchange, ExtraMetric, FundingRateSample, RateGateway,
};

/// Base URL for Hyperliquid mainnet API.
pub const MAINNET_API_URL: &str = "https://api.hyperliquid.xyz";

/// Hyperliquid API client for fetching market data.
#[derive(Debug, Clone)]
pub struct HyperliquidClient {
    client: Client,
    base_url: String,
}

impl HyperliquidClient {
    /// Create a new Hyperliquid client for mainnet.
    pub fn new(timeout: Duration) -> Result<Self> {
        Self::with_base_url(MAINNET_API_URL, timeout)
    }

    /// Create a new Hyperliquid client with a custom base URL.
    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Get metadata and asset contexts for all perpetuals.
    #[instrument(skip(self), name = "hl_meta_and_asset_ctxs")]
    pub async fn get_meta_and_asset_ctxs(&self) -> Result<MetaAndAssetCtxsResponse> {
        let url = format!("{}/info", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&InfoRequest::MetaAndAssetCtxs)
            .send()
            .await
            .context("Failed to send metaAndAssetCtxs request")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Hyperliquid API error {}: {}", status, body);
        }

        let data: MetaAndAssetCtxsResponse = response
            .json()
            .await
            .context("Failed to parse metaAndAssetCtxs response")?;

        debug!(assets = data.0.universe.len(), "Fetched Hyperliquid asset contexts");
        Ok(data)
    }

    /// Fetch and normalize funding rates, propagating upstream failures.
    pub async fn try_fetch_rates(&self) -> Result<Vec<FundingRateSample>> {
        let (meta, ctxs) = self.get_meta_and_asset_ctxs().await?;

        if meta.universe.len() != ctxs.len() {
            warn!(
                universe = meta.universe.len(),
                contexts = ctxs.len(),
                "Hyperliquid universe/context length mismatch, pairing by index"
            );
        }

        let observed_at = Utc::now();
        let total = meta.universe.len();
        let samples: Vec<FundingRateSample> = meta
            .universe
            .into_iter()
            .zip(ctxs)
            .filter(|(m, _)| !m.is_delisted)
            .filter_map(|(m, ctx)| {
                let symbol = m.name.as_deref().and_then(normalize_symbol)?;
                let funding_rate = ctx.funding?;
                Some(
                    FundingRateSample::new(symbol, Exchange::Hyperliquid, funding_rate)
                        .with_mark_price(ctx.mark_px)
                        .with_extra(ctx.open_interest.map(ExtraMetric::OpenInterest))
                        .observed_at(observed_at),
                )
            })
            .collect();

        if samples.len() < total {
            debug!(
                kept = samples.len(),
                dropped = total - samples.len(),
                "Dropped incomplete Hyperliquid entries"
            );
        }

        info!("Fetched {} Hyperliquid funding rates", samples.len());
        Ok(samples)
    }
}

#[async_trait]
impl RateGateway for HyperliquidClient {
    fn exchange(&self) -> Exchange {
        Exchange::Hyperliquid
    }

    async fn fetch_rates(&self) -> Vec<FundingRateSample> {
        match self.try_fetch_rates().await {
            Ok(samples) => samples,
            Err(e) => {
                warn!(error = %e, "Hyperliquid funding fetch failed, using empty result");
                Vec::new()
            }
        }
    }
}
