//! Price series and snapshot retrieval over an ordered provider list
//!
//! Providers are tried once each, in priority order. A provider's result is
//! used whole or not at all; nothing is merged across providers, and the
//! fetcher never fabricates data.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::api::coingecko::CoinGeckoClient;
use crate::config::WidgetConfig;
use crate::models::{AssetSnapshot, PricePoint, Timeframe};
use crate::utils::errors::{ApiError, FetchError};

/// One upstream source of price data
#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// Name used in logs and failure reports
    fn name(&self) -> &str;

    /// Price history for an asset, non-empty on success
    async fn market_chart(
        &self,
        asset_id: &str,
        currency: &str,
        timeframe: Timeframe,
    ) -> Result<Vec<PricePoint>, ApiError>;

    /// Current price and metadata for an asset
    async fn snapshot(&self, asset_id: &str, currency: &str) -> Result<AssetSnapshot, ApiError>;
}

#[async_trait]
impl PriceProvider for CoinGeckoClient {
    fn name(&self) -> &str {
        if self.is_relayed() {
            "coingecko-relay"
        } else {
            "coingecko"
        }
    }

    async fn market_chart(
        &self,
        asset_id: &str,
        currency: &str,
        timeframe: Timeframe,
    ) -> Result<Vec<PricePoint>, ApiError> {
        self.get_market_chart(asset_id, currency, timeframe).await
    }

    async fn snapshot(&self, asset_id: &str, currency: &str) -> Result<AssetSnapshot, ApiError> {
        self.get_coin(asset_id, currency).await
    }
}

/// What the widget runtime needs from the network
#[async_trait]
pub trait MarketSource: Send + Sync {
    async fn price_series(
        &self,
        asset_id: &str,
        currency: &str,
        timeframe: Timeframe,
    ) -> Result<Vec<PricePoint>, FetchError>;

    async fn snapshot(&self, asset_id: &str, currency: &str) -> Result<AssetSnapshot, FetchError>;
}

/// Walks the provider list until one succeeds
pub struct DataFetcher {
    providers: Vec<Arc<dyn PriceProvider>>,
    attempt_timeout: Duration,
}

impl DataFetcher {
    pub fn new(providers: Vec<Arc<dyn PriceProvider>>, attempt_timeout: Duration) -> Self {
        Self {
            providers,
            attempt_timeout,
        }
    }

    /// Direct CoinGecko first, then the relayed variant when one is configured
    pub fn from_config(config: &WidgetConfig) -> Self {
        let mut providers: Vec<Arc<dyn PriceProvider>> =
            vec![Arc::new(CoinGeckoClient::with_base_url(config.api_base_url.clone()))];
        if let Some(relay) = &config.relay_url {
            providers.push(Arc::new(CoinGeckoClient::relayed(
                config.api_base_url.clone(),
                relay.clone(),
            )));
        }
        Self::new(providers, config.request_timeout)
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    /// Fetch the price series for `timeframe` from the first provider that delivers one
    pub async fn fetch(
        &self,
        asset_id: &str,
        currency: &str,
        timeframe: Timeframe,
    ) -> Result<Vec<PricePoint>, FetchError> {
        self.first_success("market_chart", |provider| async move {
            // Providers are expected to reject empty payloads, but never hand one on
            match provider.market_chart(asset_id, currency, timeframe).await {
                Ok(series) if series.is_empty() => Err(ApiError::EmptySeries),
                other => other,
            }
        })
        .await
    }

    /// Fetch the asset snapshot from the first provider that delivers one
    pub async fn fetch_snapshot(
        &self,
        asset_id: &str,
        currency: &str,
    ) -> Result<AssetSnapshot, FetchError> {
        self.first_success("snapshot", |provider| async move {
            provider.snapshot(asset_id, currency).await
        })
        .await
    }

    async fn first_success<T, F, Fut>(&self, operation: &str, attempt: F) -> Result<T, FetchError>
    where
        F: Fn(Arc<dyn PriceProvider>) -> Fut,
        Fut: std::future::Future<Output = Result<T, ApiError>>,
    {
        if self.providers.is_empty() {
            return Err(FetchError::NoProviders);
        }

        let mut failures = Vec::with_capacity(self.providers.len());
        for provider in &self.providers {
            let name = provider.name().to_string();
            let outcome = match tokio::time::timeout(self.attempt_timeout, attempt(provider.clone())).await {
                Ok(result) => result,
                Err(_) => Err(ApiError::Timeout(self.attempt_timeout.as_millis() as u64)),
            };

            match outcome {
                Ok(value) => {
                    debug!("{} served by {}", operation, name);
                    return Ok(value);
                }
                Err(e) => {
                    warn!("{} via {} failed: {}", operation, name, e);
                    failures.push((name, e));
                }
            }
        }

        Err(FetchError::Exhausted(failures))
    }
}

#[async_trait]
impl MarketSource for DataFetcher {
    async fn price_series(
        &self,
        asset_id: &str,
        currency: &str,
        timeframe: Timeframe,
    ) -> Result<Vec<PricePoint>, FetchError> {
        self.fetch(asset_id, currency, timeframe).await
    }

    async fn snapshot(&self, asset_id: &str, currency: &str) -> Result<AssetSnapshot, FetchError> {
        self.fetch_snapshot(asset_id, currency).await
    }
}
