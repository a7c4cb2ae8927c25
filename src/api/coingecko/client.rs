use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::Client as HttpClient;
use tracing::{debug, warn};

use super::models::{self, ErrorResponse};
use crate::models::chart::thin_to_interval;
use crate::models::{AssetSnapshot, PricePoint, SampleInterval, Timeframe};
use crate::utils::errors::ApiError;

/// CoinGecko API client, optionally routed through a pass-through relay
pub struct CoinGeckoClient {
    http_client: HttpClient,
    base_url: String,
    /// Relay prefix, e.g. "https://api.allorigins.win/raw?url="
    relay_url: Option<String>,
}

impl CoinGeckoClient {
    /// Create a client that calls the API at `base_url` directly
    pub fn with_base_url(base_url: String) -> Self {
        Self {
            http_client: build_http_client(),
            base_url: base_url.trim_end_matches('/').to_string(),
            relay_url: None,
        }
    }

    /// Create a client that wraps every request in the given relay
    pub fn relayed(base_url: String, relay_url: String) -> Self {
        Self {
            relay_url: Some(relay_url),
            ..Self::with_base_url(base_url)
        }
    }

    pub fn is_relayed(&self) -> bool {
        self.relay_url.is_some()
    }

    /// Create default headers
    fn create_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static("pricechart/0.1"));
        headers
    }

    /// Wrap the target url in the relay when one is configured
    fn request_url(&self, target: String) -> String {
        match &self.relay_url {
            Some(relay) => format!("{}{}", relay, urlencoding::encode(&target)),
            None => target,
        }
    }

    /// Url for the price history of `asset_id` over `timeframe`
    pub fn market_chart_url(&self, asset_id: &str, currency: &str, timeframe: Timeframe) -> String {
        let mut target = format!(
            "{}/coins/{}/market_chart?vs_currency={}&days={}",
            self.base_url,
            urlencoding::encode(asset_id),
            urlencoding::encode(&currency.to_lowercase()),
            timeframe.span_days()
        );
        // days=1 comes back in 5-minute steps and is thinned to hourly after parsing
        if timeframe.sample_interval() == SampleInterval::Daily {
            target.push_str("&interval=daily");
        }
        self.request_url(target)
    }

    /// Url for the coin metadata and market snapshot of `asset_id`
    pub fn coin_url(&self, asset_id: &str) -> String {
        self.request_url(format!(
            "{}/coins/{}?localization=false&tickers=false&market_data=true&community_data=false&developer_data=false",
            self.base_url,
            urlencoding::encode(asset_id)
        ))
    }

    /// Parse error response based on HTTP status code
    async fn handle_error_response(
        status: reqwest::StatusCode,
        response: reqwest::Response,
    ) -> ApiError {
        let status_code = status.as_u16();
        let body_text = response.text().await.unwrap_or_default();

        // Prefer the API's own message when the body carries one
        let message = serde_json::from_str::<ErrorResponse>(&body_text)
            .ok()
            .and_then(|err| {
                err.error
                    .or_else(|| err.status.and_then(|s| s.error_message))
            })
            .unwrap_or(body_text);

        match status_code {
            429 => {
                warn!("Rate limited by upstream: {}", message);
                ApiError::RateLimited(message)
            }
            500..=599 => {
                warn!("Server error {}: {}", status_code, message);
                ApiError::HttpError(status_code, message)
            }
            _ => ApiError::HttpError(status_code, message),
        }
    }

    /// GET a url and return the body text of a successful response
    async fn get_text(&self, url: &str) -> Result<String, ApiError> {
        debug!("GET {}", url);

        let response = self
            .http_client
            .get(url)
            .headers(Self::create_headers())
            .send()
            .await
            .map_err(|e| ApiError::RequestError(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(Self::handle_error_response(status, response).await);
        }

        response
            .text()
            .await
            .map_err(|e| ApiError::RequestError(format!("Failed to read body: {}", e)))
    }

    /// GET /coins/{id}/market_chart
    ///
    /// Retrieves the price history of an asset in the given quote currency.
    ///
    /// # Returns
    /// * `Ok(Vec<PricePoint>)` - Non-empty series, timestamps in seconds
    /// * `Err(ApiError)` - Status, transport, payload or empty-series failure
    pub async fn get_market_chart(
        &self,
        asset_id: &str,
        currency: &str,
        timeframe: Timeframe,
    ) -> Result<Vec<PricePoint>, ApiError> {
        let url = self.market_chart_url(asset_id, currency, timeframe);
        let body = self.get_text(&url).await?;
        let series = models::parse_market_chart(&body)?;
        Ok(match timeframe.sample_interval() {
            SampleInterval::Hourly => thin_to_interval(series, SampleInterval::Hourly.seconds()),
            SampleInterval::Daily => series,
        })
    }

    /// GET /coins/{id}
    ///
    /// Retrieves name, description, links and market data for an asset.
    pub async fn get_coin(&self, asset_id: &str, currency: &str) -> Result<AssetSnapshot, ApiError> {
        let url = self.coin_url(asset_id);
        let body = self.get_text(&url).await?;
        models::parse_coin(&body, currency)
    }
}

fn build_http_client() -> HttpClient {
    // Fall back to the plain client if the builder rejects the settings
    HttpClient::builder()
        .timeout(Duration::from_secs(30))
        .pool_max_idle_per_host(4)
        .build()
        .unwrap_or_else(|_| HttpClient::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_market_chart_url_direct() {
        let client = CoinGeckoClient::with_base_url("https://example.test/api/v3/".to_string());
        assert_eq!(
            client.market_chart_url("bitcoin", "USD", Timeframe::Short),
            "https://example.test/api/v3/coins/bitcoin/market_chart?vs_currency=usd&days=1"
        );
        assert_eq!(
            client.market_chart_url("bitcoin", "usd", Timeframe::Month),
            "https://example.test/api/v3/coins/bitcoin/market_chart?vs_currency=usd&days=30&interval=daily"
        );
    }

    #[test]
    fn test_relayed_url_wraps_identical_request() {
        let direct = CoinGeckoClient::with_base_url("https://example.test/api/v3".to_string());
        let relayed = CoinGeckoClient::relayed(
            "https://example.test/api/v3".to_string(),
            "https://relay.test/raw?url=".to_string(),
        );
        let target = direct.market_chart_url("ethereum", "eur", Timeframe::Week);
        assert_eq!(
            relayed.market_chart_url("ethereum", "eur", Timeframe::Week),
            format!("https://relay.test/raw?url={}", urlencoding::encode(&target))
        );
        assert!(relayed.is_relayed());
        assert!(!direct.is_relayed());
    }
}
