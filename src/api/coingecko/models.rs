use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::{AssetSnapshot, PricePoint};
use crate::utils::errors::ApiError;

/// Response from GET /coins/{id}/market_chart
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketChartResponse {
    /// `[timestamp_ms, price]` pairs
    pub prices: Vec<(f64, f64)>,
}

impl MarketChartResponse {
    /// Convert to a normalized series in seconds, rejecting empty payloads
    pub fn into_series(self) -> Result<Vec<PricePoint>, ApiError> {
        if self.prices.is_empty() {
            return Err(ApiError::EmptySeries);
        }

        let mut points = Vec::with_capacity(self.prices.len());
        for (timestamp_ms, price) in self.prices {
            if !timestamp_ms.is_finite() || !price.is_finite() {
                return Err(ApiError::DeserializationError(format!(
                    "non-finite sample [{}, {}]",
                    timestamp_ms, price
                )));
            }
            points.push(PricePoint::new((timestamp_ms / 1000.0).floor() as i64, price));
        }

        Ok(crate::models::chart::normalize_series(points))
    }
}

/// Parse a market chart body, shared by the direct and relayed providers
pub fn parse_market_chart(body: &str) -> Result<Vec<PricePoint>, ApiError> {
    serde_json::from_str::<MarketChartResponse>(body)
        .map_err(|e| ApiError::DeserializationError(format!("Failed to parse market chart: {}", e)))?
        .into_series()
}

/// Response from GET /coins/{id}
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoinResponse {
    pub id: String,
    pub symbol: String,
    pub name: String,
    #[serde(default)]
    pub description: HashMap<String, Option<String>>,
    #[serde(default)]
    pub links: Option<CoinLinks>,
    pub market_data: Option<MarketData>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoinLinks {
    #[serde(default)]
    pub homepage: Vec<Option<String>>,
    #[serde(default)]
    pub blockchain_site: Vec<Option<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketData {
    #[serde(default)]
    pub current_price: HashMap<String, f64>,
    #[serde(default)]
    pub price_change_percentage_24h_in_currency: HashMap<String, f64>,
    #[serde(default)]
    pub price_change_percentage_7d_in_currency: HashMap<String, f64>,
    #[serde(default)]
    pub price_change_percentage_30d_in_currency: HashMap<String, f64>,
    pub circulating_supply: Option<f64>,
    pub total_supply: Option<f64>,
    pub max_supply: Option<f64>,
}

impl CoinResponse {
    /// Pick out the fields for one quote currency
    pub fn into_snapshot(self, currency: &str) -> Result<AssetSnapshot, ApiError> {
        let currency = currency.to_lowercase();
        let market = self.market_data.unwrap_or_default();

        let current_price = market
            .current_price
            .get(&currency)
            .copied()
            .filter(|p| *p > 0.0 && p.is_finite())
            .ok_or_else(|| {
                ApiError::DeserializationError(format!("no '{}' price for {}", currency, self.id))
            })?;

        let first_link = |links: &[Option<String>]| {
            links
                .iter()
                .flatten()
                .find(|l| !l.trim().is_empty())
                .cloned()
        };
        let links = self.links.unwrap_or_default();

        Ok(AssetSnapshot {
            id: self.id,
            name: self.name,
            symbol: self.symbol,
            current_price,
            change_24h: market.price_change_percentage_24h_in_currency.get(&currency).copied(),
            change_7d: market.price_change_percentage_7d_in_currency.get(&currency).copied(),
            change_30d: market.price_change_percentage_30d_in_currency.get(&currency).copied(),
            circulating_supply: market.circulating_supply,
            total_supply: market.total_supply,
            max_supply: market.max_supply,
            description: self.description.get("en").cloned().flatten().unwrap_or_default(),
            homepage: first_link(&links.homepage),
            explorer: first_link(&links.blockchain_site),
        })
    }
}

/// Parse a coin body into a snapshot for `currency`
pub fn parse_coin(body: &str, currency: &str) -> Result<AssetSnapshot, ApiError> {
    serde_json::from_str::<CoinResponse>(body)
        .map_err(|e| ApiError::DeserializationError(format!("Failed to parse coin: {}", e)))?
        .into_snapshot(currency)
}

/// Error response from the API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: Option<String>,
    pub status: Option<ErrorStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorStatus {
    pub error_code: Option<i64>,
    pub error_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_market_chart_converts_to_seconds() {
        let body = r#"{"prices":[[1700000000000,35000.5],[1700003600000,35100.25]],"market_caps":[]}"#;
        let series = parse_market_chart(body).unwrap();
        assert_eq!(
            series,
            vec![
                PricePoint::new(1_700_000_000, 35000.5),
                PricePoint::new(1_700_003_600, 35100.25),
            ]
        );
    }

    #[test]
    fn test_parse_market_chart_rejects_empty_and_malformed() {
        assert_eq!(parse_market_chart(r#"{"prices":[]}"#), Err(ApiError::EmptySeries));
        assert!(matches!(
            parse_market_chart(r#"{"total_volumes":[]}"#),
            Err(ApiError::DeserializationError(_))
        ));
        assert!(matches!(
            parse_market_chart("<html>bad gateway</html>"),
            Err(ApiError::DeserializationError(_))
        ));
    }

    #[test]
    fn test_parse_coin_snapshot() {
        let body = r#"{
            "id": "bitcoin",
            "symbol": "btc",
            "name": "Bitcoin",
            "description": {"en": "Peer-to-peer cash."},
            "links": {"homepage": ["", "https://bitcoin.org"], "blockchain_site": [null, "https://mempool.space"]},
            "market_data": {
                "current_price": {"usd": 64000.0, "eur": 59000.0},
                "price_change_percentage_24h_in_currency": {"usd": 1.5},
                "circulating_supply": 19700000.0,
                "total_supply": 21000000.0,
                "max_supply": 21000000.0
            }
        }"#;
        let snapshot = parse_coin(body, "EUR").unwrap();
        assert_eq!(snapshot.current_price, 59000.0);
        assert_eq!(snapshot.change_24h, None);
        assert_eq!(snapshot.display_name(), "Bitcoin (BTC)");
        assert_eq!(snapshot.homepage.as_deref(), Some("https://bitcoin.org"));
        assert_eq!(snapshot.explorer.as_deref(), Some("https://mempool.space"));
        assert_eq!(snapshot.description, "Peer-to-peer cash.");

        let usd = parse_coin(body, "usd").unwrap();
        assert_eq!(usd.change_24h, Some(1.5));
        assert!(parse_coin(body, "jpy").is_err());
    }
}
