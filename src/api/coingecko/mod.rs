pub mod client;
pub mod models;

pub use client::CoinGeckoClient;
pub use models::{parse_coin, parse_market_chart, MarketChartResponse};
