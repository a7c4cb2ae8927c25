//! Environment-driven widget configuration
//!
//! Values are read with `std::env::var` after `dotenv::dotenv()` has loaded any
//! `.env` file, the same way the binary reads the rest of its settings.

use std::time::Duration;

use crate::services::render_service::RenderTier;
use crate::utils::errors::ConfigError;

pub const DEFAULT_API_URL: &str = "https://api.coingecko.com/api/v3";
pub const DEFAULT_RELAY_URL: &str = "https://api.allorigins.win/raw?url=";

/// Settings shared by the data fetcher, the renderer and the widget runtime
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetConfig {
    pub api_base_url: String,
    /// Prefix the relay provider puts in front of the url-encoded request; `None` disables it
    pub relay_url: Option<String>,
    /// Bound on a single provider attempt
    pub request_timeout: Duration,
    pub snapshot_interval: Duration,
    /// Delay between mount and the first surface initialization
    pub init_delay: Duration,
    /// Base price for sample data when no snapshot has arrived yet
    pub fallback_base_price: f64,
    /// Raster tiers the host supports, richest first
    pub render_tiers: Vec<RenderTier>,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            relay_url: Some(DEFAULT_RELAY_URL.to_string()),
            request_timeout: Duration::from_secs(10),
            snapshot_interval: Duration::from_secs(60),
            init_delay: Duration::from_millis(100),
            fallback_base_price: 100.0,
            render_tiers: vec![RenderTier::Area, RenderTier::Line, RenderTier::Generic],
        }
    }
}

impl WidgetConfig {
    /// Build the configuration from `PRICECHART_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from any variable lookup (used by tests)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("PRICECHART_API_URL") {
            config.api_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(relay) = lookup("PRICECHART_RELAY_URL") {
            // Empty value turns the relay provider off
            config.relay_url = if relay.trim().is_empty() { None } else { Some(relay) };
        }
        if let Some(ms) = lookup("PRICECHART_TIMEOUT_MS") {
            config.request_timeout = Duration::from_millis(parse_number("PRICECHART_TIMEOUT_MS", &ms)?);
        }
        if let Some(secs) = lookup("PRICECHART_SNAPSHOT_SECS") {
            let secs: u64 = parse_number("PRICECHART_SNAPSHOT_SECS", &secs)?;
            if secs == 0 {
                return Err(invalid("PRICECHART_SNAPSHOT_SECS", "0", "interval must be positive"));
            }
            config.snapshot_interval = Duration::from_secs(secs);
        }
        if let Some(ms) = lookup("PRICECHART_INIT_DELAY_MS") {
            config.init_delay = Duration::from_millis(parse_number("PRICECHART_INIT_DELAY_MS", &ms)?);
        }
        if let Some(price) = lookup("PRICECHART_FALLBACK_PRICE") {
            let value: f64 = parse_number("PRICECHART_FALLBACK_PRICE", &price)?;
            if !(value > 0.0 && value.is_finite()) {
                return Err(invalid("PRICECHART_FALLBACK_PRICE", &price, "price must be positive"));
            }
            config.fallback_base_price = value;
        }
        if let Some(tiers) = lookup("PRICECHART_RENDER_TIERS") {
            config.render_tiers = parse_tiers(&tiers)?;
        }

        Ok(config)
    }
}

fn parse_number<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| invalid(name, value, &e.to_string()))
}

/// Parse a comma separated tier list, e.g. "area,line"
fn parse_tiers(value: &str) -> Result<Vec<RenderTier>, ConfigError> {
    let mut tiers = Vec::new();
    for name in value.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let tier = match name.to_lowercase().as_str() {
            "area" => RenderTier::Area,
            "line" => RenderTier::Line,
            "generic" => RenderTier::Generic,
            _ => {
                return Err(invalid(
                    "PRICECHART_RENDER_TIERS",
                    value,
                    &format!("unknown tier '{}'", name),
                ))
            }
        };
        if !tiers.contains(&tier) {
            tiers.push(tier);
        }
    }
    Ok(tiers)
}

fn invalid(name: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        name,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
