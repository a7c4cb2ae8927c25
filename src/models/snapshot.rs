use serde::{Deserialize, Serialize};

/// Current metadata and price for an asset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetSnapshot {
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub current_price: f64,
    pub change_24h: Option<f64>,
    pub change_7d: Option<f64>,
    pub change_30d: Option<f64>,
    pub circulating_supply: Option<f64>,
    pub total_supply: Option<f64>,
    pub max_supply: Option<f64>,
    pub description: String,
    pub homepage: Option<String>,
    pub explorer: Option<String>,
}

impl AssetSnapshot {
    /// Name shown in chart titles, e.g. "Bitcoin (BTC)"
    pub fn display_name(&self) -> String {
        if self.symbol.is_empty() {
            self.name.clone()
        } else {
            format!("{} ({})", self.name, self.symbol.to_uppercase())
        }
    }
}
