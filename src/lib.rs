//! Per-asset price chart widget
//!
//! Fetches price history from CoinGecko (directly, then through a relay),
//! synthesizes sample data when every provider fails, and draws the series
//! on the richest plotters tier the host supports, with a hand-written SVG
//! renderer as the last resort.

pub mod api;
pub mod config;
pub mod models;
pub mod services;
pub mod surface;
pub mod utils;

pub use config::WidgetConfig;
pub use models::{AssetSnapshot, Frame, PricePoint, Timeframe};
pub use services::{mount, WidgetHandle, WidgetOptions};
pub use surface::Surface;
