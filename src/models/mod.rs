//! Data models for the price chart widget
//!
//! Series points, timeframes, asset snapshots and the frames handed to the host surface.

pub mod chart;
pub mod frame;
pub mod snapshot;
pub mod timeframe;

// Re-export commonly used types for convenience
pub use chart::{PricePoint, PRICE_FLOOR};
pub use frame::Frame;
pub use snapshot::AssetSnapshot;
pub use timeframe::{SampleInterval, Timeframe};
