pub mod chart_service;
pub mod fallback_service;
pub mod fetch_service;
pub mod render_service;
pub mod synth_service;
pub mod widget_service;

pub use chart_service::{ChartController, ChartState, LoadTicket, RenderMode, Selection};
pub use fetch_service::{DataFetcher, MarketSource, PriceProvider};
pub use render_service::{BackendSelector, CapabilityProbe, ChartBackend, RenderHandle, RenderTier};
pub use widget_service::{mount, WidgetHandle, WidgetOptions};
