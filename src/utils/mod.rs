pub mod errors;
pub mod format;

pub use errors::{ApiError, ConfigError, FetchError, RenderError};
pub use format::{default_formatter, format_percent, format_price, PriceFormatter};
