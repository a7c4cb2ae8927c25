//! Selectable chart timeframes

use serde::{Deserialize, Serialize};

/// Spacing between samples of a series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleInterval {
    Hourly,
    Daily,
}

impl SampleInterval {
    pub fn seconds(self) -> i64 {
        match self {
            SampleInterval::Hourly => 3_600,
            SampleInterval::Daily => 86_400,
        }
    }
}

/// A (span, sampling resolution) pair the user can pick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Timeframe {
    /// Last 24 hours, hourly samples
    Short,
    #[default]
    Week,
    Month,
    Year,
}

impl Timeframe {
    pub fn span_days(self) -> u32 {
        match self {
            Timeframe::Short => 1,
            Timeframe::Week => 7,
            Timeframe::Month => 30,
            Timeframe::Year => 365,
        }
    }

    pub fn sample_interval(self) -> SampleInterval {
        match self {
            Timeframe::Short => SampleInterval::Hourly,
            _ => SampleInterval::Daily,
        }
    }

    /// Number of samples a synthesized series holds: the whole span at the sample interval, both ends included
    pub fn sample_count(self) -> usize {
        let span_seconds = self.span_days() as i64 * SampleInterval::Daily.seconds();
        (span_seconds / self.sample_interval().seconds()) as usize + 1
    }

    /// Short label used in subtitles and logs
    pub fn label(self) -> &'static str {
        match self {
            Timeframe::Short => "24H",
            Timeframe::Week => "7D",
            Timeframe::Month => "30D",
            Timeframe::Year => "1Y",
        }
    }

    /// All timeframes in display order
    pub fn all() -> &'static [Timeframe] {
        &[Timeframe::Short, Timeframe::Week, Timeframe::Month, Timeframe::Year]
    }

    /// Parse timeframe string
    /// Supported: 24h, 1d, 7d, 1w, 30d, 1m, 1y, 365d
    pub fn parse(timeframe: &str) -> Result<Timeframe, String> {
        match timeframe.to_lowercase().as_str() {
            "24h" | "1d" | "short" => Ok(Timeframe::Short),
            "7d" | "1w" | "week" => Ok(Timeframe::Week),
            "30d" | "1m" | "1month" | "month" => Ok(Timeframe::Month),
            "1y" | "365d" | "1year" | "year" => Ok(Timeframe::Year),
            _ => Err(format!(
                "Unknown timeframe: '{}'. Supported: 24h, 7d, 30d, 1y",
                timeframe
            )),
        }
    }
}
