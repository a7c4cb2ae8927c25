//! Chart series models

use serde::{Deserialize, Serialize};

/// Smallest value a price point may carry
pub const PRICE_FLOOR: f64 = 1e-8;

/// A single data point on a price chart
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Seconds since the Unix epoch
    pub time: i64,
    pub value: f64,
}

impl PricePoint {
    /// Create a point, flooring the value so it is always positive
    pub fn new(time: i64, value: f64) -> Self {
        Self {
            time,
            value: floor_price(value),
        }
    }
}

/// Clamp a price to the positive floor (NaN and negatives included)
pub fn floor_price(value: f64) -> f64 {
    if value.is_finite() {
        value.max(PRICE_FLOOR)
    } else if value == f64::INFINITY {
        f64::MAX
    } else {
        PRICE_FLOOR
    }
}

/// Sort by time, collapse duplicate timestamps (latest sample wins) and floor values
pub fn normalize_series(mut points: Vec<PricePoint>) -> Vec<PricePoint> {
    points.sort_by_key(|p| p.time);

    let mut out: Vec<PricePoint> = Vec::with_capacity(points.len());
    for point in points {
        let point = PricePoint::new(point.time, point.value);
        match out.last_mut() {
            Some(last) if last.time == point.time => *last = point,
            _ => out.push(point),
        }
    }
    out
}

/// Keep the latest sample of every `step`-second bucket of a sorted series
pub fn thin_to_interval(series: Vec<PricePoint>, step: i64) -> Vec<PricePoint> {
    let mut out: Vec<PricePoint> = Vec::with_capacity(series.len());
    for point in series {
        match out.last_mut() {
            Some(last) if last.time.div_euclid(step) == point.time.div_euclid(step) => *last = point,
            _ => out.push(point),
        }
    }
    out
}

/// True when timestamps strictly increase and every value is positive
#[cfg(test)]
pub(crate) fn is_well_formed(series: &[PricePoint]) -> bool {
    !series.is_empty()
        && series.iter().all(|p| p.value > 0.0 && p.value.is_finite())
        && series.windows(2).all(|w| w[0].time < w[1].time)
}

/// Lowest and highest value in the series
pub fn value_range(series: &[PricePoint]) -> Option<(f64, f64)> {
    if series.is_empty() {
        return None;
    }
    let min = series.iter().map(|p| p.value).fold(f64::INFINITY, f64::min);
    let max = series.iter().map(|p| p.value).fold(f64::NEG_INFINITY, f64::max);
    Some((min, max))
}

/// Percentage change between the first and last sample
pub fn percent_change(series: &[PricePoint]) -> Option<f64> {
    let first = series.first()?;
    let last = series.last()?;
    Some((last.value - first.value) / first.value * 100.0)
}
