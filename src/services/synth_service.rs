//! Sample price series for when no provider can deliver real data
//!
//! The walk is multiplicative: each step applies a slow sinusoidal drift,
//! uniform noise, and a fraction of the previous step's change.

use chrono::Utc;
use rand::Rng;

use crate::models::chart::floor_price;
use crate::models::{PricePoint, Timeframe};

/// Amplitude of the slow macro drift
pub const TREND_AMPLITUDE: f64 = 0.01;
/// Angular step of the drift per sample
pub const TREND_FREQUENCY: f64 = 0.1;
/// Half-width of the uniform noise
pub const VOLATILITY: f64 = 0.015;
/// Share of the previous change carried into the next one
pub const MOMENTUM: f64 = 0.1;

/// Generate a sample series ending now
pub fn synthesize(timeframe: Timeframe, base_price: f64) -> Vec<PricePoint> {
    synthesize_with(
        timeframe,
        base_price,
        Utc::now().timestamp(),
        &mut rand::thread_rng(),
    )
}

/// Generate a sample series ending at `now` using the given random source
pub fn synthesize_with<R: Rng>(
    timeframe: Timeframe,
    base_price: f64,
    now: i64,
    rng: &mut R,
) -> Vec<PricePoint> {
    let count = timeframe.sample_count();
    let step = timeframe.sample_interval().seconds();
    let start = now - step * (count as i64 - 1);

    let mut points = Vec::with_capacity(count);
    let mut price = floor_price(base_price);
    let mut change = 0.0;
    points.push(PricePoint::new(start, price));

    for i in 1..count {
        let trend = TREND_AMPLITUDE * (i as f64 * TREND_FREQUENCY).sin();
        let volatility = rng.gen_range(-VOLATILITY..=VOLATILITY);
        let momentum = MOMENTUM * change;

        change = trend + volatility + momentum;
        price = floor_price(price * (1.0 + change));
        points.push(PricePoint::new(start + step * i as i64, price));
    }

    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chart::is_well_formed;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_length_order_and_positivity_for_every_timeframe() {
        for tf in Timeframe::all() {
            for base in [1e-9, 0.0042, 1.0, 100.0, 65_000.0, 1e12] {
                let series = synthesize(*tf, base);
                assert_eq!(series.len(), tf.sample_count());
                assert!(is_well_formed(&series), "{:?} base {}", tf, base);
                assert!(series.iter().all(|p| p.value > 0.0));
            }
        }
    }

    #[test]
    fn test_starts_at_base_and_ends_now() {
        let mut rng = StdRng::seed_from_u64(7);
        let now = 1_700_000_000;
        let series = synthesize_with(Timeframe::Month, 250.0, now, &mut rng);
        assert_eq!(series[0].value, 250.0);
        assert_eq!(series.last().unwrap().time, now);
        assert_eq!(series[1].time - series[0].time, 86_400);
    }

    #[test]
    fn test_short_timeframe_is_hourly() {
        let mut rng = StdRng::seed_from_u64(1);
        let now = 1_700_000_000;
        let series = synthesize_with(Timeframe::Short, 10.0, now, &mut rng);
        assert_eq!(series.len(), 25);
        assert_eq!(series[1].time - series[0].time, 3_600);
        assert_eq!(now - series[0].time, 86_400);
    }

    #[test]
    fn test_repeated_calls_differ() {
        let a = synthesize(Timeframe::Year, 100.0);
        let b = synthesize(Timeframe::Year, 100.0);
        assert_ne!(
            a.iter().map(|p| p.value).collect::<Vec<_>>(),
            b.iter().map(|p| p.value).collect::<Vec<_>>()
        );
        assert!(is_well_formed(&a) && is_well_formed(&b));
    }

    #[test]
    fn test_same_seed_same_series() {
        let a = synthesize_with(Timeframe::Week, 42.0, 0, &mut StdRng::seed_from_u64(99));
        let b = synthesize_with(Timeframe::Week, 42.0, 0, &mut StdRng::seed_from_u64(99));
        assert_eq!(a, b);
    }

    #[test]
    fn test_steps_stay_within_bounds() {
        let mut rng = StdRng::seed_from_u64(3);
        let series = synthesize_with(Timeframe::Year, 100.0, 0, &mut rng);
        // |change| <= (A + v) / (1 - k)
        let bound = (TREND_AMPLITUDE + VOLATILITY) / (1.0 - MOMENTUM) + 1e-12;
        for w in series.windows(2) {
            let step = w[1].value / w[0].value - 1.0;
            assert!(step.abs() <= bound, "step {} exceeds {}", step, bound);
        }
    }

    #[test]
    fn test_invalid_base_price_is_floored() {
        let series = synthesize(Timeframe::Week, -10.0);
        assert!(is_well_formed(&series));
        let series = synthesize(Timeframe::Week, f64::NAN);
        assert!(is_well_formed(&series));
    }
}
