//! Price indicators used by the signal engine and the crossover backtester.
//!
//! Every indicator is a pure function of a price slice and returns a series
//! of the same length. Warmup positions hold `f64::NAN`; callers treat NaN
//! as "not enough history yet".

pub mod momentum;
pub mod rsi;
pub mod sma;

pub use momentum::Momentum;
pub use rsi::Rsi;
pub use sma::Sma;

/// Trait for indicators.
///
/// # Look-ahead contamination guard
/// No value at index t may depend on prices at t+1 or later. Computing over a
/// truncated series must reproduce the prefix of the full computation.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "sma_50", "rsi_14").
    fn name(&self) -> &str;

    /// Number of leading positions that are NaN.
    fn lookback(&self) -> usize;

    /// Compute the indicator over the whole price slice.
    fn compute(&self, prices: &[f64]) -> Vec<f64>;
}

/// Last non-NaN value of an indicator series.
pub fn last_valid(values: &[f64]) -> Option<f64> {
    values.iter().rev().copied().find(|v| !v.is_nan())
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_valid_skips_trailing_nan() {
        assert_eq!(last_valid(&[1.0, 2.0, f64::NAN]), Some(2.0));
        assert_eq!(last_valid(&[f64::NAN, f64::NAN]), None);
        assert_eq!(last_valid(&[]), None);
    }

    #[test]
    fn truncated_series_matches_prefix() {
        let prices: Vec<f64> = (0..80).map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0).collect();
        let indicators: Vec<Box<dyn Indicator>> = vec![
            Box::new(Sma::new(10)),
            Box::new(Rsi::new(14)),
            Box::new(Momentum::new(5)),
        ];
        for ind in indicators {
            let full = ind.compute(&prices);
            let truncated = ind.compute(&prices[..50]);
            for i in 0..50 {
                let (a, b) = (full[i], truncated[i]);
                assert!(
                    (a.is_nan() && b.is_nan()) || (a - b).abs() < 1e-9,
                    "{} diverges at {i}: {a} vs {b}",
                    ind.name()
                );
            }
        }
    }
}
