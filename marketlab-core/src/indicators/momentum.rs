//! Momentum: fractional lookback return.
//!
//! momentum[t] = close[t] / close[t-period] - 1
//! Lookback: period.

use super::Indicator;

#[derive(Debug, Clone)]
pub struct Momentum {
    period: usize,
    name: String,
}

impl Momentum {
    pub fn new(period: usize) -> Self {
        let period = period.max(1);
        Self {
            period,
            name: format!("momentum_{period}"),
        }
    }

    /// Lookback sized to the available history: `max(1, min(126, n / 2))`.
    pub fn adaptive(n: usize) -> Self {
        Self::new((n / 2).min(126).max(1))
    }

    pub fn period(&self) -> usize {
        self.period
    }
}

impl Indicator for Momentum {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, prices: &[f64]) -> Vec<f64> {
        let n = prices.len();
        let mut result = vec![f64::NAN; n];

        for i in self.period..n {
            let prev = prices[i - self.period];
            let curr = prices[i];
            if prev.is_nan() || curr.is_nan() || prev == 0.0 {
                continue;
            }
            result[i] = curr / prev - 1.0;
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn momentum_basic() {
        let result = Momentum::new(2).compute(&[100.0, 105.0, 110.0, 99.0]);
        assert!(result[0].is_nan());
        assert!(result[1].is_nan());
        assert_approx(result[2], 0.10, DEFAULT_EPSILON);
        assert_approx(result[3], 99.0 / 105.0 - 1.0, DEFAULT_EPSILON);
    }

    #[test]
    fn adaptive_lookback_bounds() {
        assert_eq!(Momentum::adaptive(0).period(), 1);
        assert_eq!(Momentum::adaptive(3).period(), 1);
        assert_eq!(Momentum::adaptive(100).period(), 50);
        assert_eq!(Momentum::adaptive(1000).period(), 126);
    }

    #[test]
    fn momentum_short_series_all_nan() {
        let result = Momentum::new(5).compute(&[1.0, 2.0, 3.0]);
        assert!(result.iter().all(|v| v.is_nan()));
    }
}
