//! Simple Moving Average (SMA).
//!
//! Rolling mean over a full window; positions without a full window are NaN.
//! Lookback: period - 1 (first valid value at index period-1).

use super::Indicator;

#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    name: String,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(1),
            name: format!("sma_{period}"),
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }
}

impl Indicator for Sma {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, prices: &[f64]) -> Vec<f64> {
        let n = prices.len();
        let mut result = vec![f64::NAN; n];

        if n < self.period {
            return result;
        }

        let mut sum: f64 = prices[..self.period].iter().sum();
        result[self.period - 1] = sum / self.period as f64;

        // Roll the window forward
        for i in self.period..n {
            sum += prices[i] - prices[i - self.period];
            result[i] = sum / self.period as f64;
        }

        // A NaN anywhere in the window poisons the rolling sum; rebuild those
        // positions from scratch so NaN stays local to the windows it touches.
        if result.iter().any(|v| v.is_nan()) && prices.iter().any(|p| p.is_nan()) {
            for i in (self.period - 1)..n {
                let window = &prices[(i + 1 - self.period)..=i];
                result[i] = if window.iter().any(|p| p.is_nan()) {
                    f64::NAN
                } else {
                    window.iter().sum::<f64>() / self.period as f64
                };
            }
        }

        result
    }
}
