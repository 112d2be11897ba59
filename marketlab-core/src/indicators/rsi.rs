//! Relative Strength Index (RSI), exponentially smoothed.
//!
//! Gains and losses are the positive and negative parts of the one-bar price
//! change. Each is smoothed with an exponential average of weight
//! `alpha = 1 / period`, seeded with the first change (no bias correction):
//!
//! `avg[1] = x[1]`, `avg[t] = (1 - alpha) * avg[t-1] + alpha * x[t]`
//!
//! `RSI = 100 - 100 / (1 + avg_gain / (avg_loss + 1e-12))`
//!
//! The first value is defined at index 1, so lookback is always 1.

use super::Indicator;

/// Guards the gain/loss ratio against a zero-loss denominator.
const LOSS_FLOOR: f64 = 1e-12;

#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    name: String,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(1),
            name: format!("rsi_{period}"),
        }
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        1
    }

    fn compute(&self, prices: &[f64]) -> Vec<f64> {
        let n = prices.len();
        let mut result = vec![f64::NAN; n];
        if n < 2 {
            return result;
        }

        let alpha = 1.0 / self.period as f64;
        let mut avg_gain = f64::NAN;
        let mut avg_loss = f64::NAN;

        for i in 1..n {
            let change = prices[i] - prices[i - 1];
            if change.is_nan() {
                // carry the smoothed state across missing observations
                result[i] = if avg_gain.is_nan() { f64::NAN } else { rsi_from(avg_gain, avg_loss) };
                continue;
            }
            let gain = change.max(0.0);
            let loss = (-change).max(0.0);

            if avg_gain.is_nan() {
                avg_gain = gain;
                avg_loss = loss;
            } else {
                avg_gain = (1.0 - alpha) * avg_gain + alpha * gain;
                avg_loss = (1.0 - alpha) * avg_loss + alpha * loss;
            }
            result[i] = rsi_from(avg_gain, avg_loss);
        }

        result
    }
}

fn rsi_from(avg_gain: f64, avg_loss: f64) -> f64 {
    let rs = avg_gain / (avg_loss + LOSS_FLOOR);
    100.0 - 100.0 / (1.0 + rs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::assert_approx;

    #[test]
    fn rsi_first_value_is_nan() {
        let result = Rsi::new(14).compute(&[100.0, 101.0, 102.0]);
        assert!(result[0].is_nan());
        assert!(!result[1].is_nan());
    }

    #[test]
    fn rsi_all_gains_near_100() {
        let prices: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let result = Rsi::new(14).compute(&prices);
        assert!(result[29] > 99.99, "expected ~100, got {}", result[29]);
    }

    #[test]
    fn rsi_all_losses_zero() {
        let prices: Vec<f64> = (0..30).map(|i| 200.0 - i as f64).collect();
        let result = Rsi::new(14).compute(&prices);
        assert_approx(result[29], 0.0, 1e-6);
    }

    #[test]
    fn rsi_flat_prices_is_zero() {
        // no gains and no losses: ratio is 0/(0+floor) = 0, so RSI = 0
        let result = Rsi::new(14).compute(&[50.0; 10]);
        assert_approx(result[9], 0.0, 1e-9);
    }

    #[test]
    fn rsi_hand_computed_smoothing() {
        // changes: +2, -1, +1 with alpha = 1/2
        let prices = [10.0, 12.0, 11.0, 12.0];
        let result = Rsi::new(2).compute(&prices);
        // t=1: gain 2, loss 0 -> ~100
        assert!(result[1] > 99.99);
        // t=2: gain = 0.5*2 + 0.5*0 = 1.0; loss = 0.5*0 + 0.5*1 = 0.5 -> rs 2 -> 66.67
        assert_approx(result[2], 100.0 - 100.0 / 3.0, 1e-6);
        // t=3: gain = 0.5*1 + 0.5*1 = 1.0; loss = 0.25 -> rs 4 -> 80
        assert_approx(result[3], 80.0, 1e-6);
    }

    #[test]
    fn rsi_bounded() {
        let prices: Vec<f64> = (0..200).map(|i| 100.0 + (i as f64 * 0.37).sin() * 10.0).collect();
        for v in Rsi::new(14).compute(&prices).into_iter().skip(1) {
            assert!((0.0..=100.0).contains(&v), "RSI out of range: {v}");
        }
    }
}
