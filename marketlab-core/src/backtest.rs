//! Strategy backtester: two-moving-average crossover.
//!
//! Position at bar t is 1 when the fast SMA exceeded the slow SMA at bar t-1,
//! else 0. Using yesterday's crossover state for today's position keeps the
//! simulation free of look-ahead. Strategy return = asset return × position;
//! equity compounds from 1.0.

use serde::{Deserialize, Serialize};

use crate::domain::PriceSeries;
use crate::error::EvalError;
use crate::indicators::{Indicator, Sma};
use crate::metrics::BacktestMetrics;

/// Bars required beyond the slow window before a backtest is meaningful.
pub const LOOKAHEAD_BUFFER: usize = 5;

/// Minimum series length for a crossover backtest with these windows.
pub fn required_bars(fast: usize, slow: usize) -> usize {
    fast.max(slow) + LOOKAHEAD_BUFFER
}

/// Output of one crossover simulation.
///
/// `equity` and `returns` are aligned with the input series bar for bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub equity: Vec<f64>,
    pub returns: Vec<f64>,
    pub metrics: BacktestMetrics,
}

/// Run the crossover strategy over `series`.
///
/// Fails with a validation error when `fast >= slow` or when the series is
/// shorter than [`required_bars`].
pub fn backtest_sma_cross(
    series: &PriceSeries,
    fast: usize,
    slow: usize,
) -> Result<BacktestResult, EvalError> {
    if fast == 0 {
        return Err(EvalError::validation("fast window must be at least 1"));
    }
    if fast >= slow {
        return Err(EvalError::validation(format!(
            "For SMA cross, fast must be < slow (got fast={fast}, slow={slow})"
        )));
    }
    let need = required_bars(fast, slow);
    if series.len() < need {
        return Err(EvalError::validation(format!(
            "Not enough data: have {}, need >= {need}",
            series.len()
        )));
    }

    let prices = series.prices();
    let fast_sma = Sma::new(fast).compute(&prices);
    let slow_sma = Sma::new(slow).compute(&prices);

    let n = prices.len();
    let mut returns = Vec::with_capacity(n);
    let mut equity = Vec::with_capacity(n);
    let mut level = 1.0_f64;

    for t in 0..n {
        let position = if t == 0 {
            0.0
        } else {
            let (f, s) = (fast_sma[t - 1], slow_sma[t - 1]);
            // NaN comparisons are false, so warmup bars stay flat
            if f > s {
                1.0
            } else {
                0.0
            }
        };
        let asset_ret = if t == 0 {
            0.0
        } else {
            prices[t] / prices[t - 1] - 1.0
        };
        let strat_ret = asset_ret * position;
        level *= 1.0 + strat_ret;
        returns.push(strat_ret);
        equity.push(level);
    }

    let metrics = BacktestMetrics::compute(&equity, &returns);
    Ok(BacktestResult {
        equity,
        returns,
        metrics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn series(prices: &[f64]) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        PriceSeries::from_prices("TEST", start, prices)
    }

    #[test]
    fn rejects_fast_not_below_slow() {
        let s = series(&[100.0; 50]);
        let err = backtest_sma_cross(&s, 20, 20).unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("fast must be < slow"));
    }

    #[test]
    fn rejects_short_series_with_shortfall() {
        let s = series(&[100.0; 24]);
        let err = backtest_sma_cross(&s, 5, 20).unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("have 24, need >= 25"));
    }

    #[test]
    fn exactly_required_bars_is_accepted() {
        let s = series(&[100.0; 25]);
        assert!(backtest_sma_cross(&s, 5, 20).is_ok());
    }

    #[test]
    fn flat_prices_stay_flat() {
        let s = series(&[50.0; 40]);
        let r = backtest_sma_cross(&s, 3, 10).unwrap();
        assert!(r.equity.iter().all(|&e| e == 1.0));
        assert_eq!(r.metrics.sharpe, 0.0);
        assert_eq!(r.metrics.max_drawdown, 0.0);
        assert_eq!(r.metrics.win_rate, 0.0);
    }

    #[test]
    fn position_is_lagged_one_bar() {
        // Rising prices: fast > slow from bar `slow-1` onwards, so the first
        // invested return is at bar `slow`.
        let prices: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let r = backtest_sma_cross(&series(&prices), 2, 5).unwrap();
        for t in 0..5 {
            assert_eq!(r.returns[t], 0.0, "bar {t} should be flat");
        }
        assert!(r.returns[5] > 0.0);
        assert_eq!(r.equity[0], 1.0);
    }

    #[test]
    fn uptrend_compounds_positive() {
        let prices: Vec<f64> = (0..300).map(|i| 100.0 * 1.001_f64.powi(i)).collect();
        let r = backtest_sma_cross(&series(&prices), 10, 50).unwrap();
        assert_eq!(r.equity.len(), 300);
        assert!(*r.equity.last().unwrap() > 1.0);
        assert!(r.metrics.cagr > 0.0);
    }
}
