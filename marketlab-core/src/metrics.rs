//! Performance metrics: pure functions that compute strategy statistics.
//!
//! Every metric is a pure function: equity curve or return series in, scalar out.
//! Non-finite inputs are filtered before any arithmetic so a single bad
//! observation cannot turn a metric into NaN.

use serde::{Deserialize, Serialize};

/// Trading periods per year used for annualization.
pub const PERIODS_PER_YEAR: f64 = 252.0;

/// Added to the return volatility before dividing, keeping Sharpe finite.
pub const SHARPE_EPSILON: f64 = 1e-12;

/// Aggregate metrics for one backtest. Field names match the report keys.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BacktestMetrics {
    #[serde(rename = "CAGR")]
    pub cagr: f64,
    #[serde(rename = "Sharpe")]
    pub sharpe: f64,
    #[serde(rename = "MaxDrawdown")]
    pub max_drawdown: f64,
    #[serde(rename = "WinRate")]
    pub win_rate: f64,
}

impl BacktestMetrics {
    /// Compute all metrics from an equity curve and its per-period returns.
    pub fn compute(equity: &[f64], returns: &[f64]) -> Self {
        Self {
            cagr: cagr(equity),
            sharpe: sharpe_ratio(returns),
            max_drawdown: max_drawdown(equity),
            win_rate: win_rate(returns),
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

fn finite(values: &[f64]) -> Vec<f64> {
    values.iter().copied().filter(|v| v.is_finite()).collect()
}

/// Compound Annual Growth Rate.
///
/// Horizon in years is `len / 252`. Returns 0.0 for an empty curve, a
/// non-positive starting value, or a non-positive total growth factor.
pub fn cagr(equity: &[f64]) -> f64 {
    let eq = finite(equity);
    let (Some(&start), Some(&end)) = (eq.first(), eq.last()) else {
        return 0.0;
    };
    if start <= 0.0 {
        return 0.0;
    }
    let years = eq.len() as f64 / PERIODS_PER_YEAR;
    if years <= 0.0 {
        return 0.0;
    }
    let growth = end / start;
    if growth <= 0.0 {
        return 0.0;
    }
    growth.powf(1.0 / years) - 1.0
}

/// Annualized Sharpe ratio of per-period returns at a 0% risk-free rate.
///
/// Sharpe = sqrt(252) * mean / (population std + 1e-12).
/// Returns 0.0 if the series is empty or has zero variance.
pub fn sharpe_ratio(returns: &[f64]) -> f64 {
    let r = finite(returns);
    if r.is_empty() {
        return 0.0;
    }
    let mean = mean_f64(&r);
    let std = std_dev(&r);
    if std == 0.0 {
        return 0.0;
    }
    PERIODS_PER_YEAR.sqrt() * mean / (std + SHARPE_EPSILON)
}

/// Maximum drawdown as a positive fraction in [0, 1] (0.15 = 15% decline from peak).
pub fn max_drawdown(equity: &[f64]) -> f64 {
    let eq = finite(equity);
    let Some(&first) = eq.first() else {
        return 0.0;
    };
    let mut peak = first;
    let mut max_dd = 0.0_f64;
    for &e in &eq {
        if e > peak {
            peak = e;
        }
        if peak > 0.0 {
            max_dd = max_dd.max((peak - e) / peak);
        }
    }
    max_dd.clamp(0.0, 1.0)
}

/// Fraction of periods with a strictly positive return.
pub fn win_rate(returns: &[f64]) -> f64 {
    let r = finite(returns);
    if r.is_empty() {
        return 0.0;
    }
    r.iter().filter(|&&x| x > 0.0).count() as f64 / r.len() as f64
}

// ─── Helpers ────────────────────────────────────────────────────────

fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (divides by n).
fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean_f64(values);
    let var = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}
