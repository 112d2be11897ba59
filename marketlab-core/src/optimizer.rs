//! Parameter optimizer: crossover grid search with an in-sample/out-of-sample split.
//!
//! Selection is two-stage: every valid pair is ranked by in-sample Sharpe, the
//! top `top_k` become finalists, and the finalist with the highest
//! out-of-sample Sharpe wins (first one on ties).

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::backtest::{backtest_sma_cross, required_bars};
use crate::domain::PriceSeries;
use crate::error::EvalError;
use crate::metrics::BacktestMetrics;

/// Shortest series the optimizer will split.
pub const MIN_OPTIMIZE_BARS: usize = 260;

/// Allowed split fractions (inclusive).
pub const SPLIT_RANGE: (f64, f64) = (0.5, 0.9);

/// Candidate grid and selection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub fast_values: Vec<usize>,
    pub slow_values: Vec<usize>,
    pub split: f64,
    pub top_k: usize,
}

impl Default for GridSpec {
    fn default() -> Self {
        Self {
            fast_values: vec![10, 20, 50],
            slow_values: vec![100, 150, 200, 250],
            split: 0.7,
            top_k: 5,
        }
    }
}

impl GridSpec {
    /// Candidate pairs in evaluation order: fast ascending, then slow ascending,
    /// duplicates removed, `fast >= slow` skipped.
    pub fn pairs(&self) -> Vec<(usize, usize)> {
        let fasts = sorted_unique(&self.fast_values);
        let slows = sorted_unique(&self.slow_values);
        let mut pairs = Vec::with_capacity(fasts.len() * slows.len());
        for &f in &fasts {
            for &s in &slows {
                if f < s {
                    pairs.push((f, s));
                }
            }
        }
        pairs
    }
}

fn sorted_unique(values: &[usize]) -> Vec<usize> {
    let mut v = values.to_vec();
    v.sort_unstable();
    v.dedup();
    v
}

/// In-sample and out-of-sample metrics for one parameter pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamScore {
    pub fast: usize,
    pub slow: usize,
    #[serde(rename = "IS")]
    pub in_sample: BacktestMetrics,
    #[serde(rename = "OS")]
    pub out_of_sample: BacktestMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub split: f64,
    pub bars_total: usize,
    pub bars_is: usize,
    pub bars_os: usize,
    pub best: ParamScore,
    /// Finalists in in-sample rank order (at most `top_k`).
    pub leaderboard: Vec<ParamScore>,
}

/// Index where the series is cut: `round(n * split)` clamped to `[1, n-1]`.
pub fn split_index(n: usize, split: f64) -> usize {
    let raw = (n as f64 * split).round() as usize;
    raw.clamp(1, n.saturating_sub(1).max(1))
}

/// Grid-search crossover windows on `series`.
pub fn optimize_sma_grid(
    series: &PriceSeries,
    grid: &GridSpec,
) -> Result<OptimizationResult, EvalError> {
    let n = series.len();
    if n < MIN_OPTIMIZE_BARS {
        return Err(EvalError::validation(format!(
            "Need at least {MIN_OPTIMIZE_BARS} bars for a meaningful split (have {n})"
        )));
    }
    if !(SPLIT_RANGE.0..=SPLIT_RANGE.1).contains(&grid.split) {
        return Err(EvalError::validation(format!(
            "split must be within [{}, {}] (got {})",
            SPLIT_RANGE.0, SPLIT_RANGE.1, grid.split
        )));
    }
    if grid.top_k == 0 {
        return Err(EvalError::validation("top_k must be at least 1"));
    }

    let idx = split_index(n, grid.split);
    let (is_series, os_series) = series.split_at(idx);

    // Ordered collect keeps encounter order, so ranking matches a sequential run.
    let rows: Vec<ParamScore> = grid
        .pairs()
        .par_iter()
        .filter_map(|&(fast, slow)| {
            let need = required_bars(fast, slow);
            if is_series.len() < need || os_series.len() < need {
                return None;
            }
            let is_res = backtest_sma_cross(&is_series, fast, slow).ok()?;
            let os_res = backtest_sma_cross(&os_series, fast, slow).ok()?;
            Some(ParamScore {
                fast,
                slow,
                in_sample: is_res.metrics,
                out_of_sample: os_res.metrics,
            })
        })
        .collect();

    if rows.is_empty() {
        return Err(EvalError::validation(
            "No valid parameter pairs (fast<slow) with enough data",
        ));
    }

    let leaderboard = select_finalists(rows, grid.top_k);
    let best = pick_best(&leaderboard)
        .cloned()
        .ok_or_else(|| EvalError::validation("empty finalist set"))?;

    Ok(OptimizationResult {
        split: grid.split,
        bars_total: n,
        bars_is: is_series.len(),
        bars_os: os_series.len(),
        best,
        leaderboard,
    })
}

/// Stage one: stable sort by in-sample Sharpe descending, keep the top `top_k`.
pub fn select_finalists(mut rows: Vec<ParamScore>, top_k: usize) -> Vec<ParamScore> {
    rows.sort_by(|a, b| b.in_sample.sharpe.total_cmp(&a.in_sample.sharpe));
    rows.truncate(top_k.max(1));
    rows
}

/// Stage two: first finalist with the maximum out-of-sample Sharpe.
pub fn pick_best(finalists: &[ParamScore]) -> Option<&ParamScore> {
    let mut best: Option<&ParamScore> = None;
    for row in finalists {
        match best {
            Some(b) if row.out_of_sample.sharpe <= b.out_of_sample.sharpe => {}
            _ => best = Some(row),
        }
    }
    best
}
