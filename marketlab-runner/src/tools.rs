//! Tool surface: the four operations a plan step can invoke.
//!
//! [`LocalTools`] runs them in-process against the engine; [`HttpTools`]
//! calls a remote tool service. Both report failures as a [`ToolError`]
//! carrying an HTTP-style status.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use marketlab_core::backtest::backtest_sma_cross;
use marketlab_core::data::{
    CachedPriceProvider, DataError, PriceProvider, RssNewsProvider, SyntheticProvider,
    YahooProvider,
};
use marketlab_core::fingerprint::DatasetHash;
use marketlab_core::optimizer::{optimize_sma_grid, GridSpec, OptimizationResult};
use marketlab_core::sentiment::VaderScorer;
use marketlab_core::{Analysis, BacktestMetrics, EvalError, ScreenOutcome, SignalEngine};

use crate::config::DataMode;
use crate::plan::Step;

pub const STRATEGY_SMA_CROSS: &str = "sma_cross";

/// Upper bound on points returned with `include_series`.
pub const MAX_SERIES_POINTS: usize = 300;

/// Request bounds enforced by the tool surface (wider than the validator's).
pub const SIGNAL_DAYS_BOUNDS: (u32, u32) = (60, 2000);
pub const SPLIT_BOUNDS: (f64, f64) = (0.5, 0.9);
pub const TOP_K_BOUNDS: (usize, usize) = (1, 20);

// ─── Errors ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{status} {message}")]
pub struct ToolError {
    pub status: u16,
    pub message: String,
}

impl ToolError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(422, message)
    }
}

impl From<EvalError> for ToolError {
    fn from(e: EvalError) -> Self {
        let status = match &e {
            EvalError::Validation(_) => 400,
            EvalError::Data(DataError::NoData { .. }) => 404,
            EvalError::Data(_) => 502,
        };
        ToolError::new(status, e.to_string())
    }
}

impl From<DataError> for ToolError {
    fn from(e: DataError) -> Self {
        EvalError::from(e).into()
    }
}

// ─── Outputs ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossParams {
    pub fast: usize,
    pub slow: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    pub symbol: String,
    pub strategy: String,
    pub params: CrossParams,
    pub metrics: BacktestMetrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_hash: Option<DatasetHash>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equity: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equity_index: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationReport {
    pub symbol: String,
    #[serde(flatten)]
    pub result: OptimizationResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_hash: Option<DatasetHash>,
}

/// Result of one executed step, serialized as the bare tool payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StepOutput {
    Screen(ScreenOutcome),
    Analysis(Analysis),
    Optimization(OptimizationReport),
    Backtest(BacktestReport),
}

// ─── Trait ──────────────────────────────────────────────────────────

pub trait Tools {
    fn screen(&self, symbols: &[String], days: u32) -> Result<ScreenOutcome, ToolError>;

    fn analyze(&self, symbol: &str, days: u32) -> Result<Analysis, ToolError>;

    fn backtest(&self, symbol: &str, fast: usize, slow: usize, days: u32) -> Result<BacktestReport, ToolError>;

    fn optimize_backtest(&self, symbol: &str, days: u32, grid: &GridSpec) -> Result<OptimizationReport, ToolError>;
}

/// Dispatch a validated step to the matching tool.
pub fn execute_step(tools: &dyn Tools, step: &Step) -> Result<StepOutput, ToolError> {
    match step {
        Step::Screen { symbols, days } => tools.screen(symbols, *days).map(StepOutput::Screen),
        Step::Analyze { symbol, days } => tools.analyze(symbol, *days).map(StepOutput::Analysis),
        Step::OptimizeBacktest {
            symbol,
            days,
            fast_values,
            slow_values,
            split,
            top_k,
        } => {
            let grid = GridSpec {
                fast_values: fast_values.clone(),
                slow_values: slow_values.clone(),
                split: *split,
                top_k: *top_k,
            };
            tools
                .optimize_backtest(symbol, *days, &grid)
                .map(StepOutput::Optimization)
        }
        Step::Backtest {
            symbol,
            fast,
            slow,
            days,
        } => tools
            .backtest(symbol, *fast, *slow, *days)
            .map(StepOutput::Backtest),
    }
}

// ─── In-process ─────────────────────────────────────────────────────

pub struct LocalTools {
    engine: SignalEngine,
    include_series: bool,
}

impl LocalTools {
    pub fn new(engine: SignalEngine) -> Self {
        Self {
            engine,
            include_series: false,
        }
    }

    /// Attach a downsampled equity curve to every backtest.
    pub fn with_series(mut self, include: bool) -> Self {
        self.include_series = include;
        self
    }

    pub fn engine(&self) -> &SignalEngine {
        &self.engine
    }
}

fn check_signal_days(days: u32) -> Result<(), ToolError> {
    if (SIGNAL_DAYS_BOUNDS.0..=SIGNAL_DAYS_BOUNDS.1).contains(&days) {
        Ok(())
    } else {
        Err(ToolError::unprocessable(format!(
            "days must be within [{}, {}] (got {days})",
            SIGNAL_DAYS_BOUNDS.0, SIGNAL_DAYS_BOUNDS.1
        )))
    }
}

impl Tools for LocalTools {
    fn screen(&self, symbols: &[String], days: u32) -> Result<ScreenOutcome, ToolError> {
        check_signal_days(days)?;
        Ok(self.engine.screen(symbols, days))
    }

    fn analyze(&self, symbol: &str, days: u32) -> Result<Analysis, ToolError> {
        check_signal_days(days)?;
        Ok(self.engine.analyze(symbol, days)?)
    }

    fn backtest(&self, symbol: &str, fast: usize, slow: usize, days: u32) -> Result<BacktestReport, ToolError> {
        if fast >= slow {
            return Err(ToolError::unprocessable(format!(
                "fast must be < slow (got fast={fast}, slow={slow})"
            )));
        }
        let symbol = symbol.trim().to_uppercase();
        let series = self.engine.prices().price_history(&symbol, days)?;
        let result = backtest_sma_cross(&series, fast, slow)?;

        let (equity, equity_index) = if self.include_series {
            let idx = downsample_indices(result.equity.len(), MAX_SERIES_POINTS);
            let points = series.points();
            (
                Some(idx.iter().map(|&i| result.equity[i]).collect()),
                Some(idx.iter().map(|&i| points[i].date.to_string()).collect()),
            )
        } else {
            (None, None)
        };

        Ok(BacktestReport {
            strategy: STRATEGY_SMA_CROSS.to_string(),
            params: CrossParams { fast, slow },
            metrics: result.metrics,
            dataset_hash: Some(DatasetHash::of(&series)),
            equity,
            equity_index,
            symbol,
        })
    }

    fn optimize_backtest(&self, symbol: &str, days: u32, grid: &GridSpec) -> Result<OptimizationReport, ToolError> {
        if !(SPLIT_BOUNDS.0..=SPLIT_BOUNDS.1).contains(&grid.split) {
            return Err(ToolError::unprocessable(format!(
                "split must be within [{}, {}] (got {})",
                SPLIT_BOUNDS.0, SPLIT_BOUNDS.1, grid.split
            )));
        }
        if !(TOP_K_BOUNDS.0..=TOP_K_BOUNDS.1).contains(&grid.top_k) {
            return Err(ToolError::unprocessable(format!(
                "top_k must be within [{}, {}] (got {})",
                TOP_K_BOUNDS.0, TOP_K_BOUNDS.1, grid.top_k
            )));
        }
        let symbol = symbol.trim().to_uppercase();
        let series = self.engine.prices().price_history(&symbol, days)?;
        let result = optimize_sma_grid(&series, grid)?;
        debug!(symbol = %symbol, best_fast = result.best.fast, best_slow = result.best.slow, "optimized");
        Ok(OptimizationReport {
            dataset_hash: Some(DatasetHash::of(&series)),
            symbol,
            result,
        })
    }
}

/// `max_points` evenly spaced indices over `0..n` (truncating linspace).
/// Returns every index when `n <= max_points`.
pub fn downsample_indices(n: usize, max_points: usize) -> Vec<usize> {
    if n <= max_points || max_points < 2 {
        return (0..n).collect();
    }
    let step = (n - 1) as f64 / (max_points - 1) as f64;
    (0..max_points)
        .map(|i| ((i as f64 * step) as usize).min(n - 1))
        .collect()
}

/// Signal engine wired for `mode`, with a per-engine price cache.
pub fn engine_for(mode: DataMode) -> Result<SignalEngine, DataError> {
    let engine = match mode {
        DataMode::Live => {
            let prices: Arc<dyn PriceProvider> = Arc::new(YahooProvider::new()?);
            SignalEngine::new(Arc::new(CachedPriceProvider::new(prices)))
                .with_news(Arc::new(RssNewsProvider::new()?))
                .with_scorer(Arc::new(VaderScorer::new()))
        }
        DataMode::Synthetic => {
            let prices: Arc<dyn PriceProvider> = Arc::new(SyntheticProvider::ending_today());
            SignalEngine::new(Arc::new(CachedPriceProvider::new(prices)))
        }
    };
    Ok(engine)
}

// ─── Remote ─────────────────────────────────────────────────────────

/// Per-request timeouts for [`HttpTools`], sized to each operation's weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub analyze: Duration,
    pub screen: Duration,
    pub backtest: Duration,
    pub optimize: Duration,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            analyze: Duration::from_secs(60),
            screen: Duration::from_secs(180),
            backtest: Duration::from_secs(180),
            optimize: Duration::from_secs(240),
        }
    }
}

/// Client for a remote tool service.
pub struct HttpTools {
    client: reqwest::blocking::Client,
    base_url: Url,
    timeouts: HttpTimeouts,
}

impl HttpTools {
    pub fn new(base_url: impl AsRef<str>) -> Result<Self, ToolError> {
        let raw = base_url.as_ref().trim();
        let base_url = Url::parse(raw.trim_end_matches('/'))
            .map_err(|e| ToolError::new(400, format!("invalid tool service url {raw:?}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ToolError::new(400, format!("invalid tool service url {raw:?}")));
        }
        let client = reqwest::blocking::Client::builder()
            .build()
            .map_err(|e| ToolError::new(500, e.to_string()))?;
        Ok(Self {
            client,
            base_url,
            timeouts: HttpTimeouts::default(),
        })
    }

    pub fn with_timeouts(mut self, timeouts: HttpTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn timeouts(&self) -> HttpTimeouts {
        self.timeouts
    }

    /// `base_url` with `segments` appended, each percent-encoded as one segment.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn send<T: DeserializeOwned>(&self, request: reqwest::blocking::RequestBuilder) -> Result<T, ToolError> {
        let resp = request.send().map_err(transport_error)?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().unwrap_or_default();
            return Err(ToolError::new(status.as_u16(), text));
        }
        resp.json::<T>()
            .map_err(|e| ToolError::new(502, format!("invalid response body: {e}")))
    }
}

fn transport_error(e: reqwest::Error) -> ToolError {
    if e.is_timeout() {
        ToolError::new(504, format!("timed out: {e}"))
    } else if e.is_connect() {
        ToolError::new(503, format!("service unreachable: {e}"))
    } else {
        ToolError::new(502, e.to_string())
    }
}

impl Tools for HttpTools {
    fn screen(&self, symbols: &[String], days: u32) -> Result<ScreenOutcome, ToolError> {
        self.send(
            self.client
                .post(self.endpoint(&["screen"]))
                .timeout(self.timeouts.screen)
                .json(&json!({"symbols": symbols, "days": days})),
        )
    }

    fn analyze(&self, symbol: &str, days: u32) -> Result<Analysis, ToolError> {
        self.send(
            self.client
                .get(self.endpoint(&["analyze", symbol]))
                .timeout(self.timeouts.analyze)
                .query(&[("days", days)]),
        )
    }

    fn backtest(&self, symbol: &str, fast: usize, slow: usize, days: u32) -> Result<BacktestReport, ToolError> {
        self.send(
            self.client
                .post(self.endpoint(&["backtest"]))
                .timeout(self.timeouts.backtest)
                .json(&json!({
                    "symbol": symbol,
                    "strategy": STRATEGY_SMA_CROSS,
                    "params": {"fast": fast, "slow": slow},
                    "days": days,
                })),
        )
    }

    fn optimize_backtest(&self, symbol: &str, days: u32, grid: &GridSpec) -> Result<OptimizationReport, ToolError> {
        self.send(
            self.client
                .post(self.endpoint(&["optimize_backtest"]))
                .timeout(self.timeouts.optimize)
                .json(&json!({
                    "symbol": symbol,
                    "days": days,
                    "fast_values": grid.fast_values,
                    "slow_values": grid.slow_values,
                    "split": grid.split,
                    "top_k": grid.top_k,
                })),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local() -> LocalTools {
        LocalTools::new(engine_for(DataMode::Synthetic).unwrap())
    }

    #[test]
    fn downsample_bounds() {
        assert_eq!(downsample_indices(5, 300), vec![0, 1, 2, 3, 4]);
        let idx = downsample_indices(1000, 300);
        assert_eq!(idx.len(), 300);
        assert_eq!(idx[0], 0);
        assert_eq!(*idx.last().unwrap(), 999);
        assert!(idx.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn error_status_mapping() {
        assert_eq!(ToolError::from(EvalError::validation("x")).status, 400);
        assert_eq!(ToolError::from(DataError::no_data("ZZZ")).status, 404);
        assert_eq!(ToolError::from(DataError::NetworkUnreachable("down".into())).status, 502);
    }

    #[test]
    fn request_bounds_are_422() {
        let tools = local();
        assert_eq!(tools.analyze("AAPL", 10).unwrap_err().status, 422);
        assert_eq!(tools.screen(&["AAPL".into()], 5000).unwrap_err().status, 422);
        assert_eq!(tools.backtest("AAPL", 50, 20, 1200).unwrap_err().status, 422);
        let grid = GridSpec {
            top_k: 25,
            ..GridSpec::default()
        };
        assert_eq!(tools.optimize_backtest("AAPL", 1200, &grid).unwrap_err().status, 422);
    }

    #[test]
    fn short_history_is_400() {
        let err = local().backtest("AAPL", 50, 200, 100).unwrap_err();
        assert_eq!(err.status, 400);
        assert!(err.message.contains("Not enough data"));
    }

    #[test]
    fn backtest_report_shape() {
        let report = local().with_series(true).backtest("aapl", 20, 100, 1200).unwrap();
        assert_eq!(report.symbol, "AAPL");
        assert_eq!(report.strategy, "sma_cross");
        assert_eq!(report.equity.as_ref().unwrap().len(), MAX_SERIES_POINTS);
        assert_eq!(report.equity_index.as_ref().unwrap().len(), MAX_SERIES_POINTS);
        let value = serde_json::to_value(&report).unwrap();
        assert!(value["metrics"]["Sharpe"].is_number());
        assert_eq!(value["params"]["slow"], 100);
    }

    #[test]
    fn optimize_report_flattens_result() {
        let report = local()
            .optimize_backtest("MSFT", 1200, &GridSpec::default())
            .unwrap();
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["symbol"], "MSFT");
        assert!(value["bars_is"].as_u64().unwrap() > 0);
        assert!(value["best"]["OS"]["Sharpe"].is_number());
        assert!(value["dataset_hash"].is_string());
    }

    #[test]
    fn execute_step_dispatches() {
        let tools = local();
        let out = execute_step(
            &tools,
            &Step::Analyze {
                symbol: "NVDA".into(),
                days: 365,
            },
        )
        .unwrap();
        assert!(matches!(out, StepOutput::Analysis(a) if a.symbol == "NVDA"));
    }
}
