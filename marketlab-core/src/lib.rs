//! MarketLab Core: evaluation engine for the market research agent.
//!
//! This crate contains everything that turns price history into numbers:
//! - `PriceSeries`, the normalized input every evaluation consumes
//! - Indicators (SMA, exponentially smoothed RSI, momentum) and metrics
//! - The signal engine (scores, blend, BUY/HOLD/SELL)
//! - The SMA crossover backtester and the IS/OS grid optimizer
//! - Data provider traits with Yahoo, RSS, synthetic and cached adapters
//! - Headline sentiment scoring and dataset fingerprints

pub mod backtest;
pub mod data;
pub mod domain;
pub mod error;
pub mod fingerprint;
pub mod indicators;
pub mod metrics;
pub mod optimizer;
pub mod sentiment;
pub mod signals;

pub use backtest::{backtest_sma_cross, BacktestResult};
pub use domain::{PricePoint, PriceSeries};
pub use error::EvalError;
pub use metrics::BacktestMetrics;
pub use optimizer::{optimize_sma_grid, GridSpec, OptimizationResult, ParamScore};
pub use signals::{Analysis, Recommendation, ScreenOutcome, SignalEngine, SignalScores};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: engine types can cross thread boundaries.
    ///
    /// The runner may evaluate from worker threads and the optimizer already
    /// fans out with rayon; a type that loses Send/Sync breaks the build here.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<PriceSeries>();
        require_sync::<PriceSeries>();
        require_send::<BacktestResult>();
        require_sync::<BacktestResult>();
        require_send::<OptimizationResult>();
        require_sync::<OptimizationResult>();
        require_send::<Analysis>();
        require_sync::<Analysis>();
        require_send::<SignalEngine>();
        require_sync::<SignalEngine>();
        require_send::<EvalError>();
        require_sync::<EvalError>();
        require_send::<data::CachedPriceProvider>();
        require_sync::<data::CachedPriceProvider>();
        require_send::<sentiment::VaderScorer>();
        require_sync::<sentiment::VaderScorer>();
    }

    /// Architecture contract: indicators see prices only, never a clock or a provider.
    #[test]
    fn indicator_trait_is_price_only() {
        fn _check_trait_object_builds(ind: &dyn indicators::Indicator, prices: &[f64]) -> Vec<f64> {
            ind.compute(prices)
        }
    }
}
