//! Signal engine: per-symbol scores blended into a confidence and a recommendation.
//!
//! Four sub-scores, each in [0, 1]:
//! - momentum: `(tanh(3 · pct_change) + 1) / 2` over an adaptive lookback
//! - rsi: 0.2 when overbought (≥70), 0.8 when oversold (≤30), else 0.5
//! - trend: 1.0 when SMA(50) > SMA(200) on the last bar both exist, else 0.0
//! - sentiment: mean headline compound polarity rescaled from [-1, 1]
//!
//! Missing history never fails an analysis; it only pulls the affected
//! sub-score to its neutral fallback.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, warn};

use crate::data::{NewsProvider, PriceProvider, DEFAULT_HEADLINE_LIMIT};
use crate::error::EvalError;
use crate::indicators::{last_valid, Indicator, Momentum, Rsi, Sma};
use crate::sentiment::{average_compound, SentimentScorer};

pub const TREND_FAST: usize = 50;
pub const TREND_SLOW: usize = 200;
pub const RSI_PERIOD: usize = 14;

/// Blend weights; they sum to 1 so `overall` stays in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalWeights {
    pub momentum: f64,
    pub rsi: f64,
    pub trend: f64,
    pub sentiment: f64,
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            momentum: 0.45,
            rsi: 0.20,
            trend: 0.15,
            sentiment: 0.20,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Recommendation {
    Buy,
    Hold,
    Sell,
}

impl Recommendation {
    /// `> 0.60` → BUY, `> 0.40` → HOLD, otherwise SELL.
    pub fn from_overall(overall: f64) -> Self {
        if overall > 0.60 {
            Recommendation::Buy
        } else if overall > 0.40 {
            Recommendation::Hold
        } else {
            Recommendation::Sell
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::Buy => "BUY",
            Recommendation::Hold => "HOLD",
            Recommendation::Sell => "SELL",
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The signal bundle: four sub-scores and their blend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalScores {
    pub momentum: f64,
    pub rsi: f64,
    pub trend: f64,
    pub sentiment: f64,
    pub overall: f64,
}

/// Full single-symbol analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub symbol: String,
    pub signals: SignalScores,
    pub sentiment_compound: f64,
    pub recommendation: Recommendation,
    pub confidence: f64,
    pub rationale: String,
}

/// One row of a screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenItem {
    pub symbol: String,
    pub recommendation: Recommendation,
    pub confidence: f64,
    pub signals: SignalScores,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenError {
    pub symbol: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScreenOutcome {
    pub results: Vec<ScreenItem>,
    /// Remote services send `null` (or omit the field) when nothing failed.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub errors: Vec<ScreenError>,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

// ─── Pure scoring ───────────────────────────────────────────────────

pub fn momentum_score(pct_change: Option<f64>) -> f64 {
    let m = pct_change.unwrap_or(0.0);
    ((3.0 * m).tanh() + 1.0) / 2.0
}

pub fn rsi_score(rsi: Option<f64>) -> f64 {
    match rsi {
        None => 0.5,
        Some(v) if v >= 70.0 => 0.2,
        Some(v) if v <= 30.0 => 0.8,
        Some(_) => 0.5,
    }
}

/// 1.0 when the fast average is above the slow one on the last bar where both exist.
pub fn trend_score(prices: &[f64]) -> f64 {
    let fast = Sma::new(TREND_FAST).compute(prices);
    let slow = Sma::new(TREND_SLOW).compute(prices);
    let last_joint = fast
        .iter()
        .zip(&slow)
        .rev()
        .find(|(f, s)| !f.is_nan() && !s.is_nan());
    match last_joint {
        Some((f, s)) if f > s => 1.0,
        _ => 0.0,
    }
}

pub fn sentiment_score(compound: f64) -> f64 {
    (compound.clamp(-1.0, 1.0) + 1.0) / 2.0
}

/// Score a price history. Pure and deterministic.
pub fn score_prices(prices: &[f64], sentiment_compound: f64, weights: &SignalWeights) -> SignalScores {
    let mom = Momentum::adaptive(prices.len()).compute(prices);
    let rsi = Rsi::new(RSI_PERIOD).compute(prices);

    let momentum = momentum_score(last_valid(&mom));
    let rsi = rsi_score(last_valid(&rsi));
    let trend = trend_score(prices);
    let sentiment = sentiment_score(sentiment_compound);
    let overall = weights.momentum * momentum
        + weights.rsi * rsi
        + weights.trend * trend
        + weights.sentiment * sentiment;

    SignalScores {
        momentum,
        rsi,
        trend,
        sentiment,
        overall,
    }
}

pub fn rationale(scores: &SignalScores, rec: Recommendation) -> String {
    format!(
        "Momentum={:.2}, RSI flag={:.2}, Trend={:.2}, News sentiment={:.2} => {} (conf {:.2})",
        scores.momentum, scores.rsi, scores.trend, scores.sentiment, rec, scores.overall
    )
}

// ─── Engine ─────────────────────────────────────────────────────────

/// Fetches data through the configured providers and scores symbols.
pub struct SignalEngine {
    prices: Arc<dyn PriceProvider>,
    news: Option<Arc<dyn NewsProvider>>,
    scorer: Option<Arc<dyn SentimentScorer>>,
    weights: SignalWeights,
    headline_limit: usize,
}

impl SignalEngine {
    pub fn new(prices: Arc<dyn PriceProvider>) -> Self {
        Self {
            prices,
            news: None,
            scorer: None,
            weights: SignalWeights::default(),
            headline_limit: DEFAULT_HEADLINE_LIMIT,
        }
    }

    pub fn with_news(mut self, news: Arc<dyn NewsProvider>) -> Self {
        self.news = Some(news);
        self
    }

    pub fn with_scorer(mut self, scorer: Arc<dyn SentimentScorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    pub fn prices(&self) -> &Arc<dyn PriceProvider> {
        &self.prices
    }

    /// Mean headline polarity; 0.0 without a news source, a scorer, or headlines.
    fn news_sentiment(&self, symbol: &str) -> f64 {
        let (Some(news), Some(scorer)) = (&self.news, &self.scorer) else {
            return 0.0;
        };
        let titles: Vec<String> = match news.headlines(symbol, self.headline_limit) {
            Ok(items) => items.into_iter().map(|h| h.title).collect(),
            Err(e) => {
                warn!(symbol, error = %e, "headline fetch failed, sentiment neutral");
                return 0.0;
            }
        };
        average_compound(scorer.as_ref(), &titles)
    }

    pub fn analyze(&self, symbol: &str, days: u32) -> Result<Analysis, EvalError> {
        let symbol = symbol.trim().to_uppercase();
        let series = self.prices.price_history(&symbol, days)?;
        let compound = self.news_sentiment(&symbol);
        let signals = score_prices(&series.prices(), compound, &self.weights);
        let recommendation = Recommendation::from_overall(signals.overall);
        debug!(symbol = %symbol, overall = signals.overall, %recommendation, "analyzed");

        Ok(Analysis {
            rationale: rationale(&signals, recommendation),
            symbol,
            confidence: signals.overall,
            sentiment_compound: compound,
            recommendation,
            signals,
        })
    }

    /// Analyze every symbol; per-symbol failures are collected, never fatal.
    /// Results are sorted by confidence, highest first (stable).
    pub fn screen(&self, symbols: &[String], days: u32) -> ScreenOutcome {
        let mut outcome = ScreenOutcome::default();
        for symbol in symbols {
            match self.analyze(symbol, days) {
                Ok(a) => outcome.results.push(ScreenItem {
                    symbol: a.symbol,
                    recommendation: a.recommendation,
                    confidence: if a.confidence.is_nan() { 0.5 } else { a.confidence },
                    signals: a.signals,
                }),
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "screen: symbol failed");
                    outcome.errors.push(ScreenError {
                        symbol: symbol.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
        outcome
            .results
            .sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        outcome
    }
}
