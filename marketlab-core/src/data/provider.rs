//! Provider traits and structured error types.
//!
//! `PriceProvider` and `NewsProvider` abstract over data sources (Yahoo chart
//! API, RSS feeds, synthetic random walks) so the engine can swap
//! implementations and tests can run offline.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::PriceSeries;

/// Structured error types for data operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("No price data for {symbol}")]
    NoData { symbol: String },

    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("data error: {0}")]
    Other(String),
}

impl DataError {
    pub fn no_data(symbol: impl Into<String>) -> Self {
        DataError::NoData {
            symbol: symbol.into(),
        }
    }
}

/// Source of daily price history.
///
/// Implementations normalize whatever the upstream returns into a
/// [`PriceSeries`] once, at this boundary. A symbol without usable history
/// yields [`DataError::NoData`].
pub trait PriceProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Roughly the last `days` calendar days of daily prices for `symbol`.
    fn price_history(&self, symbol: &str, days: u32) -> Result<PriceSeries, DataError>;
}

/// One news item. Only the title feeds sentiment; link and date are kept for reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headline {
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub published: String,
}

impl Headline {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            link: String::new(),
            published: String::new(),
        }
    }
}

/// Source of recent headlines. An empty list is a valid answer.
pub trait NewsProvider: Send + Sync {
    fn name(&self) -> &str;

    /// At most `limit` headlines, newest first as delivered by the feed.
    fn headlines(&self, symbol: &str, limit: usize) -> Result<Vec<Headline>, DataError>;
}

/// News provider that never has anything to say.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoNews;

impl NewsProvider for NoNews {
    fn name(&self) -> &str {
        "none"
    }

    fn headlines(&self, _symbol: &str, _limit: usize) -> Result<Vec<Headline>, DataError> {
        Ok(Vec::new())
    }
}
