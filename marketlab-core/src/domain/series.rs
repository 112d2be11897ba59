//! PriceSeries: the normalized price history every evaluation consumes.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single (date, price) observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub price: f64,
}

impl PricePoint {
    pub fn new(date: NaiveDate, price: f64) -> Self {
        Self { date, price }
    }

    /// A usable observation has a finite, strictly positive price.
    pub fn is_valid(&self) -> bool {
        self.price.is_finite() && self.price > 0.0
    }
}

/// Ordered daily price history for one symbol.
///
/// Invariants (enforced by every constructor):
/// - ascending by date, no duplicate dates (first occurrence wins)
/// - every price finite and > 0
///
/// Transforms (`slice`, `split_at`) return new series; nothing mutates in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    symbol: String,
    points: Vec<PricePoint>,
}

impl PriceSeries {
    /// Normalize raw observations: drop invalid prices, sort by date, dedupe dates.
    pub fn from_points(symbol: impl Into<String>, mut raw: Vec<PricePoint>) -> Self {
        raw.retain(PricePoint::is_valid);
        // stable sort keeps the provider's first occurrence ahead of later duplicates
        raw.sort_by_key(|p| p.date);
        raw.dedup_by_key(|p| p.date);
        Self {
            symbol: symbol.into(),
            points: raw,
        }
    }

    /// Build a series from bare prices, assigning consecutive calendar dates from `start`.
    pub fn from_prices(symbol: impl Into<String>, start: NaiveDate, prices: &[f64]) -> Self {
        let points = prices
            .iter()
            .enumerate()
            .map(|(i, &price)| PricePoint::new(start + chrono::Duration::days(i as i64), price))
            .collect();
        Self::from_points(symbol, points)
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn prices(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.price).collect()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.points.iter().map(|p| p.date).collect()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }

    /// Sub-series over `[start, end)` bar indices (clamped to the series bounds).
    pub fn slice(&self, start: usize, end: usize) -> Self {
        let end = end.min(self.points.len());
        let start = start.min(end);
        Self {
            symbol: self.symbol.clone(),
            points: self.points[start..end].to_vec(),
        }
    }

    /// Chronological split: `[0, idx)` and `[idx, len)`.
    pub fn split_at(&self, idx: usize) -> (Self, Self) {
        (self.slice(0, idx), self.slice(idx, self.points.len()))
    }
}
