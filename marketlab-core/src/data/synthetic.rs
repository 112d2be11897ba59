//! Synthetic price provider for offline runs and tests.
//!
//! Prices are a geometric random walk seeded from the BLAKE3 hash of the
//! symbol, so the same symbol always produces the same path. Weekends are
//! skipped. These series are clearly fake and only meant for development.

use chrono::{Datelike, Duration, NaiveDate, Utc, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::provider::{DataError, PriceProvider};
use crate::domain::{PricePoint, PriceSeries};

const START_PRICE: f64 = 100.0;
const DAILY_DRIFT: f64 = 0.0003;

/// Deterministic random-walk provider.
#[derive(Debug, Clone)]
pub struct SyntheticProvider {
    end: NaiveDate,
}

impl SyntheticProvider {
    /// Series end on `end`; use a fixed date for reproducible output.
    pub fn new(end: NaiveDate) -> Self {
        Self { end }
    }

    pub fn ending_today() -> Self {
        Self::new(Utc::now().date_naive())
    }
}

impl PriceProvider for SyntheticProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn price_history(&self, symbol: &str, days: u32) -> Result<PriceSeries, DataError> {
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(DataError::no_data(symbol));
        }
        let start = self.end - Duration::days(i64::from(days));
        let dates = weekdays_between(start, self.end);
        if dates.is_empty() {
            return Err(DataError::no_data(symbol));
        }
        let prices = walk_prices(&symbol, dates.len());
        let points = dates
            .into_iter()
            .zip(prices)
            .map(|(d, p)| PricePoint::new(d, p))
            .collect();
        Ok(PriceSeries::from_points(symbol, points))
    }
}

/// `n` weekday bars of the random walk for `symbol`, starting 2015-01-01.
pub fn random_walk(symbol: &str, n: usize) -> PriceSeries {
    let mut dates = Vec::with_capacity(n);
    let mut current = NaiveDate::from_ymd_opt(2015, 1, 1).unwrap_or_default();
    while dates.len() < n {
        if is_weekday(current) {
            dates.push(current);
        }
        current += Duration::days(1);
    }
    let points = dates
        .into_iter()
        .zip(walk_prices(symbol, n))
        .map(|(d, p)| PricePoint::new(d, p))
        .collect();
    PriceSeries::from_points(symbol, points)
}

fn walk_prices(symbol: &str, n: usize) -> Vec<f64> {
    // Deterministic seed from symbol name
    let seed: [u8; 32] = *blake3::hash(symbol.as_bytes()).as_bytes();
    let mut rng = StdRng::from_seed(seed);

    let mut prices = Vec::with_capacity(n);
    let mut price = START_PRICE;
    for _ in 0..n {
        prices.push(price);
        let daily_return: f64 = DAILY_DRIFT + rng.gen_range(-0.03..0.03);
        price *= 1.0 + daily_return;
    }
    prices
}

fn is_weekday(d: NaiveDate) -> bool {
    !matches!(d.weekday(), Weekday::Sat | Weekday::Sun)
}

fn weekdays_between(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut out = Vec::new();
    let mut current = start + Duration::days(1);
    while current <= end {
        if is_weekday(current) {
            out.push(current);
        }
        current += Duration::days(1);
    }
    out
}
