//! In-process price cache.
//!
//! Keyed by (upper-cased symbol, days) for the lifetime of the owning object.
//! Reads hand out clones, so callers are free to transform what they get
//! without touching the cached copy.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::debug;

use super::provider::{DataError, PriceProvider};
use crate::domain::PriceSeries;

type CacheKey = (String, u32);

/// Explicit cache object; there is no process-wide price state.
#[derive(Debug, Default)]
pub struct PriceCache {
    entries: Mutex<HashMap<CacheKey, PriceSeries>>,
}

impl PriceCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(symbol: &str, days: u32) -> CacheKey {
        (symbol.trim().to_uppercase(), days)
    }

    /// Clone of the cached series, if present.
    pub fn get(&self, symbol: &str, days: u32) -> Option<PriceSeries> {
        let entries = self.entries.lock().ok()?;
        entries.get(&Self::key(symbol, days)).cloned()
    }

    pub fn insert(&self, symbol: &str, days: u32, series: PriceSeries) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(Self::key(symbol, days), series);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}

/// Wraps a provider with a [`PriceCache`]. Failures are not cached.
pub struct CachedPriceProvider {
    inner: Arc<dyn PriceProvider>,
    cache: PriceCache,
}

impl CachedPriceProvider {
    pub fn new(inner: Arc<dyn PriceProvider>) -> Self {
        Self {
            inner,
            cache: PriceCache::new(),
        }
    }

    pub fn cache(&self) -> &PriceCache {
        &self.cache
    }
}

impl PriceProvider for CachedPriceProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn price_history(&self, symbol: &str, days: u32) -> Result<PriceSeries, DataError> {
        if let Some(hit) = self.cache.get(symbol, days) {
            debug!(symbol, days, "price cache hit");
            return Ok(hit);
        }
        let series = self.inner.price_history(symbol, days)?;
        self.cache.insert(symbol, days, series.clone());
        Ok(series)
    }
}
