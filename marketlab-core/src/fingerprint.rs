//! Dataset fingerprints: deterministic identification of the data an evaluation saw.
//!
//! A backtest or optimization result is only reproducible together with the
//! exact series it ran on. BLAKE3 over the canonical byte form of the series
//! gives a stable, collision-resistant identifier across builds and platforms.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::PriceSeries;

/// BLAKE3 hex digest of a price series.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetHash(pub String);

impl DatasetHash {
    pub fn of(series: &PriceSeries) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(series.symbol().as_bytes());
        for p in series.points() {
            hasher.update(p.date.to_string().as_bytes());
            hasher.update(&p.price.to_le_bytes());
        }
        Self(hasher.finalize().to_hex().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DatasetHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// BLAKE3 hex digest of arbitrary bytes (run ids, canonical plan keys).
pub fn hash_hex(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}
