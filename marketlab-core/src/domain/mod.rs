//! Domain types for MarketLab

pub mod series;

pub use series::{PricePoint, PriceSeries};
