//! Data providers and caching

pub mod cache;
pub mod news;
pub mod provider;
pub mod synthetic;
pub mod yahoo;

pub use cache::{CachedPriceProvider, PriceCache};
pub use news::{RssNewsProvider, DEFAULT_HEADLINE_LIMIT};
pub use provider::{DataError, Headline, NewsProvider, NoNews, PriceProvider};
pub use synthetic::SyntheticProvider;
pub use yahoo::YahooProvider;
