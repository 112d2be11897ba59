//! RSS headline provider.
//!
//! Tries the Yahoo Finance headline feed for the symbol first; when that
//! yields nothing, falls back to a Google News search for "<SYMBOL> stock".

use std::io::Cursor;
use std::time::Duration;

use rss::Channel;
use tracing::{debug, warn};

use super::provider::{DataError, Headline, NewsProvider};

/// Default number of headlines considered per symbol.
pub const DEFAULT_HEADLINE_LIMIT: usize = 20;

pub struct RssNewsProvider {
    client: reqwest::blocking::Client,
}

impl RssNewsProvider {
    pub fn new() -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(20))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    fn yahoo_url(symbol: &str) -> String {
        format!("https://feeds.finance.yahoo.com/rss/2.0/headline?s={symbol}&region=US&lang=en-US")
    }

    fn google_url(symbol: &str) -> Result<String, DataError> {
        let url = reqwest::Url::parse_with_params(
            "https://news.google.com/rss/search",
            &[
                ("q", format!("{symbol} stock").as_str()),
                ("hl", "en-US"),
                ("gl", "US"),
                ("ceid", "US:en"),
            ],
        )
        .map_err(|e| DataError::Other(format!("bad news url: {e}")))?;
        Ok(url.to_string())
    }

    fn fetch_feed(&self, url: &str) -> Result<Vec<Headline>, DataError> {
        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|e| DataError::NetworkUnreachable(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(DataError::Other(format!("HTTP {} for {url}", resp.status())));
        }
        let bytes = resp
            .bytes()
            .map_err(|e| DataError::NetworkUnreachable(e.to_string()))?;
        parse_feed(&bytes)
    }
}

/// Parse an RSS document into headlines, skipping items without a title.
pub fn parse_feed(bytes: &[u8]) -> Result<Vec<Headline>, DataError> {
    let channel = Channel::read_from(Cursor::new(bytes))
        .map_err(|e| DataError::ResponseFormatChanged(format!("invalid RSS: {e}")))?;
    Ok(channel
        .items()
        .iter()
        .filter_map(|item| {
            let title = item.title()?.trim();
            if title.is_empty() {
                return None;
            }
            Some(Headline {
                title: title.to_string(),
                link: item.link().unwrap_or_default().to_string(),
                published: item.pub_date().unwrap_or_default().to_string(),
            })
        })
        .collect())
}

impl NewsProvider for RssNewsProvider {
    fn name(&self) -> &str {
        "rss"
    }

    fn headlines(&self, symbol: &str, limit: usize) -> Result<Vec<Headline>, DataError> {
        let symbol = symbol.trim().to_uppercase();
        let mut items = match self.fetch_feed(&Self::yahoo_url(&symbol)) {
            Ok(items) => items,
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "yahoo headline feed failed");
                Vec::new()
            }
        };
        if items.is_empty() {
            debug!(symbol = %symbol, "falling back to google news");
            items = self.fetch_feed(&Self::google_url(&symbol)?)?;
        }
        items.truncate(limit);
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>t</title><link>http://x</link><description>d</description>
<item><title>Apple beats estimates</title><link>http://a</link><pubDate>Mon, 01 Jan 2024 00:00:00 GMT</pubDate></item>
<item><title>  </title></item>
<item><title>Apple shares slip</title></item>
</channel></rss>"#;

    #[test]
    fn parses_titles_and_skips_blank() {
        let items = parse_feed(FEED.as_bytes()).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "Apple beats estimates");
        assert_eq!(items[0].link, "http://a");
        assert_eq!(items[1].published, "");
    }

    #[test]
    fn garbage_is_format_error() {
        assert!(matches!(
            parse_feed(b"not xml at all"),
            Err(DataError::ResponseFormatChanged(_))
        ));
    }

    #[test]
    fn google_url_encodes_query() {
        let url = RssNewsProvider::google_url("MSFT").unwrap();
        assert!(url.contains("q=MSFT+stock"));
    }
}
