use std::time::Duration;

use async_trait::async_trait;
use feed_rs::parser;
use tracing::debug;
use url::Url;

use storybuilder_types::{Result, StoryError};

const USER_AGENT: &str = concat!("storybuilder/", env!("CARGO_PKG_VERSION"));
const DEFAULT_TIMEOUT_SECS: u64 = 20;

// ---------------------------------------------------------------------------
// FeedSource
// ---------------------------------------------------------------------------

/// Yields the entry titles of a single feed, in feed order.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch_titles(&self, url: &str) -> Result<Vec<String>>;
}

/// Parses a feed document and returns its entry titles in document order.
/// Entries without a title are skipped.
pub fn parse_titles(url: &str, body: &[u8]) -> Result<Vec<String>> {
    let feed = parser::parse(body).map_err(|e| StoryError::FeedError {
        url: url.to_string(),
        message: format!("Failed to parse feed: {e}"),
    })?;

    let titles: Vec<String> = feed
        .entries
        .into_iter()
        .filter_map(|entry| entry.title.map(|t| t.content))
        .collect();

    debug!(url, entries = titles.len(), "Parsed feed");
    Ok(titles)
}

// ---------------------------------------------------------------------------
// HttpFeedSource
// ---------------------------------------------------------------------------

pub struct HttpFeedSource {
    client: reqwest::Client,
}

impl HttpFeedSource {
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| StoryError::ConfigError(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch_titles(&self, url: &str) -> Result<Vec<String>> {
        let feed_err = |message: String| StoryError::FeedError {
            url: url.to_string(),
            message,
        };

        let parsed = Url::parse(url).map_err(|e| feed_err(format!("invalid URL: {e}")))?;
        debug!(url, "Fetching feed");

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| feed_err(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(feed_err(format!("HTTP {status}")));
        }

        let body = response.bytes().await.map_err(|e| feed_err(e.to_string()))?;
        parse_titles(url, &body)
    }
}
