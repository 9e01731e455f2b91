use std::sync::Arc;

use tracing::{info, warn};

use storybuilder_types::Headline;

use crate::FeedSource;

/// General-news feeds read when a personality names none.
pub const DEFAULT_FEEDS: [&str; 3] = [
    "http://feeds.bbci.co.uk/news/rss.xml",
    "https://rss.nytimes.com/services/xml/rss/nyt/HomePage.xml",
    "https://www.theguardian.com/world/rss",
];

pub const DEFAULT_PER_FEED_CAP: usize = 2;

pub struct FeedAggregator {
    source: Arc<dyn FeedSource>,
    per_feed_cap: usize,
}

impl FeedAggregator {
    pub fn new(source: Arc<dyn FeedSource>) -> Self {
        Self {
            source,
            per_feed_cap: DEFAULT_PER_FEED_CAP,
        }
    }

    pub fn with_per_feed_cap(mut self, cap: usize) -> Self {
        self.per_feed_cap = cap;
        self
    }

    /// Collects headlines from `urls` (or [`DEFAULT_FEEDS`] when empty) in
    /// feed-list order, then feed-internal order. A failing feed is skipped.
    pub async fn collect(&self, urls: &[String]) -> Vec<Headline> {
        let urls: Vec<String> = if urls.is_empty() {
            DEFAULT_FEEDS.iter().map(|u| u.to_string()).collect()
        } else {
            urls.to_vec()
        };

        info!(sources = urls.len(), "Fetching headlines");

        let mut headlines = Vec::new();
        for url in &urls {
            match self.source.fetch_titles(url).await {
                Ok(titles) => {
                    let before = headlines.len();
                    headlines.extend(
                        titles
                            .iter()
                            .take(self.per_feed_cap)
                            .map(Headline::new)
                            .filter(|h| !h.is_empty()),
                    );
                    info!(url = %url, taken = headlines.len() - before, "Feed read");
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "Skipping feed");
                }
            }
        }

        headlines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use storybuilder_types::{Result, StoryError};

    struct MockFeeds {
        feeds: HashMap<String, Vec<String>>,
        calls: Mutex<Vec<String>>,
    }

    impl MockFeeds {
        fn new(feeds: &[(&str, &[&str])]) -> Self {
            Self {
                feeds: feeds
                    .iter()
                    .map(|(u, t)| (u.to_string(), t.iter().map(|s| s.to_string()).collect()))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl FeedSource for MockFeeds {
        async fn fetch_titles(&self, url: &str) -> Result<Vec<String>> {
            self.calls.lock().unwrap().push(url.to_string());
            self.feeds.get(url).cloned().ok_or_else(|| StoryError::FeedError {
                url: url.to_string(),
                message: "bozo".into(),
            })
        }
    }

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn caps_each_feed_and_keeps_order() {
        let source = Arc::new(MockFeeds::new(&[
            ("a", &["A1", "A2", "A3"]),
            ("b", &["B1", "B2", "B3"]),
        ]));
        let agg = FeedAggregator::new(source);
        let got = agg.collect(&strings(&["a", "b"])).await;
        let got: Vec<&str> = got.iter().map(|h| h.as_str()).collect();
        assert_eq!(got, vec!["A1", "A2", "B1", "B2"]);
    }

    #[tokio::test]
    async fn failing_feed_is_skipped() {
        let source = Arc::new(MockFeeds::new(&[("good", &["G1"])]));
        let agg = FeedAggregator::new(source);
        let got = agg.collect(&strings(&["broken", "good"])).await;
        assert_eq!(got, vec![Headline::new("G1")]);
    }

    #[tokio::test]
    async fn empty_list_falls_back_to_defaults() {
        let source = Arc::new(MockFeeds::new(&[]));
        let agg = FeedAggregator::new(source.clone());
        let got = agg.collect(&[]).await;
        assert!(got.is_empty());
        assert_eq!(*source.calls.lock().unwrap(), strings(&DEFAULT_FEEDS));
    }

    #[tokio::test]
    async fn titles_are_normalized_and_blank_dropped() {
        let source = Arc::new(MockFeeds::new(&[("a", &["  Storm\n hits  coast ", "   "])]));
        let agg = FeedAggregator::new(source);
        let got = agg.collect(&strings(&["a"])).await;
        assert_eq!(got, vec![Headline::new("Storm hits coast")]);
    }

    #[tokio::test]
    async fn custom_cap() {
        let source = Arc::new(MockFeeds::new(&[("a", &["1", "2", "3", "4"])]));
        let agg = FeedAggregator::new(source).with_per_feed_cap(3);
        assert_eq!(agg.collect(&strings(&["a"])).await.len(), 3);
    }
}
