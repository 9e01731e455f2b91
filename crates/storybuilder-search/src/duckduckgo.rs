//! DuckDuckGo HTML results client.
//!
//! Queries the no-JavaScript results page and extracts ranked organic hits.
//! Sponsored blocks are skipped and `/l/?uddg=` redirect links are unwrapped
//! to the target URL.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};
use url::Url;

use crate::{SearchHit, SearchProvider};
use storybuilder_types::{Result, StoryError};

pub const DEFAULT_BASE_URL: &str = "https://html.duckduckgo.com";
const USER_AGENT: &str = "Mozilla/5.0 (compatible; storybuilder research)";

struct ResultSelectors {
    block: Selector,
    link: Selector,
    snippet: Selector,
}

impl ResultSelectors {
    fn new() -> Result<Self> {
        let parse = |css: &str| {
            Selector::parse(css)
                .map_err(|e| StoryError::Other(format!("invalid selector '{css}': {e:?}")))
        };
        Ok(Self {
            block: parse("div.result")?,
            link: parse("a.result__a")?,
            snippet: parse(".result__snippet")?,
        })
    }
}

pub struct DuckDuckGoClient {
    client: Client,
    base_url: String,
    selectors: ResultSelectors,
}

impl DuckDuckGoClient {
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(20))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| StoryError::ConfigError(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            selectors: ResultSelectors::new()?,
        })
    }

    fn build_url(&self, query: &str) -> Result<Url> {
        Url::parse_with_params(&format!("{}/html/", self.base_url), &[("q", query)])
            .map_err(|e| StoryError::ConfigError(format!("invalid search base URL: {e}")))
    }

    /// Extracts organic hits from a results page.
    fn parse_results(&self, html: &str, max_results: usize) -> Vec<SearchHit> {
        let document = Html::parse_document(html);
        let mut hits = Vec::new();

        for block in document.select(&self.selectors.block) {
            if hits.len() >= max_results {
                break;
            }
            if block.value().classes().any(|c| c == "result--ad") {
                continue;
            }

            let Some(link) = block.select(&self.selectors.link).next() else {
                continue;
            };
            let Some(url) = link.value().attr("href").and_then(resolve_link) else {
                continue;
            };

            let title = element_text(link);
            if title.is_empty() {
                continue;
            }
            let snippet = block
                .select(&self.selectors.snippet)
                .next()
                .map(element_text)
                .unwrap_or_default();

            hits.push(SearchHit {
                title,
                url,
                snippet,
            });
        }

        hits
    }
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Turns a result href into the target URL, unwrapping DuckDuckGo redirects.
fn resolve_link(href: &str) -> Option<String> {
    let base = Url::parse("https://duckduckgo.com/").ok()?;
    let url = base.join(href).ok()?;

    if url.path().starts_with("/l/") {
        return url
            .query_pairs()
            .find(|(k, _)| k == "uddg")
            .map(|(_, v)| v.into_owned())
            .filter(|v| !v.is_empty());
    }

    match url.scheme() {
        "http" | "https" => Some(url.to_string()),
        _ => None,
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoClient {
    #[instrument(skip(self), fields(provider = "duckduckgo"))]
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(StoryError::SearchError {
                query: String::new(),
                message: "Search query cannot be empty".to_string(),
            });
        }

        let search_err = |message: String| StoryError::SearchError {
            query: query.to_string(),
            message,
        };

        let url = self.build_url(query)?;
        debug!(url = %url, "Sending DuckDuckGo request");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| search_err(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(search_err(format!("HTTP {status}")));
        }

        let body = response.text().await.map_err(|e| search_err(e.to_string()))?;
        let hits = self.parse_results(&body, max_results);
        debug!(results = hits.len(), "DuckDuckGo search completed");
        Ok(hits)
    }

    fn provider_name(&self) -> &'static str {
        "duckduckgo"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
<html><body>
<div class="result results_links result--ad">
  <h2 class="result__title"><a class="result__a" href="https://ads.example/buy">Buy now</a></h2>
  <a class="result__snippet">Sponsored</a>
</div>
<div class="result results_links web-result">
  <h2 class="result__title">
    <a rel="nofollow" class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.city.gov%2Fparks%3Fid%3D1&amp;rut=abc">City <b>Parks</b> Department</a>
  </h2>
  <a class="result__snippet" href="x">The city   opened a new park on Monday.</a>
</div>
<div class="result results_links web-result">
  <h2 class="result__title"><a class="result__a" href="https://news.example/park-budget">Park budget</a></h2>
  <a class="result__snippet">Funding details.</a>
</div>
<div class="result results_links web-result">
  <h2 class="result__title"><a class="result__a" href="https://third.example/">Third</a></h2>
</div>
</body></html>"#;

    #[test]
    fn parses_organic_results_and_skips_ads() {
        let client = DuckDuckGoClient::new().unwrap();
        let hits = client.parse_results(PAGE, 10);
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].title, "City Parks Department");
        assert_eq!(hits[0].url, "https://www.city.gov/parks?id=1");
        assert_eq!(hits[0].snippet, "The city opened a new park on Monday.");
        assert_eq!(hits[1].url, "https://news.example/park-budget");
        assert_eq!(hits[2].snippet, "");
    }

    #[test]
    fn respects_max_results() {
        let client = DuckDuckGoClient::new().unwrap();
        let hits = client.parse_results(PAGE, 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[1].title, "Park budget");
    }

    #[test]
    fn empty_page_yields_no_hits() {
        let client = DuckDuckGoClient::new().unwrap();
        assert!(client.parse_results("<html></html>", 2).is_empty());
    }

    #[test]
    fn resolve_link_variants() {
        assert_eq!(
            resolve_link("/l/?uddg=https%3A%2F%2Fa.example%2F").as_deref(),
            Some("https://a.example/")
        );
        assert_eq!(
            resolve_link("https://b.example/x").as_deref(),
            Some("https://b.example/x")
        );
        assert_eq!(resolve_link("javascript:void(0)"), None);
        assert_eq!(resolve_link("/l/?rut=only"), None);
    }

    #[test]
    fn build_url_encodes_query() {
        let client = DuckDuckGoClient::with_base_url("http://localhost:1234/").unwrap();
        let url = client.build_url("park funding & budget").unwrap();
        assert_eq!(url.path(), "/html/");
        let q: Vec<_> = url.query_pairs().collect();
        assert_eq!(q[0].1, "park funding & budget");
    }

    #[tokio::test]
    async fn empty_query_rejected() {
        let client = DuckDuckGoClient::new().unwrap();
        let err = client.search("   ", 2).await.unwrap_err();
        assert!(matches!(err, StoryError::SearchError { .. }));
    }
}
