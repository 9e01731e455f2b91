//! Research retrieval and the citation digest handed to the generator.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::Arc;

use storybuilder_search::SearchProvider;
use storybuilder_types::ResearchFinding;

use crate::retry::RetryPolicy;

pub const NO_RESEARCH: &str = "No research data available.";
pub const DEFAULT_RESULTS_PER_QUERY: usize = 2;

pub struct ResearchRetriever {
    search: Arc<dyn SearchProvider>,
    results_per_query: usize,
    dedup_urls: bool,
    retry: RetryPolicy,
}

impl ResearchRetriever {
    pub fn new(search: Arc<dyn SearchProvider>, retry: RetryPolicy) -> Self {
        Self {
            search,
            results_per_query: DEFAULT_RESULTS_PER_QUERY,
            dedup_urls: false,
            retry,
        }
    }

    pub fn with_results_per_query(mut self, n: usize) -> Self {
        self.results_per_query = n;
        self
    }

    /// Drop findings whose URL already appeared under an earlier query.
    pub fn with_url_dedup(mut self, enabled: bool) -> Self {
        self.dedup_urls = enabled;
        self
    }

    /// Search each query in turn. Findings keep query order, then rank.
    /// A failed query is logged and contributes nothing.
    pub async fn retrieve(&self, queries: &[String]) -> Vec<ResearchFinding> {
        let mut findings = Vec::new();
        let mut seen_urls = HashSet::new();

        for query in queries {
            tracing::info!(query = %query, provider = self.search.provider_name(), "Searching");
            let hits = match self
                .retry
                .run("search", || self.search.search(query, self.results_per_query))
                .await
            {
                Ok(hits) => hits,
                Err(e) => {
                    tracing::warn!(query = %query, error = %e, "Search failed, skipping query");
                    continue;
                }
            };

            for hit in hits.into_iter().take(self.results_per_query) {
                if self.dedup_urls && !seen_urls.insert(hit.url.clone()) {
                    tracing::debug!(url = %hit.url, "Dropping repeated research URL");
                    continue;
                }
                findings.push(ResearchFinding {
                    query: query.clone(),
                    title: hit.title,
                    url: hit.url,
                    snippet: hit.snippet,
                });
            }
        }

        findings
    }
}

/// Render findings as the numbered plain-text block embedded in the
/// generation prompt.
pub fn format_citations(findings: &[ResearchFinding]) -> String {
    if findings.is_empty() {
        return NO_RESEARCH.to_string();
    }

    let mut out = String::from("RESEARCH DATA:\n\n");
    for (i, f) in findings.iter().enumerate() {
        // Writing into a String cannot fail.
        let _ = write!(
            out,
            "Source {n}:\nTitle: {title}\nURL: {url}\nSnippet: {snippet}\nMLA Citation: {title}. {url}. Accessed via Web Search.\n\n",
            n = i + 1,
            title = f.title,
            url = f.url,
            snippet = f.snippet,
        );
    }
    out
}
