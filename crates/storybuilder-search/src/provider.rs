use async_trait::async_trait;

use crate::SearchHit;
use storybuilder_types::Result;

/// A web search backend.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Returns at most `max_results` hits in rank order.
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>>;

    fn provider_name(&self) -> &'static str;
}
