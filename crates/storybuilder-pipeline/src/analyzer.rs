//! Headline analysis: derive a thesis and research queries.

use std::sync::Arc;

use serde::Deserialize;
use storybuilder_llm::{LlmClient, Request};
use storybuilder_types::Headline;

use crate::retry::RetryPolicy;

const SYSTEM_PROMPT: &str = "You are a research assistant. Your goal is to analyze news headlines and plan a research strategy.";

/// Thesis plus search queries. Both empty means "skip research".
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Analysis {
    pub thesis: String,
    pub queries: Vec<String>,
}

impl Analysis {
    pub fn is_empty(&self) -> bool {
        self.thesis.is_empty() && self.queries.is_empty()
    }
}

pub struct HeadlineAnalyzer {
    llm: Arc<LlmClient>,
    retry: RetryPolicy,
}

impl HeadlineAnalyzer {
    pub fn new(llm: Arc<LlmClient>, retry: RetryPolicy) -> Self {
        Self { llm, retry }
    }

    pub fn build_prompt(headline: &Headline, style_directive: &str) -> String {
        format!(
            r#"Headline: "{headline}"

Personality Context: {style_directive}

Task:
1. Derive a thesis statement about this headline that aligns with the personality context.
2. Identify 3 distinct points or questions that need to be researched to support this thesis.
3. Convert these points into specific search queries.

Output Format (JSON):
{{
    "thesis": "The thesis statement...",
    "queries": ["query 1", "query 2", "query 3"]
}}"#
        )
    }

    /// Never fails: any collaborator or format problem yields an empty analysis.
    pub async fn analyze(&self, headline: &Headline, style_directive: &str) -> Analysis {
        let request = Request::chat("", SYSTEM_PROMPT, Self::build_prompt(headline, style_directive))
            .with_temperature(0.7);

        let value = match self
            .retry
            .run("analyze", || self.llm.complete_json(&request))
            .await
        {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(headline = %headline, error = %e, "Headline analysis failed");
                return Analysis::default();
            }
        };

        match serde_json::from_value::<Analysis>(value) {
            Ok(mut analysis) => {
                analysis.thesis = analysis.thesis.trim().to_string();
                analysis.queries = analysis
                    .queries
                    .into_iter()
                    .map(|q| q.trim().to_string())
                    .filter(|q| !q.is_empty())
                    .collect();
                analysis
            }
            Err(e) => {
                tracing::warn!(headline = %headline, error = %e, "Analysis reply missing thesis/queries");
                Analysis::default()
            }
        }
    }
}
