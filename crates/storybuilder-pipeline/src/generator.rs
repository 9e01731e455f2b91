//! Story generation and parsing of the `TITLE:` / `CONTENT:` reply layout.

use std::sync::Arc;

use storybuilder_llm::{LlmClient, Request};
use storybuilder_types::{ArticleDraft, Headline, Result, StoryError};

use crate::retry::RetryPolicy;

const SYSTEM_PROMPT: &str = "You are a creative journalist and storyteller.";
const TITLE_MARKER: &str = "TITLE:";
const CONTENT_MARKER: &str = "CONTENT:";

pub struct StoryGenerator {
    llm: Arc<LlmClient>,
    retry: RetryPolicy,
}

impl StoryGenerator {
    pub fn new(llm: Arc<LlmClient>, retry: RetryPolicy) -> Self {
        Self { llm, retry }
    }

    /// Build the generation prompt. `research_digest` may be empty, in which
    /// case the citation requirements are left out.
    pub fn build_prompt(
        headline: &Headline,
        style_directive: &str,
        thesis: &str,
        research_digest: &str,
    ) -> String {
        let mut prompt = format!(
            "Here is a news headline: \"{headline}\"\n\n\
             Write an engaging, cohesive 800-word story based on this headline.\n\n\
             Personality/Style Instructions:\n{style_directive}\n"
        );

        if !thesis.is_empty() {
            prompt.push_str(&format!("\nThesis to support:\n{thesis}\n"));
        }

        if !research_digest.is_empty() {
            prompt.push_str(&format!(
                "\n{research_digest}\n\
                 Research Requirements:\n\
                 - Organize the story into multiple paragraphs grouped under <h2> section headings.\n\
                 - Support claims with the research above using MLA in-text citations.\n\
                 - End with a \"Works Cited\" section listing every source used; render each URL as a clickable <a href=\"...\"> link.\n\
                 - Write a new title in your own voice; do not reuse the headline verbatim.\n"
            ));
        }

        prompt.push_str(
            "\nFormatting Guidelines:\n\
             - Use HTML tags for headings (e.g., <h2>, <h3>).\n\
             - DO NOT use Markdown formatting for headings (like ** or #).\n\
             - The output should be ready to paste into a WordPress HTML editor.\n\n\
             Output Format:\n\
             You MUST return the response in the following format:\n\
             TITLE: [Your styled title here]\n\
             CONTENT: [Your story content here]\n",
        );
        prompt
    }

    pub async fn generate(
        &self,
        headline: &Headline,
        style_directive: &str,
        thesis: &str,
        research_digest: &str,
    ) -> Result<ArticleDraft> {
        let request = Request::chat(
            "",
            SYSTEM_PROMPT,
            Self::build_prompt(headline, style_directive, thesis, research_digest),
        )
        .with_temperature(0.7);

        let response = self
            .retry
            .run("generate", || self.llm.complete(&request))
            .await
            .map_err(|e| StoryError::GenerationFailed(format!("Error generating story: {e}")))?;

        Ok(parse_story_output(&response.text, headline))
    }
}

/// Split a raw reply into title and content.
///
/// Only a reply carrying both markers with exactly one `CONTENT:` is split.
/// An empty title falls back to the headline and empty content falls back to
/// the raw reply. Anything else keeps the headline as title and the raw reply
/// verbatim as content.
pub fn parse_story_output(raw: &str, headline: &Headline) -> ArticleDraft {
    let mut draft = ArticleDraft {
        title: headline.as_str().to_string(),
        html_content: raw.to_string(),
    };

    if !(raw.contains(TITLE_MARKER) && raw.contains(CONTENT_MARKER)) {
        return draft;
    }

    let parts: Vec<&str> = raw.split(CONTENT_MARKER).collect();
    if let [head, body] = parts.as_slice() {
        let title = head.replace(TITLE_MARKER, "");
        let title = title.trim();
        let body = body.trim();
        if !title.is_empty() {
            draft.title = title.to_string();
        }
        if !body.is_empty() {
            draft.html_content = body.to_string();
        }
    }
    draft
}
