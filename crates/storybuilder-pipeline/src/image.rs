//! Featured-image generation for a drafted story.

use std::sync::Arc;

use storybuilder_llm::{ImageRequest, LlmClient};
use storybuilder_types::ImageAsset;

use crate::retry::RetryPolicy;

pub fn build_image_prompt(title: &str, style_label: &str) -> String {
    format!(
        "A wide, cinematic editorial illustration for a news story titled \"{title}\". \
         Mood and framing should reflect a {style_label} perspective. \
         No text, captions, or logos in the image."
    )
}

pub struct ImageDirector {
    llm: Arc<LlmClient>,
    retry: RetryPolicy,
}

impl ImageDirector {
    pub fn new(llm: Arc<LlmClient>, retry: RetryPolicy) -> Self {
        Self { llm, retry }
    }

    /// Request one wide image. Returns `None` on any failure.
    pub async fn direct(&self, title: &str, style_label: &str) -> Option<ImageAsset> {
        let prompt = build_image_prompt(title, style_label);
        let request = ImageRequest::wide("", prompt.clone());

        match self
            .retry
            .run("image", || self.llm.generate_image(&request))
            .await
        {
            Ok(resp) => Some(ImageAsset::new(prompt, resp.url)),
            Err(e) => {
                tracing::warn!(title = %title, error = %e, "Image generation failed, continuing without image");
                None
            }
        }
    }
}
