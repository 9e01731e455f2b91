//! The Storybuilder batch pipeline.
//!
//! A batch takes headlines for one personality and drives each through
//! dedup against the persisted history, analysis, web research, story
//! drafting, featured-image generation and publishing.

pub mod analyzer;
pub mod events;
pub mod generator;
pub mod history;
pub mod image;
pub mod orchestrator;
pub mod research;
pub mod retry;

#[cfg(test)]
mod testing;

pub use analyzer::{Analysis, HeadlineAnalyzer};
pub use events::{BatchEvent, EventEmitter};
pub use generator::{parse_story_output, StoryGenerator};
pub use history::{HistoryStore, DEFAULT_HISTORY_FILE};
pub use image::{build_image_prompt, ImageDirector};
pub use orchestrator::{BatchConfig, BatchReport, HeadlineOutcome, HeadlineReport, Orchestrator};
pub use research::{format_citations, ResearchRetriever, NO_RESEARCH};
pub use retry::{BackoffPolicy, RetryPolicy};
