use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use storybuilder_types::{Result, StoryError};

// ---------------------------------------------------------------------------
// PostStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    #[default]
    Draft,
    Publish,
    Private,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Publish => "publish",
            PostStatus::Private => "private",
        }
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostStatus {
    type Err = StoryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(PostStatus::Draft),
            "publish" => Ok(PostStatus::Publish),
            "private" => Ok(PostStatus::Private),
            other => Err(StoryError::ConfigError(format!(
                "unknown post status '{other}' (expected draft, publish or private)"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// PostPayload
// ---------------------------------------------------------------------------

/// Body of a create-post call. `featured_media` is omitted from the wire
/// payload when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostPayload {
    pub title: String,
    pub content: String,
    pub status: PostStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub featured_media: Option<u64>,
}

impl PostPayload {
    pub fn new(title: impl Into<String>, content: impl Into<String>, status: PostStatus) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            status,
            featured_media: None,
        }
    }

    pub fn with_featured_media(mut self, media_id: Option<u64>) -> Self {
        self.featured_media = media_id;
        self
    }
}

// ---------------------------------------------------------------------------
// Publisher
// ---------------------------------------------------------------------------

#[async_trait]
pub trait Publisher: Send + Sync {
    /// Fetches the image at `image_url` and stores it in the media library,
    /// returning the media identifier.
    async fn upload_media(&self, image_url: &str) -> Result<u64>;

    /// Creates a post and returns its permalink.
    async fn create_post(&self, post: &PostPayload) -> Result<String>;
}
