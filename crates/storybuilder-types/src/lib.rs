//! Shared types, errors, and configuration records for the Storybuilder pipeline.
//!
//! This crate provides the foundational types used across all other Storybuilder crates:
//! - `StoryError`: unified error taxonomy
//! - `Headline`: the unit of dedup identity
//! - `ResearchFinding`, `ArticleDraft`, `ImageAsset`, `PublishResult`: per-headline records
//! - `Personality` / `PersonalityRegistry`: immutable voice and credential profiles

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod personality;

pub use personality::{Personality, PersonalityRegistry};

/// Unified error type for all Storybuilder subsystems.
#[derive(Debug, thiserror::Error)]
pub enum StoryError {
    // === Collaborator Errors ===
    #[error("Provider {provider} returned HTTP {status}: {message}")]
    ProviderError {
        provider: String,
        status: u16,
        message: String,
        retryable: bool,
    },

    #[error("Rate limited by {provider}, retry after {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: u64,
    },

    #[error("Authentication failed for provider {provider}")]
    AuthError { provider: String },

    #[error("Feed {url} could not be read: {message}")]
    FeedError { url: String, message: String },

    #[error("Search for '{query}' failed: {message}")]
    SearchError { query: String, message: String },

    #[error("Publishing backend returned HTTP {status}: {message}")]
    PublishError { status: u16, message: String },

    // === Stage Errors ===
    #[error("Story generation failed: {0}")]
    GenerationFailed(String),

    #[error("Malformed collaborator output: {0}")]
    MalformedOutput(String),

    // === Configuration Errors ===
    #[error("Missing credential {key} for personality '{personality}'")]
    MissingCredential { personality: String, key: String },

    #[error("Unknown personality '{0}'")]
    UnknownPersonality(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    // === Generic ===
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl StoryError {
    /// Returns `true` if the error is transient and the operation may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoryError::RateLimited { .. }
                | StoryError::ProviderError { retryable: true, .. }
                | StoryError::PublishError { status: 500..=599, .. }
        )
    }

    /// Returns `true` for errors that must stop a batch before any headline is touched.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            StoryError::MissingCredential { .. }
                | StoryError::UnknownPersonality(_)
                | StoryError::ConfigError(_)
                | StoryError::AuthError { .. }
        )
    }
}

/// A convenience alias for `Result<T, StoryError>`.
pub type Result<T> = std::result::Result<T, StoryError>;

// ---------------------------------------------------------------------------
// Headline
// ---------------------------------------------------------------------------

/// A news headline with runs of whitespace collapsed to single spaces.
///
/// Equality is exact string match on the normalized text; punctuation and case
/// are preserved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Headline(String);

impl Headline {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().split_whitespace().collect::<Vec<_>>().join(" "))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First `max_chars` characters, for progress lines.
    pub fn preview(&self, max_chars: usize) -> &str {
        match self.0.char_indices().nth(max_chars) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }
}

impl fmt::Display for Headline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Headline {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

// ---------------------------------------------------------------------------
// Per-headline records
// ---------------------------------------------------------------------------

/// One web-search result attributed to the query that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchFinding {
    pub query: String,
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// A generated article ready for publishing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleDraft {
    pub title: String,
    pub html_content: String,
}

/// A generated featured image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAsset {
    pub prompt_text: String,
    pub remote_url: String,
    /// Set only after the publishing backend accepted the upload.
    pub uploaded_media_id: Option<u64>,
}

impl ImageAsset {
    pub fn new(prompt_text: impl Into<String>, remote_url: impl Into<String>) -> Self {
        Self {
            prompt_text: prompt_text.into(),
            remote_url: remote_url.into(),
            uploaded_media_id: None,
        }
    }
}

/// Result of handing a draft to the publishing backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PublishResult {
    Published { permalink: String },
    Failed { reason: String },
}

impl PublishResult {
    pub fn is_published(&self) -> bool {
        matches!(self, PublishResult::Published { .. })
    }
}

impl<E: fmt::Display> From<std::result::Result<String, E>> for PublishResult {
    fn from(result: std::result::Result<String, E>) -> Self {
        match result {
            Ok(permalink) => PublishResult::Published { permalink },
            Err(e) => PublishResult::Failed {
                reason: e.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_provider_error() {
        let err = StoryError::ProviderError {
            provider: "openai".into(),
            status: 500,
            message: "internal server error".into(),
            retryable: true,
        };
        assert_eq!(
            err.to_string(),
            "Provider openai returned HTTP 500: internal server error"
        );
    }

    #[test]
    fn error_display_missing_credential() {
        let err = StoryError::MissingCredential {
            personality: "alice".into(),
            key: "WP_USER_ALICE".into(),
        };
        assert_eq!(
            err.to_string(),
            "Missing credential WP_USER_ALICE for personality 'alice'"
        );
    }

    #[test]
    fn error_display_feed_error() {
        let err = StoryError::FeedError {
            url: "https://example.com/rss".into(),
            message: "not a feed".into(),
        };
        assert_eq!(
            err.to_string(),
            "Feed https://example.com/rss could not be read: not a feed"
        );
    }

    // --- is_retryable ---

    #[test]
    fn retryable_rate_limited() {
        let err = StoryError::RateLimited {
            provider: "x".into(),
            retry_after_ms: 1000,
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn retryable_publish_server_error() {
        let err = StoryError::PublishError {
            status: 503,
            message: "unavailable".into(),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn not_retryable_publish_client_error() {
        let err = StoryError::PublishError {
            status: 403,
            message: "forbidden".into(),
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn not_retryable_generation_failure() {
        assert!(!StoryError::GenerationFailed("boom".into()).is_retryable());
    }

    // --- is_configuration ---

    #[test]
    fn configuration_errors_are_classified() {
        assert!(StoryError::UnknownPersonality("zed".into()).is_configuration());
        assert!(StoryError::MissingCredential {
            personality: "a".into(),
            key: "K".into()
        }
        .is_configuration());
        assert!(!StoryError::Other("x".into()).is_configuration());
    }

    #[test]
    fn from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: StoryError = io_err.into();
        assert!(matches!(err, StoryError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    // --- Headline ---

    #[test]
    fn headline_collapses_whitespace() {
        let h = Headline::new("  City   opens\nnew\tpark ");
        assert_eq!(h.as_str(), "City opens new park");
    }

    #[test]
    fn headline_equality_is_case_sensitive() {
        assert_ne!(Headline::new("City opens park"), Headline::new("city opens park"));
        assert_eq!(Headline::new("City  opens park"), Headline::new("City opens park"));
    }

    #[test]
    fn headline_preview_respects_char_boundaries() {
        let h = Headline::new("Café réouvre ses portes");
        assert_eq!(h.preview(4), "Café");
        assert_eq!(h.preview(100), h.as_str());
    }

    #[test]
    fn headline_serializes_as_plain_string() {
        let json = serde_json::to_string(&Headline::new("A  B")).unwrap();
        assert_eq!(json, "\"A B\"");
    }

    // --- PublishResult ---

    #[test]
    fn publish_result_from_result() {
        let ok: PublishResult = Ok::<_, StoryError>("https://site/p/1".to_string()).into();
        assert_eq!(
            ok,
            PublishResult::Published {
                permalink: "https://site/p/1".into()
            }
        );

        let err: PublishResult = Err::<String, _>(StoryError::PublishError {
            status: 500,
            message: "down".into(),
        })
        .into();
        assert!(!err.is_published());
        match err {
            PublishResult::Failed { reason } => assert!(reason.contains("500")),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[test]
    fn image_asset_starts_without_media_id() {
        let asset = ImageAsset::new("prompt", "https://img/1.png");
        assert!(asset.uploaded_media_id.is_none());
    }
}
