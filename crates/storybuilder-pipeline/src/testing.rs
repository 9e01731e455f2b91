//! Scripted collaborators shared by the unit tests in this crate.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use storybuilder_llm::{
    FinishReason, ImageAdapter, ImageRequest, ImageResponse, ProviderAdapter, Request, Response,
    Usage,
};
use storybuilder_search::{SearchHit, SearchProvider};
use storybuilder_types::{Result, StoryError};

/// Replies with the scripted texts in order, repeating the last one.
pub struct ScriptedProvider {
    replies: Vec<String>,
    failure: Option<String>,
    next: AtomicUsize,
    seen: Arc<Mutex<Vec<Request>>>,
}

impl ScriptedProvider {
    pub fn replying(replies: &[&str]) -> Self {
        Self {
            replies: replies.iter().map(|s| s.to_string()).collect(),
            failure: None,
            next: AtomicUsize::new(0),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every call fails with a non-retryable provider error carrying `message`.
    pub fn failing(message: &str) -> Self {
        let mut p = Self::replying(&[]);
        p.failure = Some(message.to_string());
        p
    }

    pub fn requests(&self) -> Arc<Mutex<Vec<Request>>> {
        self.seen.clone()
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedProvider {
    async fn complete(&self, request: &Request) -> Result<Response> {
        self.seen.lock().unwrap().push(request.clone());
        if let Some(message) = &self.failure {
            return Err(StoryError::ProviderError {
                provider: "mock".into(),
                status: 400,
                message: message.clone(),
                retryable: false,
            });
        }
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        let text = self
            .replies
            .get(n)
            .or_else(|| self.replies.last())
            .cloned()
            .unwrap_or_default();
        Ok(Response {
            id: format!("resp-{n}"),
            text,
            usage: Usage::default(),
            model: request.model.clone(),
            finish_reason: FinishReason::EndTurn,
        })
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn default_model(&self) -> &str {
        "mock-model"
    }
}

/// Image backend returning a fixed URL, or failing.
pub struct MockImages {
    pub url: Option<String>,
    pub prompts: Arc<Mutex<Vec<ImageRequest>>>,
}

impl MockImages {
    pub fn ok(url: &str) -> Self {
        Self {
            url: Some(url.to_string()),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn broken() -> Self {
        Self {
            url: None,
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl ImageAdapter for MockImages {
    async fn generate_image(&self, request: &ImageRequest) -> Result<ImageResponse> {
        self.prompts.lock().unwrap().push(request.clone());
        match &self.url {
            Some(url) => Ok(ImageResponse {
                url: url.clone(),
                revised_prompt: None,
            }),
            None => Err(StoryError::ProviderError {
                provider: "mock".into(),
                status: 400,
                message: "content policy".into(),
                retryable: false,
            }),
        }
    }

    fn name(&self) -> &str {
        "mock-images"
    }

    fn default_image_model(&self) -> &str {
        "mock-image"
    }
}

/// Search backend with canned hits per query; unknown queries fail.
pub struct MockSearch {
    pub hits: HashMap<String, Vec<SearchHit>>,
    pub calls: Arc<Mutex<Vec<(String, usize)>>>,
}

impl MockSearch {
    pub fn new(entries: &[(&str, &[(&str, &str)])]) -> Self {
        Self {
            hits: entries
                .iter()
                .map(|(q, hits)| {
                    (
                        q.to_string(),
                        hits.iter()
                            .map(|(t, u)| SearchHit::new(*t, *u, format!("About {t}")))
                            .collect(),
                    )
                })
                .collect(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl SearchProvider for MockSearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        self.calls
            .lock()
            .unwrap()
            .push((query.to_string(), max_results));
        match self.hits.get(query) {
            Some(hits) => Ok(hits.iter().take(max_results).cloned().collect()),
            None => Err(StoryError::SearchError {
                query: query.to_string(),
                message: "no route".into(),
            }),
        }
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}
