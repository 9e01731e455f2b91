use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use storybuilder_types::{Result, StoryError};

use crate::{
    DynProvider, ImageAdapter, ImageRequest, ImageResponse, OpenAiAdapter, ProviderAdapter,
    Request, Response, ResponseFormat,
};

// ---------------------------------------------------------------------------
// Middleware
// ---------------------------------------------------------------------------

pub trait Middleware: Send + Sync {
    fn before(&self, _request: &mut Request) {}
    fn after(&self, _request: &Request, _response: &mut Response) {}
}

// ---------------------------------------------------------------------------
// Built-in middleware: LoggingMiddleware
// ---------------------------------------------------------------------------

pub struct LoggingMiddleware;

impl Middleware for LoggingMiddleware {
    fn before(&self, request: &mut Request) {
        tracing::info!(
            model = %request.model,
            messages = request.messages.len(),
            format = ?request.response_format,
            "LLM request"
        );
    }

    fn after(&self, _request: &Request, response: &mut Response) {
        tracing::info!(
            model = %response.model,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            finish = ?response.finish_reason,
            "LLM response"
        );
    }
}

// ---------------------------------------------------------------------------
// Built-in middleware: CostTrackingMiddleware
// ---------------------------------------------------------------------------

/// Accumulates token usage across requests. Clones share the same counters.
#[derive(Clone)]
pub struct CostTrackingMiddleware {
    total_input: Arc<AtomicU64>,
    total_output: Arc<AtomicU64>,
    requests: Arc<AtomicU64>,
}

impl CostTrackingMiddleware {
    pub fn new() -> Self {
        Self {
            total_input: Arc::new(AtomicU64::new(0)),
            total_output: Arc::new(AtomicU64::new(0)),
            requests: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn total_input_tokens(&self) -> u64 {
        self.total_input.load(Ordering::Relaxed)
    }

    pub fn total_output_tokens(&self) -> u64 {
        self.total_output.load(Ordering::Relaxed)
    }

    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }
}

impl Default for CostTrackingMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl Middleware for CostTrackingMiddleware {
    fn after(&self, _request: &Request, response: &mut Response) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.total_input
            .fetch_add(response.usage.input_tokens, Ordering::Relaxed);
        self.total_output
            .fetch_add(response.usage.output_tokens, Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// LlmClient
// ---------------------------------------------------------------------------

pub struct LlmClient {
    providers: HashMap<String, DynProvider>,
    default_provider: Option<String>,
    image: Option<Box<dyn ImageAdapter>>,
    middleware: Vec<Box<dyn Middleware>>,
}

impl LlmClient {
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: None,
            image: None,
            middleware: Vec::new(),
        }
    }

    /// Registers a chat provider. The first one registered becomes the default route.
    pub fn register_provider(&mut self, provider: impl ProviderAdapter + 'static) {
        let name = provider.name().to_string();
        if self.default_provider.is_none() {
            self.default_provider = Some(name.clone());
        }
        self.providers.insert(name, DynProvider::new(provider));
    }

    pub fn set_image_adapter(&mut self, adapter: impl ImageAdapter + 'static) {
        self.image = Some(Box::new(adapter));
    }

    pub fn with_middleware(mut self, m: impl Middleware + 'static) -> Self {
        self.middleware.push(Box::new(m));
        self
    }

    /// Model used when a request leaves `model` empty.
    pub fn default_model(&self) -> Option<&str> {
        self.default_provider
            .as_ref()
            .and_then(|name| self.providers.get(name))
            .map(|p| p.default_model())
    }

    pub fn default_image_model(&self) -> Option<&str> {
        self.image.as_ref().map(|i| i.default_image_model())
    }

    pub async fn complete(&self, request: &Request) -> Result<Response> {
        let provider = self.resolve_provider(request)?;
        let mut req = request.clone();
        if req.model.is_empty() {
            req.model = provider.default_model().to_string();
        }

        for m in &self.middleware {
            m.before(&mut req);
        }

        let mut resp = provider.complete(&req).await?;

        for m in &self.middleware {
            m.after(&req, &mut resp);
        }

        Ok(resp)
    }

    /// Runs the request in JSON mode and parses the reply as a JSON object.
    pub async fn complete_json(&self, request: &Request) -> Result<serde_json::Value> {
        let mut req = request.clone();
        req.response_format = ResponseFormat::JsonObject;
        let resp = self.complete(&req).await?;

        let value: serde_json::Value = serde_json::from_str(resp.text.trim())
            .map_err(|e| StoryError::MalformedOutput(format!("reply is not JSON: {e}")))?;
        if !value.is_object() {
            return Err(StoryError::MalformedOutput(
                "reply is JSON but not an object".into(),
            ));
        }
        Ok(value)
    }

    pub async fn generate_image(&self, request: &ImageRequest) -> Result<ImageResponse> {
        let adapter = self
            .image
            .as_ref()
            .ok_or_else(|| StoryError::Other("No image adapter registered".to_string()))?;

        let mut req = request.clone();
        if req.model.is_empty() {
            req.model = adapter.default_image_model().to_string();
        }

        tracing::info!(model = %req.model, size = %req.size, "Image request");
        let resp = adapter.generate_image(&req).await?;
        tracing::info!(url = %resp.url, "Image response");
        Ok(resp)
    }

    fn resolve_provider(&self, request: &Request) -> Result<&DynProvider> {
        // 1. Explicit provider field
        if let Some(ref provider_name) = request.provider {
            return self.providers.get(provider_name).ok_or_else(|| {
                StoryError::Other(format!("Provider '{}' not registered", provider_name))
            });
        }

        // 2. Default route
        self.default_provider
            .as_ref()
            .and_then(|name| self.providers.get(name))
            .ok_or_else(|| StoryError::Other("No providers registered".to_string()))
    }

    /// Builds a client backed by the OpenAI-compatible adapter configured from
    /// the environment, for both chat and images.
    pub fn from_env() -> Result<Self> {
        let adapter = OpenAiAdapter::from_env()?;
        Ok(Self::with_openai(adapter))
    }

    pub fn with_openai(adapter: OpenAiAdapter) -> Self {
        let mut client = Self::new();
        client.set_image_adapter(adapter.clone());
        client.register_provider(adapter);
        client
    }
}

impl Default for LlmClient {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
