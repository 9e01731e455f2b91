use async_trait::async_trait;
use serde_json::json;

use crate::{
    FinishReason, ImageAdapter, ImageRequest, ImageResponse, ProviderAdapter, Request, Response,
    ResponseFormat, Usage,
};
use storybuilder_types::{Result, StoryError};

const PROVIDER: &str = "openai";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o";
const DEFAULT_IMAGE_MODEL: &str = "dall-e-3";

// ---------------------------------------------------------------------------
// OpenAiAdapter
// ---------------------------------------------------------------------------

/// Client for OpenAI-compatible `chat/completions` and `images/generations` endpoints.
#[derive(Debug, Clone)]
pub struct OpenAiAdapter {
    api_key: String,
    client: reqwest::Client,
    base_url: String,
    default_model: String,
    image_model: String,
}

impl OpenAiAdapter {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            client: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
        }
    }

    /// Reads `AI_API_KEY` (required) plus optional `AI_BASE_URL`, `AI_MODEL`
    /// and `AI_IMAGE_MODEL`.
    pub fn from_env() -> Result<Self> {
        let key = std::env::var("AI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| StoryError::ConfigError("AI_API_KEY is not set".into()))?;

        let mut adapter = Self::new(key);
        if let Ok(url) = std::env::var("AI_BASE_URL") {
            adapter = adapter.with_base_url(url);
        }
        if let Ok(model) = std::env::var("AI_MODEL") {
            adapter = adapter.with_model(model);
        }
        if let Ok(model) = std::env::var("AI_IMAGE_MODEL") {
            adapter = adapter.with_image_model(model);
        }
        Ok(adapter)
    }

    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: String) -> Self {
        self.default_model = model;
        self
    }

    pub fn with_image_model(mut self, model: String) -> Self {
        self.image_model = model;
        self
    }

    fn build_request_body(&self, request: &Request) -> serde_json::Value {
        let messages: Vec<serde_json::Value> = request
            .messages
            .iter()
            .map(|msg| json!({ "role": msg.role.as_str(), "content": msg.content }))
            .collect();

        let model = if request.model.is_empty() {
            self.default_model.as_str()
        } else {
            request.model.as_str()
        };

        let mut body = json!({
            "model": model,
            "messages": messages,
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if let Some(temp) = request.temperature {
            body["temperature"] = json!(temp);
        }
        if request.response_format == ResponseFormat::JsonObject {
            body["response_format"] = json!({ "type": "json_object" });
        }

        body
    }

    fn parse_response(&self, body: serde_json::Value) -> Result<Response> {
        let id = body["id"].as_str().unwrap_or("").to_string();
        let model = body["model"].as_str().unwrap_or("").to_string();

        let choice = body["choices"]
            .as_array()
            .and_then(|c| c.first())
            .ok_or_else(|| StoryError::MalformedOutput("completion has no choices".into()))?;

        let text = choice["message"]["content"]
            .as_str()
            .unwrap_or("")
            .to_string();

        let finish_reason = match choice["finish_reason"].as_str() {
            Some("length") => FinishReason::MaxTokens,
            Some("content_filter") => FinishReason::ContentFilter,
            _ => FinishReason::EndTurn,
        };

        let usage_obj = &body["usage"];
        let input_tokens = usage_obj["prompt_tokens"].as_u64().unwrap_or(0);
        let output_tokens = usage_obj["completion_tokens"].as_u64().unwrap_or(0);
        let total_tokens = usage_obj["total_tokens"]
            .as_u64()
            .unwrap_or(input_tokens + output_tokens);

        Ok(Response {
            id,
            text,
            usage: Usage {
                input_tokens,
                output_tokens,
                total_tokens,
            },
            model,
            finish_reason,
        })
    }

    fn build_image_body(&self, request: &ImageRequest) -> serde_json::Value {
        let model = if request.model.is_empty() {
            self.image_model.as_str()
        } else {
            request.model.as_str()
        };
        json!({
            "model": model,
            "prompt": request.prompt,
            "size": request.size,
            "quality": request.quality,
            "n": request.n,
        })
    }

    fn parse_image_response(&self, body: serde_json::Value) -> Result<ImageResponse> {
        let first = body["data"]
            .as_array()
            .and_then(|d| d.first())
            .ok_or_else(|| StoryError::MalformedOutput("image response has no data".into()))?;

        let url = first["url"]
            .as_str()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| StoryError::MalformedOutput("image response has no url".into()))?
            .to_string();

        Ok(ImageResponse {
            url,
            revised_prompt: first["revised_prompt"].as_str().map(String::from),
        })
    }

    async fn post_json(&self, path: &str, body: &serde_json::Value) -> Result<serde_json::Value> {
        let resp = self
            .client
            .post(format!("{}/{}", self.base_url, path))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| StoryError::ProviderError {
                provider: PROVIDER.into(),
                status: 0,
                message: e.to_string(),
                retryable: true,
            })?;

        let status = resp.status();
        let response_body = resp.text().await.map_err(|e| StoryError::ProviderError {
            provider: PROVIDER.into(),
            status: 0,
            message: e.to_string(),
            retryable: true,
        })?;

        if !status.is_success() {
            return Err(map_error(status, &response_body));
        }

        serde_json::from_str(&response_body).map_err(|e| StoryError::ProviderError {
            provider: PROVIDER.into(),
            status: status.as_u16(),
            message: format!("Failed to parse response JSON: {e}"),
            retryable: false,
        })
    }
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

fn map_error(status: reqwest::StatusCode, body: &str) -> StoryError {
    let status_u16 = status.as_u16();
    match status_u16 {
        429 => {
            let retry_ms = serde_json::from_str::<serde_json::Value>(body)
                .ok()
                .and_then(|v| v["error"]["retry_after"].as_f64())
                .map(|s| (s * 1000.0) as u64)
                .unwrap_or(1000);
            StoryError::RateLimited {
                provider: PROVIDER.into(),
                retry_after_ms: retry_ms,
            }
        }
        401 => StoryError::AuthError {
            provider: PROVIDER.into(),
        },
        500..=599 => StoryError::ProviderError {
            provider: PROVIDER.into(),
            status: status_u16,
            message: extract_error_message(body),
            retryable: true,
        },
        _ => StoryError::ProviderError {
            provider: PROVIDER.into(),
            status: status_u16,
            message: extract_error_message(body),
            retryable: false,
        },
    }
}

fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(String::from))
        .unwrap_or_else(|| body.to_string())
}

// ---------------------------------------------------------------------------
// Trait implementations
// ---------------------------------------------------------------------------

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    async fn complete(&self, request: &Request) -> Result<Response> {
        let body = self.build_request_body(request);
        let json = self.post_json("chat/completions", &body).await?;
        self.parse_response(json)
    }

    fn name(&self) -> &str {
        PROVIDER
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }
}

#[async_trait]
impl ImageAdapter for OpenAiAdapter {
    async fn generate_image(&self, request: &ImageRequest) -> Result<ImageResponse> {
        let body = self.build_image_body(request);
        let json = self.post_json("images/generations", &body).await?;
        self.parse_image_response(json)
    }

    fn name(&self) -> &str {
        PROVIDER
    }

    fn default_image_model(&self) -> &str {
        &self.image_model
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
