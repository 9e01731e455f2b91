use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use tracing::{debug, info};
use url::Url;

use crate::{PostPayload, Publisher};
use storybuilder_types::{Personality, Result, StoryError};

const DEFAULT_FILENAME: &str = "featured-image.png";

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Site URL plus the application-password pair for one personality.
#[derive(Clone)]
pub struct WordPressCredentials {
    pub site_url: String,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for WordPressCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WordPressCredentials")
            .field("site_url", &self.site_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl WordPressCredentials {
    /// Reads `WP_URL` and the personality's user/password variables.
    pub fn from_env(personality: &Personality) -> Result<Self> {
        let read = |key: &str| {
            std::env::var(key)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| StoryError::MissingCredential {
                    personality: personality.id.clone(),
                    key: key.to_string(),
                })
        };

        Ok(Self {
            site_url: read("WP_URL")?,
            username: read(&personality.env_user_key)?,
            password: read(&personality.env_pass_key)?,
        })
    }
}

// ---------------------------------------------------------------------------
// WordPressPublisher
// ---------------------------------------------------------------------------

pub struct WordPressPublisher {
    client: reqwest::Client,
    api_base: String,
    username: String,
    password: String,
}

impl WordPressPublisher {
    pub fn new(credentials: WordPressCredentials) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| StoryError::ConfigError(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base: format!("{}/wp-json/wp/v2", credentials.site_url.trim_end_matches('/')),
            username: credentials.username,
            password: credentials.password,
        })
    }

    async fn fetch_image(&self, image_url: &str) -> Result<(Vec<u8>, String)> {
        let resp = self
            .client
            .get(image_url)
            .send()
            .await
            .map_err(|e| transport_error("image download", e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(StoryError::PublishError {
                status: status.as_u16(),
                message: format!("image download failed for {image_url}"),
            });
        }

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .filter(|v| v.starts_with("image/"))
            .unwrap_or_else(|| "image/png".to_string());

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| transport_error("image download", e))?;
        Ok((bytes.to_vec(), content_type))
    }

    async fn read_json(resp: reqwest::Response, what: &str) -> Result<serde_json::Value> {
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| transport_error(what, e))?;

        if !status.is_success() {
            return Err(StoryError::PublishError {
                status: status.as_u16(),
                message: extract_error_message(&body),
            });
        }

        serde_json::from_str(&body).map_err(|e| StoryError::PublishError {
            status: status.as_u16(),
            message: format!("{what}: invalid JSON response: {e}"),
        })
    }
}

fn transport_error(what: &str, e: reqwest::Error) -> StoryError {
    StoryError::PublishError {
        status: 0,
        message: format!("{what}: {e}"),
    }
}

fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["message"].as_str().map(String::from))
        .unwrap_or_else(|| body.to_string())
}

/// Upload filename taken from the last path segment of the image URL.
fn filename_for(image_url: &str, content_type: &str) -> String {
    let from_url = Url::parse(image_url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut s| s.next_back().map(str::to_string))
        })
        .filter(|name| !name.is_empty() && name.contains('.'));

    match from_url {
        Some(name) => name,
        None => match content_type {
            "image/jpeg" => "featured-image.jpg".to_string(),
            "image/webp" => "featured-image.webp".to_string(),
            "image/gif" => "featured-image.gif".to_string(),
            _ => DEFAULT_FILENAME.to_string(),
        },
    }
}

#[async_trait]
impl Publisher for WordPressPublisher {
    async fn upload_media(&self, image_url: &str) -> Result<u64> {
        let (bytes, content_type) = self.fetch_image(image_url).await?;
        let filename = filename_for(image_url, &content_type);
        debug!(%filename, size = bytes.len(), "Uploading media");

        let resp = self
            .client
            .post(format!("{}/media", self.api_base))
            .basic_auth(&self.username, Some(&self.password))
            .header(CONTENT_TYPE, content_type)
            .header(
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            )
            .body(bytes)
            .send()
            .await
            .map_err(|e| transport_error("media upload", e))?;

        let json = Self::read_json(resp, "media upload").await?;
        let id = json["id"].as_u64().ok_or_else(|| StoryError::PublishError {
            status: 0,
            message: "media upload response has no id".into(),
        })?;

        info!(media_id = id, "Media uploaded");
        Ok(id)
    }

    async fn create_post(&self, post: &PostPayload) -> Result<String> {
        let resp = self
            .client
            .post(format!("{}/posts", self.api_base))
            .basic_auth(&self.username, Some(&self.password))
            .json(post)
            .send()
            .await
            .map_err(|e| transport_error("create post", e))?;

        let json = Self::read_json(resp, "create post").await?;
        let link = json["link"]
            .as_str()
            .ok_or_else(|| StoryError::PublishError {
                status: 0,
                message: "create post response has no link".into(),
            })?
            .to_string();

        info!(%link, status = %post.status, "Post created");
        Ok(link)
    }
}
