//! Graph API client for page publishing.
//!
//! Uploads photos unpublished, then creates a feed post referencing the
//! uploaded media, then adds comments to that post.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::json;

use crate::domain::PageTarget;

use super::{MediaPayload, PlatformClient, PlatformError, PostRequest};

/// Connection settings for the Graph API
#[derive(Debug, Clone)]
pub struct GraphConfig {
    /// e.g. https://graph.facebook.com
    pub base_url: String,

    /// e.g. v19.0
    pub api_version: String,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            base_url: "https://graph.facebook.com".to_string(),
            api_version: "v19.0".to_string(),
        }
    }
}

/// Response from the Graph API
#[derive(Debug, Deserialize)]
struct GraphResponse {
    id: Option<String>,
    post_id: Option<String>,
    error: Option<GraphError>,
}

#[derive(Debug, Deserialize)]
struct GraphError {
    message: String,
    code: Option<i64>,
}

/// Graph API client
pub struct GraphClient {
    config: GraphConfig,
    client: reqwest::Client,
}

impl GraphClient {
    pub fn new(config: GraphConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Build API URL
    fn api_url(&self, path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.api_version,
            path
        )
    }

    /// Decode a Graph response, turning error envelopes into `PlatformError`
    async fn read(response: reqwest::Response) -> Result<GraphResponse, PlatformError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PlatformError::new(format!("Failed to read response: {}", e)))?;

        let parsed: GraphResponse = serde_json::from_str(&body).map_err(|_| {
            PlatformError::new(format!(
                "Unexpected response (status {}): {}",
                status.as_u16(),
                body.chars().take(200).collect::<String>()
            ))
        })?;

        if let Some(error) = parsed.error {
            let err = PlatformError::new(error.message);
            return Err(match error.code {
                Some(code) => err.with_code(code),
                None => err,
            });
        }

        if !status.is_success() {
            return Err(PlatformError::new(format!("HTTP {}", status.as_u16()))
                .with_code(status.as_u16() as i64));
        }

        Ok(parsed)
    }
}

/// JSON body for the feed endpoint
pub(crate) fn post_body(post: &PostRequest, access_token: &str) -> serde_json::Value {
    let mut body = json!({
        "message": post.message,
        "published": post.mode.published_flag(),
        "access_token": access_token,
    });

    if let Some(ref media_id) = post.media_id {
        body["attached_media"] = json!([{ "media_fbid": media_id }]);
    }

    if let Some(timestamp) = post.mode.scheduled_time() {
        body["scheduled_publish_time"] = json!(timestamp);
    }

    body
}

#[async_trait]
impl PlatformClient for GraphClient {
    async fn upload_media(
        &self,
        page: &PageTarget,
        media: &MediaPayload,
    ) -> Result<String, PlatformError> {
        let url = self.api_url(&format!("{}/photos", page.page_id));

        let file_part = Part::bytes(media.bytes.clone())
            .file_name(media.file_name())
            .mime_str(&media.mime_type)
            .map_err(|e| PlatformError::new(format!("Invalid media type: {}", e)))?;

        let form = Form::new()
            .text("published", "false")
            .text("access_token", page.access_token.clone())
            .part("source", file_part);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| PlatformError::new(format!("Failed to upload media: {}", e)))?;

        Self::read(response)
            .await?
            .id
            .ok_or_else(|| PlatformError::new("Upload response has no media id"))
    }

    async fn create_post(
        &self,
        page: &PageTarget,
        post: &PostRequest,
    ) -> Result<String, PlatformError> {
        let url = self.api_url(&format!("{}/feed", page.page_id));

        let response = self
            .client
            .post(&url)
            .json(&post_body(post, &page.access_token))
            .send()
            .await
            .map_err(|e| PlatformError::new(format!("Failed to create post: {}", e)))?;

        let parsed = Self::read(response).await?;
        parsed
            .post_id
            .or(parsed.id)
            .ok_or_else(|| PlatformError::new("Post response has no post id"))
    }

    async fn create_follow_up(
        &self,
        page: &PageTarget,
        post_id: &str,
        text: &str,
    ) -> Result<(), PlatformError> {
        let url = self.api_url(&format!("{}/comments", post_id));

        let response = self
            .client
            .post(&url)
            .json(&json!({
                "message": text,
                "access_token": page.access_token,
            }))
            .send()
            .await
            .map_err(|e| PlatformError::new(format!("Failed to add comment: {}", e)))?;

        Self::read(response).await.map(|_| ())
    }
}
