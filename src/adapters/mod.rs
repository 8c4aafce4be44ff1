//! Adapter interfaces for external systems.
//!
//! The pipeline talks to three collaborators, each behind a trait:
//! - `GenerativeService`: text/image generation (credential rotation lives here)
//! - `PlatformClient`: media upload, post creation, follow-up comments
//! - `ImageDownloader`: fetches remote images as bytes

pub mod gemini;
pub mod graph;
pub mod http;
pub mod key_pool;
pub mod payload;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{PageTarget, PublishMode};

// Re-export the concrete adapters
pub use gemini::{GeminiClient, GeminiConfig};
pub use graph::{GraphClient, GraphConfig};
pub use http::HttpDownloader;
pub use key_pool::KeyPool;
pub use payload::{GenerateRequest, GenerateResponse, InlineData, Part};

/// Errors from remote service calls
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Transport-level failure
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service answered with an error status
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Response body could not be decoded
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// No credential left to try
    #[error("No usable API key: {0}")]
    NoCredentials(String),
}

impl ServiceError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Auth, quota and server errors move the key pool to the next key
    pub fn is_rotatable(&self) -> bool {
        match self {
            Self::Api { status, .. } => matches!(*status, 401 | 403 | 429) || *status >= 500,
            Self::Request(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

/// Error object returned by the publishing platform
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct PlatformError {
    pub message: String,
    pub code: Option<i64>,
}

impl PlatformError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(mut self, code: i64) -> Self {
        self.code = Some(code);
        self
    }
}

impl From<ServiceError> for PlatformError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::Api { status, message } => Self::new(message).with_code(status as i64),
            other => Self::new(other.to_string()),
        }
    }
}

/// Binary media ready for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPayload {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl MediaPayload {
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// File name used in multipart uploads
    pub fn file_name(&self) -> String {
        let ext = match self.mime_type.as_str() {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/webp" => "webp",
            "image/gif" => "gif",
            _ => "png",
        };
        format!("image.{}", ext)
    }
}

/// Body of a post creation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRequest {
    pub message: String,
    pub media_id: Option<String>,
    pub mode: PublishMode,
}

/// Generative model access
#[async_trait]
pub trait GenerativeService: Send + Sync {
    /// Human-readable service name
    fn name(&self) -> &str;

    /// Issue one generation request against `model`
    async fn generate(
        &self,
        model: &str,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse, ServiceError>;
}

/// Publishing platform access
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Upload media without publishing it; returns the media handle
    async fn upload_media(
        &self,
        page: &PageTarget,
        media: &MediaPayload,
    ) -> Result<String, PlatformError>;

    /// Create a post; returns the post handle
    async fn create_post(
        &self,
        page: &PageTarget,
        post: &PostRequest,
    ) -> Result<String, PlatformError>;

    /// Attach a follow-up comment to a post
    async fn create_follow_up(
        &self,
        page: &PageTarget,
        post_id: &str,
        text: &str,
    ) -> Result<(), PlatformError>;
}

/// Fetches remote images
#[async_trait]
pub trait ImageDownloader: Send + Sync {
    async fn download(&self, url: &str) -> Result<MediaPayload, ServiceError>;
}
