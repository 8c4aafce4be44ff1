//! Plain HTTP image download.

use async_trait::async_trait;

use super::{ImageDownloader, MediaPayload, ServiceError};

/// Downloads remote images with reqwest
#[derive(Debug, Clone, Default)]
pub struct HttpDownloader {
    client: reqwest::Client,
}

impl HttpDownloader {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ImageDownloader for HttpDownloader {
    async fn download(&self, url: &str) -> Result<MediaPayload, ServiceError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::api(
                status.as_u16(),
                format!("image download failed for {}", url),
            ));
        }

        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .filter(|v| v.starts_with("image/"))
            .unwrap_or_else(|| "image/png".to_string());

        let bytes = response.bytes().await?.to_vec();
        if bytes.is_empty() {
            return Err(ServiceError::Parse(format!("empty image body from {}", url)));
        }

        Ok(MediaPayload::new(mime_type, bytes))
    }
}
