//! Conversions between image references and bytes.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::adapters::{ImageDownloader, MediaPayload, ServiceError};
use crate::domain::ImageRef;

/// Turn an image reference into uploadable bytes.
///
/// Inline references are decoded; remote URLs are downloaded.
pub async fn to_payload(
    image: &ImageRef,
    downloader: &dyn ImageDownloader,
) -> Result<MediaPayload, ServiceError> {
    if let Some((mime_type, data)) = image.inline_parts() {
        let bytes = STANDARD
            .decode(data.trim())
            .map_err(|e| ServiceError::Parse(format!("invalid inline image data: {}", e)))?;
        if bytes.is_empty() {
            return Err(ServiceError::Parse("inline image is empty".to_string()));
        }
        return Ok(MediaPayload::new(mime_type, bytes));
    }

    if image.is_remote() {
        return downloader.download(image.as_str()).await;
    }

    Err(ServiceError::Parse(format!(
        "unsupported image reference: {}",
        image
    )))
}

/// Turn an image reference into (mime type, base64 data) for a model request
pub async fn to_inline(
    image: &ImageRef,
    downloader: &dyn ImageDownloader,
) -> Result<(String, String), ServiceError> {
    if let Some((mime_type, data)) = image.inline_parts() {
        return Ok((mime_type.to_string(), data.to_string()));
    }

    let payload = to_payload(image, downloader).await?;
    Ok((payload.mime_type, STANDARD.encode(&payload.bytes)))
}
