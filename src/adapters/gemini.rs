//! Gemini `generateContent` client with API key rotation.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use super::key_pool::KeyPool;
use super::payload::{GenerateRequest, GenerateResponse};
use super::{GenerativeService, ServiceError};

/// Connection settings for the Gemini REST API
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// e.g. https://generativelanguage.googleapis.com
    pub base_url: String,

    /// Transport timeout for a single HTTP request
    pub request_timeout: Duration,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            request_timeout: Duration::from_secs(120),
        }
    }
}

/// Error envelope returned by the API
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Gemini client; rotates through its key pool on auth/quota/server errors
pub struct GeminiClient {
    config: GeminiConfig,
    keys: KeyPool,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig, keys: KeyPool) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            config,
            keys,
            client,
        })
    }

    /// Build the endpoint URL for a model
    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            model
        )
    }

    async fn call(
        &self,
        model: &str,
        request: &GenerateRequest,
        key: &str,
    ) -> Result<GenerateResponse, ServiceError> {
        let response = self
            .client
            .post(self.endpoint(model))
            .header("x-goog-api-key", key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| body.chars().take(200).collect());
            return Err(ServiceError::api(status.as_u16(), message));
        }

        serde_json::from_str(&body).map_err(|e| ServiceError::Parse(e.to_string()))
    }
}

#[async_trait]
impl GenerativeService for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(
        &self,
        model: &str,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse, ServiceError> {
        with_key_rotation(&self.keys, model, move |key| async move {
            self.call(model, request, &key).await
        })
        .await
    }
}

/// Try `attempt` with the active key, rotating on auth/quota/server errors.
///
/// Each key gets at most one try. Non-rotatable errors are returned at once.
async fn with_key_rotation<T, F, Fut>(
    keys: &KeyPool,
    model: &str,
    mut attempt: F,
) -> Result<T, ServiceError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    let mut last_error = None;

    for _ in 0..keys.len() {
        let Some((index, key)) = keys.current() else {
            break;
        };

        match attempt(key.to_string()).await {
            Ok(value) => {
                debug!(model, key_index = index, "Generation request succeeded");
                return Ok(value);
            }
            Err(e) if e.is_rotatable() => {
                warn!(model, key_index = index, error = %e, "Key failed, rotating");
                keys.rotate_from(index);
                last_error = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(match last_error {
        Some(ServiceError::Api { status, message }) => ServiceError::NoCredentials(format!(
            "every key failed, last error (status {}): {}",
            status, message
        )),
        Some(other) => other,
        None => ServiceError::NoCredentials("key pool is empty".to_string()),
    })
}
