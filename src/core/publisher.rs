//! Publishing coordinator.
//!
//! Uploads the accepted image, creates the post (immediate or scheduled),
//! then posts follow-up comments one at a time with a fixed pause between
//! them. Upload and post failures are fatal; follow-up failures are counted.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::adapters::{ImageDownloader, PlatformClient, PlatformError, PostRequest};
use crate::domain::{
    FollowUpFailure, ImageCandidate, PageTarget, PublishMode, ScheduleWindow, Stage, StepLedger,
};

use super::cancel::CancellationToken;
use super::error::PipelineError;
use super::media;
use super::policy::PublishPolicy;
use super::schedule::validate_schedule;

/// Handles of a created post
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedPost {
    pub media_id: String,
    pub post_id: String,
    pub mode: PublishMode,
}

/// Result of the follow-up phase
#[derive(Debug, Clone, Default)]
pub struct FollowUpSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failures: Vec<FollowUpFailure>,

    /// Stopped early because the run was cancelled
    pub aborted: bool,
}

impl FollowUpSummary {
    /// Failures as pipeline errors
    pub fn errors(&self) -> Vec<PipelineError> {
        self.failures
            .iter()
            .map(|f| PipelineError::FollowUpFailed {
                index: f.index,
                message: f.error.clone(),
            })
            .collect()
    }
}

/// Uploads media, creates posts, adds follow-ups
pub struct Publisher {
    platform: Arc<dyn PlatformClient>,
    downloader: Arc<dyn ImageDownloader>,
    policy: PublishPolicy,
    timeout: Duration,
}

impl Publisher {
    pub fn new(
        platform: Arc<dyn PlatformClient>,
        downloader: Arc<dyn ImageDownloader>,
        policy: PublishPolicy,
        timeout: Duration,
    ) -> Self {
        Self {
            platform,
            downloader,
            policy,
            timeout,
        }
    }

    /// Run a platform call under the remote-call timeout
    async fn bounded<T, F>(&self, call: F) -> Result<T, PlatformError>
    where
        F: Future<Output = Result<T, PlatformError>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(PlatformError::new(format!(
                "timed out after {}s",
                self.timeout.as_secs()
            ))),
        }
    }

    /// Upload the accepted image and create the post.
    ///
    /// Scheduled windows are re-validated against the current time before
    /// anything is uploaded.
    pub async fn publish(
        &self,
        page: &PageTarget,
        candidate: &ImageCandidate,
        message: &str,
        schedule: Option<&ScheduleWindow>,
        ledger: &mut StepLedger,
        cancel: &CancellationToken,
    ) -> Result<PublishedPost, PipelineError> {
        let stage_id = Stage::Publish.id();

        let mode = match schedule {
            Some(window) => PublishMode::Scheduled {
                window: validate_schedule(Utc::now(), window.instant())?,
            },
            None => PublishMode::Immediate,
        };

        cancel.check(Stage::Publish)?;
        let payload = media::to_payload(&candidate.image, self.downloader.as_ref())
            .await
            .map_err(|e| PipelineError::UploadFailed {
                message: format!("could not prepare image: {}", e),
            })?;
        ledger.progress(stage_id, 20, Some("image ready"));

        cancel.check(Stage::Publish)?;
        let media_id = self
            .bounded(self.platform.upload_media(page, &payload))
            .await
            .map_err(|e| PipelineError::UploadFailed { message: e.message })?;
        info!(%media_id, bytes = payload.bytes.len(), "Media uploaded");
        let uploaded = format!("media {} uploaded", media_id);
        ledger.progress(stage_id, 60, Some(uploaded.as_str()));

        if let Err(e) = cancel.check(Stage::Publish) {
            warn!(%media_id, "Run aborted after upload, media is unused");
            return Err(e);
        }
        let request = PostRequest {
            message: message.to_string(),
            media_id: Some(media_id.clone()),
            mode,
        };
        let post_id = self
            .bounded(self.platform.create_post(page, &request))
            .await
            .map_err(|e| {
                error!(%media_id, error = %e, "Post creation failed after upload");
                PipelineError::PostCreationFailed {
                    media_id: media_id.clone(),
                    message: e.message,
                }
            })?;
        info!(%post_id, scheduled = ?mode.scheduled_time(), "Post created");

        Ok(PublishedPost {
            media_id,
            post_id,
            mode,
        })
    }

    /// Post each prompt as a comment, pausing between submissions
    pub async fn post_follow_ups(
        &self,
        page: &PageTarget,
        post_id: &str,
        prompts: &[String],
        ledger: &mut StepLedger,
        cancel: &CancellationToken,
    ) -> FollowUpSummary {
        let stage_id = Stage::FollowUps.id();
        let delay = self.policy.follow_up_delay();
        let mut summary = FollowUpSummary {
            total: prompts.len(),
            ..Default::default()
        };

        for (index, text) in prompts.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(delay).await;
            }

            if cancel.is_cancelled() {
                summary.aborted = true;
                summary
                    .failures
                    .extend(prompts.iter().enumerate().skip(index).map(|(i, t)| {
                        FollowUpFailure {
                            index: i,
                            text: t.clone(),
                            error: "run aborted".to_string(),
                        }
                    }));
                break;
            }

            match self
                .bounded(self.platform.create_follow_up(page, post_id, text))
                .await
            {
                Ok(()) => {
                    summary.succeeded += 1;
                    info!(index, "Follow-up posted");
                }
                Err(e) => {
                    warn!(index, error = %e, "Follow-up failed");
                    summary.failures.push(FollowUpFailure {
                        index,
                        text: text.clone(),
                        error: e.message,
                    });
                }
            }

            let pct = ((index + 1) * 100 / prompts.len().max(1)) as u8;
            let detail = format!("{}/{} posted", summary.succeeded, summary.total);
            ledger.progress(stage_id, pct, Some(detail.as_str()));
        }

        summary
    }
}
