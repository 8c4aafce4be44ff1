//! Pipeline error taxonomy.
//!
//! Every fatal error names the stage it came from. `FollowUpFailed` is only
//! ever collected into a publish report; it never aborts a run.

use thiserror::Error;

use crate::domain::Stage;

/// Why a requested publish time was refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleRejection {
    #[error("could not parse '{input}' as a date and time")]
    Unparsable { input: String },

    #[error("the requested time is in the past")]
    InPast,

    #[error("too soon: posts must be scheduled at least {min_minutes} minutes ahead")]
    TooSoon { min_minutes: i64 },

    #[error("too far: posts can be scheduled at most {max_days} days ahead")]
    TooFar { max_days: i64 },

    #[error("scheduled timestamp {timestamp} is not after the current time {now}")]
    NotInFuture { timestamp: i64, now: i64 },
}

/// Errors that stop a run (plus the non-fatal follow-up failure)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// The service answered without usable content
    #[error("{stage}: the generator returned no usable content")]
    GenerationEmpty { stage: Stage },

    /// Transport, auth, quota or timeout failure of a remote call
    #[error("{stage}: generation request failed: {message}")]
    GenerationRequestFailed { stage: Stage, message: String },

    /// Every image attempt scored below the threshold
    #[error("image_gate: all {attempts} image attempts were rejected")]
    QualityGateExhausted { attempts: u32 },

    /// The image could not be prepared or uploaded
    #[error("publish: media upload failed: {message}")]
    UploadFailed { message: String },

    /// Upload succeeded but the post was not created
    #[error("publish: post creation failed (uploaded media {media_id} is unused): {message}")]
    PostCreationFailed { media_id: String, message: String },

    /// A follow-up comment was not posted
    #[error("follow_ups: follow-up {index} failed: {message}")]
    FollowUpFailed { index: usize, message: String },

    #[error("publish: invalid schedule: {0}")]
    ScheduleInvalid(#[from] ScheduleRejection),

    /// The run was cancelled
    #[error("{stage}: run aborted")]
    Aborted { stage: Stage },
}

impl PipelineError {
    pub fn request_failed(stage: Stage, message: impl Into<String>) -> Self {
        Self::GenerationRequestFailed {
            stage,
            message: message.into(),
        }
    }

    /// The stage this error belongs to
    pub fn stage(&self) -> Stage {
        match self {
            Self::GenerationEmpty { stage }
            | Self::GenerationRequestFailed { stage, .. }
            | Self::Aborted { stage } => *stage,
            Self::QualityGateExhausted { .. } => Stage::ImageGate,
            Self::UploadFailed { .. }
            | Self::PostCreationFailed { .. }
            | Self::ScheduleInvalid(_) => Stage::Publish,
            Self::FollowUpFailed { .. } => Stage::FollowUps,
        }
    }

    /// Only follow-up failures let the run continue
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::FollowUpFailed { .. })
    }
}
