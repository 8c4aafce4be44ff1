//! Run state for a single pipeline execution.
//!
//! A Run is created when a user triggers the pipeline and dropped when its
//! owner is done with it. Nothing here is persisted.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::artifact::GeneratedArtifact;
use super::candidate::ImageCandidate;
use super::ledger::StepLedger;
use super::schedule::{PublishMode, ScheduleWindow};
use super::step::Stage;

/// Target page and its credentials
#[derive(Clone, Serialize, Deserialize)]
pub struct PageTarget {
    pub page_id: String,

    /// Page access token (never serialized or logged)
    #[serde(skip_serializing, default)]
    pub access_token: String,
}

impl PageTarget {
    pub fn new(page_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            page_id: page_id.into(),
            access_token: access_token.into(),
        }
    }
}

impl fmt::Debug for PageTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageTarget")
            .field("page_id", &self.page_id)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Inputs chosen by the user when starting a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunParams {
    /// Subject domain (e.g. "coffee shops")
    pub subject: String,

    /// Content category (e.g. "marketing")
    pub category: String,

    /// Target language identifier (e.g. "Arabic", "fr")
    pub language: String,

    /// Page to publish on
    pub page: PageTarget,

    /// Requested publish time; `None` publishes immediately
    pub schedule: Option<String>,

    /// Stop after the image gate without publishing
    #[serde(default)]
    pub skip_publish: bool,
}

impl RunParams {
    pub fn new(
        subject: impl Into<String>,
        category: impl Into<String>,
        language: impl Into<String>,
        page: PageTarget,
    ) -> Self {
        Self {
            subject: subject.into(),
            category: category.into(),
            language: language.into(),
            page,
            schedule: None,
            skip_publish: false,
        }
    }

    pub fn with_schedule(mut self, schedule: impl Into<String>) -> Self {
        self.schedule = Some(schedule.into());
        self
    }

    pub fn without_publishing(mut self) -> Self {
        self.skip_publish = true;
        self
    }
}

/// A follow-up that could not be posted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowUpFailure {
    /// 0-indexed position in the prompt list
    pub index: usize,
    pub text: String,
    pub error: String,
}

/// Outcome of the publishing stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishReport {
    /// Handle returned by the media upload
    pub media_id: String,

    /// Handle of the created post
    pub post_id: String,

    pub mode: PublishMode,

    /// Follow-ups attempted
    pub follow_ups_total: usize,

    /// Follow-ups that went through
    pub follow_ups_succeeded: usize,

    pub follow_up_failures: Vec<FollowUpFailure>,
}

impl PublishReport {
    /// The post is live (or scheduled) but some follow-ups failed
    pub fn is_partial(&self) -> bool {
        self.follow_ups_succeeded < self.follow_ups_total
    }
}

/// State of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum RunState {
    /// Currently executing
    Running,

    /// Content and image ready, publishing skipped on request
    Generated,

    /// Post created (follow-ups may have partially failed)
    Published,

    /// Every image attempt was rejected; nothing was published
    GateExhausted { attempts: u32 },

    /// A stage failed
    Failed { stage: Stage, error: String },

    /// Cancelled before completion
    Aborted { stage: Stage },
}

impl Default for RunState {
    fn default() -> Self {
        Self::Running
    }
}

/// A pipeline execution run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    /// Unique identifier for this run
    pub id: Uuid,

    pub params: RunParams,

    pub state: RunState,

    pub ledger: StepLedger,

    /// Final artifact of the generation chain
    pub artifact: Option<GeneratedArtifact>,

    /// Every image attempt, in order
    pub candidates: Vec<ImageCandidate>,

    /// Validated publish time, for scheduled runs
    pub schedule: Option<ScheduleWindow>,

    pub report: Option<PublishReport>,

    pub started_at: DateTime<Utc>,

    pub completed_at: Option<DateTime<Utc>>,
}

impl Run {
    /// Create a new run with every stage pending
    pub fn new(params: RunParams) -> Self {
        Self {
            id: Uuid::new_v4(),
            params,
            state: RunState::Running,
            ledger: StepLedger::for_pipeline(),
            artifact: None,
            candidates: Vec::new(),
            schedule: None,
            report: None,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// The candidate eligible for publishing: the last accepted one
    pub fn accepted_candidate(&self) -> Option<&ImageCandidate> {
        self.candidates.iter().rev().find(|c| c.is_accepted())
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, RunState::Running)
    }

    pub fn is_finished(&self) -> bool {
        !self.is_running()
    }

    /// Run ended without reaching its goal
    pub fn is_failure(&self) -> bool {
        matches!(
            self.state,
            RunState::Failed { .. } | RunState::GateExhausted { .. } | RunState::Aborted { .. }
        )
    }

    /// Post published but some follow-ups failed
    pub fn is_partial_success(&self) -> bool {
        self.state == RunState::Published
            && self.report.as_ref().map_or(false, |r| r.is_partial())
    }

    /// Move to a terminal state
    pub fn finish(&mut self, state: RunState) {
        self.state = state;
        self.completed_at = Some(Utc::now());
    }
}
