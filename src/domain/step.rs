//! Pipeline steps as recorded by the step ledger.
//!
//! A step is one named stage of a run. Steps are created `Pending` when the
//! run is initialized and end in `Completed` or `Failed`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The fixed stages of a content run, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Topic,
    Text,
    Prompts,
    ImageDescription,
    ImageGate,
    Publish,
    FollowUps,
}

impl Stage {
    /// All stages in execution order
    pub const ALL: [Stage; 7] = [
        Stage::Topic,
        Stage::Text,
        Stage::Prompts,
        Stage::ImageDescription,
        Stage::ImageGate,
        Stage::Publish,
        Stage::FollowUps,
    ];

    /// Stable step id used in the ledger
    pub fn id(&self) -> &'static str {
        match self {
            Self::Topic => "topic",
            Self::Text => "text",
            Self::Prompts => "prompts",
            Self::ImageDescription => "image_description",
            Self::ImageGate => "image_gate",
            Self::Publish => "publish",
            Self::FollowUps => "follow_ups",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::Topic => "Choose a topic",
            Self::Text => "Write the post",
            Self::Prompts => "Write discussion prompts",
            Self::ImageDescription => "Describe the image",
            Self::ImageGate => "Generate and review the image",
            Self::Publish => "Upload and publish",
            Self::FollowUps => "Post follow-up comments",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Status of a pipeline step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Not yet started
    Pending,

    /// Currently executing
    Running,

    /// Completed successfully
    Completed,

    /// Failed (with error)
    Failed,
}

impl Default for StepStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl StepStatus {
    /// Completed and Failed are final
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// One stage of a pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineStep {
    /// Stable identifier, unique within a run
    pub id: String,

    /// Human label (display only)
    pub title: String,

    /// Current status
    pub status: StepStatus,

    /// Progress percentage (0-100) while running
    pub progress: Option<u8>,

    /// Free-text detail about the latest transition
    pub detail: Option<String>,

    /// Error message if failed
    pub error_message: Option<String>,

    /// When the step began running
    pub started_at: Option<DateTime<Utc>>,

    /// When the step reached a terminal state
    pub finished_at: Option<DateTime<Utc>>,
}

impl PipelineStep {
    /// Create a pending step
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            status: StepStatus::Pending,
            progress: None,
            detail: None,
            error_message: None,
            started_at: None,
            finished_at: None,
        }
    }

    /// Time between start and finish, once both are set
    pub fn duration(&self) -> Option<chrono::Duration> {
        match (self.started_at, self.finished_at) {
            (Some(started), Some(finished)) => Some(finished - started),
            _ => None,
        }
    }

    /// Duration in milliseconds (for display)
    pub fn duration_ms(&self) -> Option<u64> {
        self.duration().map(|d| d.num_milliseconds().max(0) as u64)
    }
}
