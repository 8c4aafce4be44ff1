//! Publish timing: immediate or scheduled for a validated future instant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A validated future publish instant.
///
/// Only produced by `core::schedule::validate_schedule`, which guarantees
/// `now + 10min <= instant <= now + 75 days` at validation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleWindow {
    instant: DateTime<Utc>,
    epoch_seconds: i64,
}

impl ScheduleWindow {
    pub(crate) fn new(instant: DateTime<Utc>, epoch_seconds: i64) -> Self {
        Self {
            instant,
            epoch_seconds,
        }
    }

    /// The absolute publish instant
    pub fn instant(&self) -> DateTime<Utc> {
        self.instant
    }

    /// Platform timestamp (seconds since the Unix epoch)
    pub fn epoch_seconds(&self) -> i64 {
        self.epoch_seconds
    }
}

/// How a post goes live.
///
/// The two variants map to mutually exclusive request shapes:
/// `published=true`, or `published=false` with a scheduled timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum PublishMode {
    Immediate,
    Scheduled { window: ScheduleWindow },
}

impl PublishMode {
    /// Value of the platform's `published` flag
    pub fn published_flag(&self) -> bool {
        matches!(self, Self::Immediate)
    }

    /// Scheduled timestamp, only for deferred posts
    pub fn scheduled_time(&self) -> Option<i64> {
        match self {
            Self::Immediate => None,
            Self::Scheduled { window } => Some(window.epoch_seconds()),
        }
    }
}
