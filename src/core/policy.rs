//! Policy settings for a pipeline run.
//!
//! Covers the image gate thresholds, follow-up pacing and remote-call
//! timeouts. All fields have serde defaults so config files can set any
//! subset.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Minimum score (0-100) for an image to be accepted
pub const ACCEPT_THRESHOLD: u8 = 75;

/// Regenerations allowed after the first attempt
pub const MAX_RETRIES: u32 = 3;

/// Upper bound accepted for `max_retries` from configuration
pub const MAX_RETRIES_LIMIT: u32 = 20;

/// Score used when the scorer's answer has no readable number
pub const FALLBACK_SCORE: u8 = 0;

/// Lower bound on the delay between follow-up submissions
pub const MIN_FOLLOW_UP_DELAY_MS: u64 = 1000;

/// Maximum interactive prompts kept per post
pub const MAX_PROMPTS: usize = 3;

/// Prompt lines shorter than this (in characters) are dropped
pub const MIN_PROMPT_CHARS: usize = 10;

/// Image quality gate policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatePolicy {
    /// Score at or above which an image is accepted (default: 75)
    #[serde(default = "default_accept_threshold")]
    pub accept_threshold: u8,

    /// Regenerations after the first attempt (default: 3)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Score assumed when the scorer's output is unreadable (default: 0)
    #[serde(default = "default_fallback_score")]
    pub fallback_score: u8,
}

fn default_accept_threshold() -> u8 {
    ACCEPT_THRESHOLD
}
fn default_max_retries() -> u32 {
    MAX_RETRIES
}
fn default_fallback_score() -> u8 {
    FALLBACK_SCORE
}

impl Default for GatePolicy {
    fn default() -> Self {
        Self {
            accept_threshold: default_accept_threshold(),
            max_retries: default_max_retries(),
            fallback_score: default_fallback_score(),
        }
    }
}

impl GatePolicy {
    /// Upper bound on image generation calls
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Copy with `max_retries` capped at `MAX_RETRIES_LIMIT`
    pub fn bounded(self) -> Self {
        Self {
            max_retries: self.max_retries.min(MAX_RETRIES_LIMIT),
            ..self
        }
    }

    pub fn accepts(&self, score: u8) -> bool {
        score >= self.accept_threshold
    }

    /// Fallback score, kept strictly below the threshold
    pub fn effective_fallback(&self) -> u8 {
        if self.accepts(self.fallback_score) {
            self.accept_threshold.saturating_sub(1)
        } else {
            self.fallback_score
        }
    }
}

/// Publishing policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishPolicy {
    /// Delay between follow-up submissions in milliseconds (default: 1500)
    #[serde(default = "default_follow_up_delay")]
    pub follow_up_delay_ms: u64,
}

fn default_follow_up_delay() -> u64 {
    1500
}

impl Default for PublishPolicy {
    fn default() -> Self {
        Self {
            follow_up_delay_ms: default_follow_up_delay(),
        }
    }
}

impl PublishPolicy {
    /// Follow-up delay, never below one second
    pub fn follow_up_delay(&self) -> Duration {
        Duration::from_millis(self.follow_up_delay_ms.max(MIN_FOLLOW_UP_DELAY_MS))
    }
}

/// Timeouts imposed on remote calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    /// Per remote call timeout in seconds (default: 180)
    #[serde(default = "default_remote_call_timeout")]
    pub remote_call_timeout_seconds: u64,
}

fn default_remote_call_timeout() -> u64 {
    180
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            remote_call_timeout_seconds: default_remote_call_timeout(),
        }
    }
}

impl Limits {
    pub fn remote_call_timeout(&self) -> Duration {
        Duration::from_secs(self.remote_call_timeout_seconds)
    }
}
