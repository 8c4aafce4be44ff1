//! Core pipeline logic.
//!
//! This module contains:
//! - ContentChain: topic, text, prompts and image description generation
//! - QualityGate: image generate/score/retry state machine
//! - Publisher: media upload, post creation, paced follow-ups
//! - Orchestrator: runs the stages in order and records the ledger
//! - Policies: thresholds, retries, pacing, scheduling bounds, languages

pub mod cancel;
pub mod chain;
pub mod error;
pub mod gate;
pub mod language;
pub mod markup;
pub mod media;
pub mod orchestrator;
pub mod policy;
pub mod publisher;
pub mod remote;
pub mod schedule;
pub mod scoring;

// Re-export commonly used types
pub use cancel::CancellationToken;
pub use chain::{ContentChain, PromptContext};
pub use error::{PipelineError, ScheduleRejection};
pub use gate::{GateModels, GateOutcome, GateState, QualityGate};
pub use language::LanguagePolicy;
pub use markup::strip_markup;
pub use orchestrator::{ModelIds, Orchestrator, PipelineConfig, Services};
pub use policy::{GatePolicy, Limits, PublishPolicy};
pub use publisher::{FollowUpSummary, PublishedPost, Publisher};
pub use schedule::{parse_schedule, validate_schedule, validate_schedule_input};
pub use scoring::{parse_score, Score, ScoreSource};
