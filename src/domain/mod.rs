//! Domain types for the content pipeline.
//!
//! This module contains the core data structures:
//! - Step / StepLedger: stage status and timing
//! - GeneratedArtifact: text content produced by the chain
//! - ImageCandidate: scored image attempts
//! - ScheduleWindow / PublishMode: publish timing
//! - Run: one pipeline execution

pub mod artifact;
pub mod candidate;
pub mod ledger;
pub mod run;
pub mod schedule;
pub mod step;

// Re-export commonly used types
pub use artifact::GeneratedArtifact;
pub use candidate::{ImageCandidate, ImageRef, Verdict};
pub use ledger::StepLedger;
pub use run::{FollowUpFailure, PageTarget, PublishReport, Run, RunParams, RunState};
pub use schedule::{PublishMode, ScheduleWindow};
pub use step::{PipelineStep, Stage, StepStatus};
