//! autopub - AI content pipeline for social media pages
//!
//! Generates a post (topic, body text, follow-up questions and an image
//! description) with a generative model, produces an image and vets it
//! through a scored quality gate, then publishes the post with its image
//! (now or at a scheduled time) and adds the follow-up questions as
//! comments.
//!
//! # Architecture
//!
//! A run moves through fixed stages, each recorded in a step ledger:
//! - topic -> text -> prompts -> image description (content chain)
//! - image generation and scoring with bounded retries (quality gate)
//! - media upload and post creation, then paced follow-ups (publisher)
//!
//! # Modules
//!
//! - `adapters`: External services (Gemini, Graph API, image download)
//! - `core`: Pipeline logic (chain, gate, publisher, orchestrator, policies)
//! - `domain`: Data structures (Run, StepLedger, GeneratedArtifact, ImageCandidate)
//! - `config`: YAML and environment configuration
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Generate and publish now
//! autopub run --subject "coffee shops" --category marketing --language Arabic
//!
//! # Schedule for later
//! autopub run -s "coffee shops" -c tips --schedule "2026-11-02 09:30"
//!
//! # Check a publish time
//! autopub check-schedule 2026-11-02T09:30:00Z
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;

// Re-export main types at crate root for convenience
pub use core::{CancellationToken, Orchestrator, PipelineConfig, PipelineError, Services};
pub use domain::{Run, RunParams, RunState, Stage, StepLedger};
