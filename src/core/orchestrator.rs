//! Main orchestrator for content runs.
//!
//! Coordinates the generation chain, the image quality gate and the
//! publishing coordinator, recording each stage in the run's step ledger.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use crate::adapters::{GenerativeService, ImageDownloader, PlatformClient};
use crate::domain::{PublishReport, Run, RunParams, RunState, Stage};

use super::cancel::CancellationToken;
use super::chain::ContentChain;
use super::error::PipelineError;
use super::gate::{GateModels, QualityGate};
use super::language::LanguagePolicy;
use super::policy::{GatePolicy, Limits, PublishPolicy};
use super::publisher::Publisher;
use super::schedule::validate_schedule_input;

/// Model ids for each kind of generation call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelIds {
    /// Topic, text, prompts, descriptions
    #[serde(default = "default_text_model")]
    pub text: String,

    /// Image generation
    #[serde(default = "default_image_model")]
    pub image: String,

    /// Image scoring (multimodal)
    #[serde(default = "default_scoring_model")]
    pub scoring: String,
}

fn default_text_model() -> String {
    "gemini-2.0-flash".to_string()
}
fn default_image_model() -> String {
    "gemini-2.0-flash-preview-image-generation".to_string()
}
fn default_scoring_model() -> String {
    "gemini-2.0-flash".to_string()
}

impl Default for ModelIds {
    fn default() -> Self {
        Self {
            text: default_text_model(),
            image: default_image_model(),
            scoring: default_scoring_model(),
        }
    }
}

/// Everything the pipeline needs besides its collaborators
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub models: ModelIds,
    pub gate: GatePolicy,
    pub publishing: PublishPolicy,
    pub limits: Limits,
}

/// External collaborators
#[derive(Clone)]
pub struct Services {
    pub generative: Arc<dyn GenerativeService>,
    pub platform: Arc<dyn PlatformClient>,
    pub downloader: Arc<dyn ImageDownloader>,
}

/// Main content pipeline orchestrator
pub struct Orchestrator {
    chain: ContentChain,
    gate: QualityGate,
    publisher: Publisher,
}

impl Orchestrator {
    /// Create an orchestrator over the given collaborators
    pub fn new(services: Services, config: PipelineConfig) -> Self {
        let timeout = config.limits.remote_call_timeout();

        Self {
            chain: ContentChain::new(
                services.generative.clone(),
                config.models.text.clone(),
                timeout,
            ),
            gate: QualityGate::new(
                services.generative,
                services.downloader.clone(),
                GateModels {
                    image: config.models.image,
                    scoring: config.models.scoring,
                    text: config.models.text,
                },
                config.gate,
                timeout,
            ),
            publisher: Publisher::new(
                services.platform,
                services.downloader,
                config.publishing,
                timeout,
            ),
        }
    }

    /// Execute one run to a terminal state
    #[instrument(skip_all, fields(subject = %params.subject, language = %params.language))]
    pub async fn run(&self, params: RunParams, cancel: &CancellationToken) -> Run {
        let mut run = Run::new(params);
        info!(run_id = %run.id, "Starting content run");

        match self.execute(&mut run, cancel).await {
            Ok(state) => {
                info!(run_id = %run.id, state = ?state, "Run finished");
                run.finish(state);
            }
            Err(e) => self.handle_run_failure(&mut run, e),
        }

        run
    }

    async fn execute(
        &self,
        run: &mut Run,
        cancel: &CancellationToken,
    ) -> Result<RunState, PipelineError> {
        // Fail fast on a bad schedule, before any remote call
        if let Some(ref requested) = run.params.schedule {
            let window = validate_schedule_input(Utc::now(), requested)?;
            info!(epoch_seconds = window.epoch_seconds(), "Schedule accepted");
            run.schedule = Some(window);
        }

        let artifact = self.chain.run(&run.params, &mut run.ledger, cancel).await?;
        run.artifact = Some(artifact.clone());

        let language = LanguagePolicy::lookup(&run.params.language);
        let gate_id = Stage::ImageGate.id();
        run.ledger.begin(gate_id);
        let outcome = self
            .gate
            .run(&artifact, language, &mut run.ledger, cancel)
            .await;
        run.candidates = outcome.candidates.clone();

        if let Some(ref e) = outcome.error {
            return Err(e.clone());
        }
        let accepted = match outcome.accepted() {
            Some(candidate) => candidate.clone(),
            None => {
                return Err(PipelineError::QualityGateExhausted {
                    attempts: run.candidates.len() as u32,
                })
            }
        };
        let gate_detail = format!(
            "accepted attempt {} with score {}",
            accepted.attempt, accepted.score
        );
        run.ledger.complete(gate_id, Some(gate_detail.as_str()));

        if run.params.skip_publish {
            info!("Publishing skipped on request");
            return Ok(RunState::Generated);
        }

        let publish_id = Stage::Publish.id();
        run.ledger.begin(publish_id);
        let post = self
            .publisher
            .publish(
                &run.params.page,
                &accepted,
                &artifact.body,
                run.schedule.as_ref(),
                &mut run.ledger,
                cancel,
            )
            .await?;
        run.ledger.complete(publish_id, Some(post.post_id.as_str()));

        let follow_ups_id = Stage::FollowUps.id();
        run.ledger.begin(follow_ups_id);
        let summary = self
            .publisher
            .post_follow_ups(
                &run.params.page,
                &post.post_id,
                &artifact.prompts,
                &mut run.ledger,
                cancel,
            )
            .await;

        let detail = format!("{} of {} posted", summary.succeeded, summary.total);
        if summary.aborted {
            run.ledger.fail(follow_ups_id, "run aborted");
        } else {
            run.ledger.complete(follow_ups_id, Some(detail.as_str()));
        }
        if summary.succeeded < summary.total {
            warn!(
                succeeded = summary.succeeded,
                total = summary.total,
                "Some follow-ups failed"
            );
        }

        run.report = Some(PublishReport {
            media_id: post.media_id,
            post_id: post.post_id,
            mode: post.mode,
            follow_ups_total: summary.total,
            follow_ups_succeeded: summary.succeeded,
            follow_up_failures: summary.failures,
        });

        if summary.aborted {
            return Err(PipelineError::Aborted {
                stage: Stage::FollowUps,
            });
        }

        Ok(RunState::Published)
    }

    /// Record a fatal error on the ledger and the run state
    fn handle_run_failure(&self, run: &mut Run, error: PipelineError) {
        let stage = error.stage();
        let message = error.to_string();
        error!(run_id = %run.id, %stage, error = %message, "Run failed");

        // Chain stages mark themselves failed
        let already_failed = run
            .ledger
            .status(stage.id())
            .map_or(false, |s| s.is_terminal());
        if !already_failed {
            run.ledger.fail(stage.id(), &message);
        }

        let state = match error {
            PipelineError::QualityGateExhausted { attempts } => {
                RunState::GateExhausted { attempts }
            }
            PipelineError::Aborted { stage } => RunState::Aborted { stage },
            other => RunState::Failed {
                stage,
                error: other.to_string(),
            },
        };
        run.finish(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_models() {
        let models = ModelIds::default();
        assert_eq!(models.text, "gemini-2.0-flash");
        assert!(models.image.contains("image"));
    }

    #[test]
    fn test_partial_model_yaml() {
        let models: ModelIds = serde_yaml::from_str("image: imagen-3").unwrap();
        assert_eq!(models.image, "imagen-3");
        assert_eq!(models.text, default_text_model());
    }
}
