//! Image quality gate.
//!
//! Generates an image from a description, scores it against the post text and
//! accepts it when the score reaches the threshold. Rejected attempts get a
//! new description (steered by the scorer's rationale) until the retry budget
//! is spent.
//!
//! The loop is an explicit state machine:
//!
//! ```text
//! Generating -> Scoring -> Accepted
//!                       -> Rejected -> Generating (attempt + 1)
//!                                   -> Exhausted  (no retries left)
//! ```
//!
//! Credential rotation happens inside the generative service and never
//! counts as an attempt here.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use crate::adapters::{GenerateRequest, GenerativeService, ImageDownloader};
use crate::domain::{GeneratedArtifact, ImageCandidate, ImageRef, Stage, StepLedger, Verdict};

use super::cancel::CancellationToken;
use super::error::PipelineError;
use super::language::LanguagePolicy;
use super::markup::strip_markup;
use super::media;
use super::policy::GatePolicy;
use super::remote;
use super::scoring::{parse_score, ScoreSource};

/// Gate state between two control steps
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateState {
    /// Next: generate an image from `description`
    Generating { attempt: u32, description: String },

    /// Next: score `image`
    Scoring {
        attempt: u32,
        description: String,
        image: ImageRef,
    },

    /// Terminal: the latest candidate was accepted
    Accepted { attempt: u32 },

    /// Next: regenerate the description, or give up
    Rejected {
        attempt: u32,
        description: String,
        rationale: String,
    },

    /// Terminal: every attempt was rejected
    Exhausted { attempts: u32 },
}

impl GateState {
    /// Initial state for a description
    pub fn start(description: impl Into<String>) -> Self {
        Self::Generating {
            attempt: 1,
            description: description.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Accepted { .. } | Self::Exhausted { .. })
    }

    /// 1-indexed attempt this state belongs to
    pub fn attempt(&self) -> u32 {
        match self {
            Self::Generating { attempt, .. }
            | Self::Scoring { attempt, .. }
            | Self::Accepted { attempt }
            | Self::Rejected { attempt, .. } => *attempt,
            Self::Exhausted { attempts } => *attempts,
        }
    }
}

/// Result of running the gate to a terminal state
#[derive(Debug, Clone)]
pub struct GateOutcome {
    /// Every scored attempt, in order
    pub candidates: Vec<ImageCandidate>,

    /// Why the gate failed; `None` when an image was accepted
    pub error: Option<PipelineError>,
}

impl GateOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// The accepted candidate, only when the gate succeeded
    pub fn accepted(&self) -> Option<&ImageCandidate> {
        if !self.is_success() {
            return None;
        }
        self.candidates.last().filter(|c| c.is_accepted())
    }

    /// Latest attempt, accepted or not (for audit)
    pub fn last_candidate(&self) -> Option<&ImageCandidate> {
        self.candidates.last()
    }
}

/// Classify a scored attempt
pub fn decide(policy: &GatePolicy, score: u8) -> Verdict {
    if policy.accepts(score) {
        Verdict::Accepted
    } else {
        Verdict::Rejected
    }
}

/// Model ids used by the gate
#[derive(Debug, Clone)]
pub struct GateModels {
    /// Image generation model
    pub image: String,

    /// Multimodal model that scores images
    pub scoring: String,

    /// Text model that rewrites descriptions
    pub text: String,
}

/// Drives the image generate/score/retry loop
pub struct QualityGate {
    service: Arc<dyn GenerativeService>,
    downloader: Arc<dyn ImageDownloader>,
    models: GateModels,
    policy: GatePolicy,
    timeout: Duration,
}

impl QualityGate {
    pub fn new(
        service: Arc<dyn GenerativeService>,
        downloader: Arc<dyn ImageDownloader>,
        models: GateModels,
        policy: GatePolicy,
        timeout: Duration,
    ) -> Self {
        Self {
            service,
            downloader,
            models,
            policy,
            timeout,
        }
    }

    pub fn policy(&self) -> &GatePolicy {
        &self.policy
    }

    /// Run the gate from the artifact's image description to a terminal state
    pub async fn run(
        &self,
        artifact: &GeneratedArtifact,
        language: &LanguagePolicy,
        ledger: &mut StepLedger,
        cancel: &CancellationToken,
    ) -> GateOutcome {
        let stage_id = Stage::ImageGate.id();
        let mut candidates = Vec::new();
        let mut state = GateState::start(artifact.image_description.clone());

        while !state.is_terminal() {
            let scored_before = candidates.len();

            state = match self
                .advance(state, artifact, language, &mut candidates, cancel)
                .await
            {
                Ok(next) => next,
                Err(e) => {
                    return GateOutcome {
                        candidates,
                        error: Some(e),
                    }
                }
            };

            if candidates.len() > scored_before {
                if let Some(candidate) = candidates.last() {
                    let pct = (u64::from(candidate.attempt) * 100
                        / u64::from(self.policy.max_attempts()))
                    .min(100);
                    let detail = format!(
                        "attempt {}/{}: score {} ({:?})",
                        candidate.attempt,
                        self.policy.max_attempts(),
                        candidate.score,
                        candidate.verdict
                    );
                    ledger.progress(stage_id, pct as u8, Some(detail.as_str()));
                }
            }
        }

        let error = match state {
            GateState::Exhausted { attempts } => {
                warn!(attempts, "Every image attempt was rejected");
                Some(PipelineError::QualityGateExhausted { attempts })
            }
            _ => None,
        };

        GateOutcome { candidates, error }
    }

    /// Perform one control step and return the next state.
    ///
    /// Scored attempts are appended to `candidates`. Terminal states are
    /// returned unchanged.
    pub async fn advance(
        &self,
        state: GateState,
        artifact: &GeneratedArtifact,
        language: &LanguagePolicy,
        candidates: &mut Vec<ImageCandidate>,
        cancel: &CancellationToken,
    ) -> Result<GateState, PipelineError> {
        match state {
            GateState::Generating {
                attempt,
                description,
            } => {
                let image = self.generate_image(&description, cancel).await?;
                info!(attempt, "Image generated");
                Ok(GateState::Scoring {
                    attempt,
                    description,
                    image,
                })
            }

            GateState::Scoring {
                attempt,
                description,
                image,
            } => {
                let (score, rationale) = self.score_image(&image, artifact, cancel).await?;
                let verdict = decide(&self.policy, score);
                info!(attempt, score, ?verdict, "Image scored");

                candidates.push(ImageCandidate {
                    attempt,
                    image,
                    description: description.clone(),
                    score,
                    verdict,
                    rationale: rationale.clone(),
                    created_at: Utc::now(),
                });

                Ok(match verdict {
                    Verdict::Accepted => GateState::Accepted { attempt },
                    Verdict::Rejected => GateState::Rejected {
                        attempt,
                        description,
                        rationale,
                    },
                })
            }

            GateState::Rejected {
                attempt,
                description,
                rationale,
            } => {
                if attempt >= self.policy.max_attempts() {
                    return Ok(GateState::Exhausted { attempts: attempt });
                }

                let description = self
                    .regenerate_description(&description, &rationale, artifact, language, cancel)
                    .await?;
                Ok(GateState::Generating {
                    attempt: attempt + 1,
                    description,
                })
            }

            terminal => Ok(terminal),
        }
    }

    async fn generate_image(
        &self,
        description: &str,
        cancel: &CancellationToken,
    ) -> Result<ImageRef, PipelineError> {
        let prompt = format!(
            "Create a high-quality image for a social media post.\n\
             {}\n\
             No watermarks, logos or borders.",
            description
        );
        let request = GenerateRequest::text(prompt).with_image_output();

        let response = remote::generate(
            self.service.as_ref(),
            &self.models.image,
            &request,
            Stage::ImageGate,
            self.timeout,
            cancel,
        )
        .await?;

        response
            .inline_image()
            .map(|data| ImageRef::inline(&data.mime_type, &data.data))
            .ok_or(PipelineError::GenerationEmpty {
                stage: Stage::ImageGate,
            })
    }

    async fn score_image(
        &self,
        image: &ImageRef,
        artifact: &GeneratedArtifact,
        cancel: &CancellationToken,
    ) -> Result<(u8, String), PipelineError> {
        let (mime_type, data) = media::to_inline(image, self.downloader.as_ref())
            .await
            .map_err(|e| PipelineError::request_failed(Stage::ImageGate, e.to_string()))?;

        let prompt = format!(
            "You review images for social media posts.\n\
             Rate from 0 to 100 how well the attached image fits this post about \"{}\":\n\n\
             {}\n\n\
             Consider relevance to the topic, visual quality, and the absence of garbled \
             text or artifacts.\n\
             Reply with JSON only: {{\"score\": <integer 0-100>, \"reason\": \"<one sentence>\"}}",
            artifact.topic, artifact.body
        );
        let request = GenerateRequest::text(prompt)
            .with_image(&mime_type, &data)
            .with_temperature(0.0);

        let response = remote::generate(
            self.service.as_ref(),
            &self.models.scoring,
            &request,
            Stage::ImageGate,
            self.timeout,
            cancel,
        )
        .await?;

        let fallback = self.policy.effective_fallback();
        let score = parse_score(&response.text().unwrap_or_default(), fallback);
        if score.source != ScoreSource::Structured {
            warn!(score = score.value, source = ?score.source, "Scorer answer was not structured");
        }

        Ok((score.value, score.rationale))
    }

    async fn regenerate_description(
        &self,
        previous: &str,
        rationale: &str,
        artifact: &GeneratedArtifact,
        language: &LanguagePolicy,
        cancel: &CancellationToken,
    ) -> Result<String, PipelineError> {
        let prompt = format!(
            "An image generated from the description below was rejected for a social media post.\n\n\
             Rejected description: {previous}\n\
             Reviewer feedback: {rationale}\n\n\
             Post:\n{body}\n\n\
             Write a new, clearly different image description that fixes the problems in the \
             feedback. Single paragraph, no logos or watermarks; any text shown in the image \
             must be in {language}. Write the description in English and reply with it only.",
            previous = previous,
            rationale = rationale,
            body = artifact.body,
            language = language.name,
        );

        let raw = remote::generate_text(
            self.service.as_ref(),
            &self.models.text,
            &GenerateRequest::text(prompt),
            Stage::ImageGate,
            self.timeout,
            cancel,
        )
        .await?;

        let description = strip_markup(&raw);
        if description.is_empty() {
            return Err(PipelineError::GenerationEmpty {
                stage: Stage::ImageGate,
            });
        }

        Ok(ensure_different(previous, description, rationale))
    }
}

/// Guarantee the retry description differs from the rejected one
fn ensure_different(previous: &str, description: String, rationale: &str) -> String {
    let normalize = |s: &str| s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
    if normalize(previous) != normalize(&description) {
        return description;
    }

    let steer = if rationale.trim().is_empty() {
        "a different composition and viewpoint".to_string()
    } else {
        format!("a version that avoids this problem: {}", rationale.trim())
    };
    format!("{} Show {}.", description, steer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decide_uses_threshold() {
        let policy = GatePolicy::default();
        assert_eq!(decide(&policy, 75), Verdict::Accepted);
        assert_eq!(decide(&policy, 74), Verdict::Rejected);

        let strict = GatePolicy {
            accept_threshold: 90,
            ..Default::default()
        };
        assert_eq!(decide(&strict, 82), Verdict::Rejected);
    }

    #[test]
    fn test_state_helpers() {
        let state = GateState::start("a cup");
        assert_eq!(state.attempt(), 1);
        assert!(!state.is_terminal());
        assert!(GateState::Accepted { attempt: 2 }.is_terminal());
        assert!(GateState::Exhausted { attempts: 4 }.is_terminal());
    }

    #[test]
    fn test_ensure_different() {
        let same = ensure_different("A cup  of coffee", "a cup of coffee".to_string(), "too dark");
        assert_ne!(same.to_lowercase(), "a cup of coffee");
        assert!(same.contains("too dark"));

        let new = ensure_different("A cup", "A sunlit café terrace".to_string(), "x");
        assert_eq!(new, "A sunlit café terrace");
    }

    #[test]
    fn test_outcome_accessors() {
        let candidate = ImageCandidate {
            attempt: 1,
            image: ImageRef::new("https://img/1"),
            description: "d".to_string(),
            score: 50,
            verdict: Verdict::Rejected,
            rationale: "off topic".to_string(),
            created_at: Utc::now(),
        };
        let outcome = GateOutcome {
            candidates: vec![candidate],
            error: Some(PipelineError::QualityGateExhausted { attempts: 1 }),
        };

        assert!(!outcome.is_success());
        assert!(outcome.accepted().is_none());
        assert_eq!(outcome.last_candidate().unwrap().score, 50);
    }
}
