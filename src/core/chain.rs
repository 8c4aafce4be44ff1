//! Content generation chain.
//!
//! Four dependent generation calls, run strictly in order:
//! topic -> body text -> interactive prompts -> image description.
//! Each call sees the artifact built so far; the first failure stops the chain.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::adapters::{GenerateRequest, GenerativeService};
use crate::domain::{GeneratedArtifact, RunParams, Stage, StepLedger};

use super::cancel::CancellationToken;
use super::error::PipelineError;
use super::language::LanguagePolicy;
use super::markup::strip_markup;
use super::policy::{MAX_PROMPTS, MIN_PROMPT_CHARS};
use super::remote;

/// Run-level inputs shared by every prompt template
#[derive(Debug, Clone, Copy)]
pub struct PromptContext<'a> {
    pub subject: &'a str,
    pub category: &'a str,
    pub language: &'static LanguagePolicy,
}

impl<'a> PromptContext<'a> {
    pub fn from_params(params: &'a RunParams) -> Self {
        Self {
            subject: params.subject.trim(),
            category: params.category.trim(),
            language: LanguagePolicy::lookup(&params.language),
        }
    }

    pub fn topic_prompt(&self) -> String {
        format!(
            "You plan social media content for a page about {subject}.\n\
             Suggest one fresh, specific post topic in the \"{category}\" category.\n\
             Reply with the topic only, on a single line, without quotes or commentary.\n\
             {language}",
            subject = self.subject,
            category = self.category,
            language = self.language.instruction,
        )
    }

    pub fn body_prompt(&self, artifact: &GeneratedArtifact) -> String {
        format!(
            "Write a social media post about \"{topic}\" for a page about {subject} \
             (category: {category}).\n\
             Open with a strong hook, keep it between 60 and 150 words, end with a call \
             to action, and add 3 to 5 relevant hashtags. Emoji are welcome.\n\
             Plain text only: no headings, no bold, no bullet lists.\n\
             {language}",
            topic = artifact.topic,
            subject = self.subject,
            category = self.category,
            language = self.language.instruction,
        )
    }

    pub fn prompts_prompt(&self, artifact: &GeneratedArtifact) -> String {
        format!(
            "Here is a social media post:\n\n{body}\n\n\
             Write {count} short, open questions that invite followers to comment on it.\n\
             One question per line, no numbering, no extra text.\n\
             {language}",
            body = artifact.body,
            count = MAX_PROMPTS,
            language = self.language.instruction,
        )
    }

    pub fn image_description_prompt(&self, artifact: &GeneratedArtifact) -> String {
        format!(
            "Describe one image to accompany this social media post about \"{topic}\":\n\n\
             {body}\n\n\
             Write a single detailed paragraph for an image generator covering subject, \
             setting, composition, lighting, color palette and mood.\n\
             The image must not contain logos or watermarks. If it shows any text, that \
             text must be in {language}.\n\
             Write the description itself in English and reply with the description only.",
            topic = artifact.topic,
            body = artifact.body,
            language = self.language.name,
        )
    }
}

/// Keep the first non-empty line, without surrounding quotes
pub fn parse_topic(raw: &str) -> Option<String> {
    let stripped = strip_markup(raw);
    let line = stripped.lines().map(str::trim).find(|l| !l.is_empty())?;
    let line = line
        .trim_matches(|c| matches!(c, '"' | '\'' | '“' | '”' | '«' | '»'))
        .trim();

    if line.is_empty() {
        None
    } else {
        Some(line.to_string())
    }
}

/// Split into lines, drop short ones, keep at most `MAX_PROMPTS`
pub fn parse_prompts(raw: &str) -> Vec<String> {
    strip_markup(raw)
        .lines()
        .map(str::trim)
        .filter(|l| l.chars().count() >= MIN_PROMPT_CHARS)
        .take(MAX_PROMPTS)
        .map(str::to_string)
        .collect()
}

/// Runs the four generation stages
pub struct ContentChain {
    service: Arc<dyn GenerativeService>,
    model: String,
    timeout: Duration,
}

impl ContentChain {
    pub fn new(service: Arc<dyn GenerativeService>, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            service,
            model: model.into(),
            timeout,
        }
    }

    /// Run every stage in order, recording each in the ledger
    pub async fn run(
        &self,
        params: &RunParams,
        ledger: &mut StepLedger,
        cancel: &CancellationToken,
    ) -> Result<GeneratedArtifact, PipelineError> {
        let ctx = PromptContext::from_params(params);
        info!(
            subject = ctx.subject,
            category = ctx.category,
            language = ctx.language.name,
            "Starting content generation"
        );

        let mut artifact = GeneratedArtifact::new();
        for stage in [
            Stage::Topic,
            Stage::Text,
            Stage::Prompts,
            Stage::ImageDescription,
        ] {
            ledger.begin(stage.id());

            match self.run_stage(stage, &ctx, &artifact, cancel).await {
                Ok(next) => {
                    ledger.complete(stage.id(), Some(stage_detail(stage, &next).as_str()));
                    artifact = next;
                }
                Err(e) => {
                    error!(%stage, error = %e, "Generation stage failed");
                    ledger.fail(stage.id(), &e.to_string());
                    return Err(e);
                }
            }
        }

        Ok(artifact)
    }

    /// Run one stage against the artifact so far, producing a new artifact
    pub async fn run_stage(
        &self,
        stage: Stage,
        ctx: &PromptContext<'_>,
        artifact: &GeneratedArtifact,
        cancel: &CancellationToken,
    ) -> Result<GeneratedArtifact, PipelineError> {
        let prompt = match stage {
            Stage::Topic => ctx.topic_prompt(),
            Stage::Text => ctx.body_prompt(artifact),
            Stage::Prompts => ctx.prompts_prompt(artifact),
            Stage::ImageDescription => ctx.image_description_prompt(artifact),
            other => {
                return Err(PipelineError::request_failed(
                    other,
                    "not a content generation stage",
                ))
            }
        };

        let raw = remote::generate_text(
            self.service.as_ref(),
            &self.model,
            &GenerateRequest::text(prompt),
            stage,
            self.timeout,
            cancel,
        )
        .await?;

        let empty = PipelineError::GenerationEmpty { stage };
        match stage {
            Stage::Topic => parse_topic(&raw).map(|t| artifact.with_topic(t)).ok_or(empty),
            Stage::Prompts => {
                let prompts = parse_prompts(&raw);
                if prompts.is_empty() {
                    Err(empty)
                } else {
                    Ok(artifact.with_prompts(prompts))
                }
            }
            _ => {
                let text = strip_markup(&raw);
                if text.is_empty() {
                    Err(empty)
                } else if stage == Stage::Text {
                    Ok(artifact.with_body(text))
                } else {
                    Ok(artifact.with_image_description(text))
                }
            }
        }
    }
}

fn stage_detail(stage: Stage, artifact: &GeneratedArtifact) -> String {
    match stage {
        Stage::Topic => artifact.topic.clone(),
        Stage::Text => format!("{} characters", artifact.body.chars().count()),
        Stage::Prompts => format!("{} prompts", artifact.prompts.len()),
        _ => format!("{} characters", artifact.image_description.chars().count()),
    }
}
