//! Command-line interface for autopub.
//!
//! Provides commands for running the content pipeline, checking a publish
//! time against the scheduling window, listing supported languages and
//! showing the resolved configuration.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::warn;

use crate::adapters::{GeminiClient, GraphClient, HttpDownloader};
use crate::config::{self, ResolvedConfig};
use crate::core::{
    validate_schedule_input, CancellationToken, LanguagePolicy, Orchestrator, Services,
};
use crate::domain::{PageTarget, Run, RunParams, RunState, StepStatus};

/// autopub - Generate, vet and publish social media posts
#[derive(Parser, Debug)]
#[command(name = "autopub")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (defaults to .autopub/config.yaml, searched upward)
    #[arg(long, global = true, env = "AUTOPUB_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a post with an image and publish it
    Run {
        /// Subject domain (e.g. "coffee shops")
        #[arg(short, long)]
        subject: String,

        /// Content category (e.g. "marketing")
        #[arg(short, long)]
        category: String,

        /// Target language name or code
        #[arg(short, long, default_value = "English")]
        language: String,

        /// Publish time instead of publishing now (RFC 3339 or "YYYY-MM-DD HH:MM" UTC)
        #[arg(long)]
        schedule: Option<String>,

        /// Stop after the image gate
        #[arg(long)]
        no_publish: bool,

        /// Print the full run as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check whether a publish time is inside the scheduling window
    CheckSchedule {
        /// Requested publish time
        time: String,
    },

    /// List supported languages
    Languages,

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Run {
                subject,
                category,
                language,
                schedule,
                no_publish,
                json,
            } => {
                let cfg = config::load(self.config.as_deref())?;
                let page = if no_publish {
                    cfg.page_target().unwrap_or_else(|_| PageTarget::new("", ""))
                } else {
                    cfg.page_target()?
                };

                let mut params = RunParams::new(subject, category, language, page);
                if let Some(schedule) = schedule {
                    params = params.with_schedule(schedule);
                }
                if no_publish {
                    params = params.without_publishing();
                }

                run_pipeline(&cfg, params, json).await
            }
            Commands::CheckSchedule { time } => check_schedule(&time),
            Commands::Languages => {
                list_languages();
                Ok(())
            }
            Commands::Config => {
                let cfg = config::load(self.config.as_deref())?;
                show_config(&cfg);
                Ok(())
            }
        }
    }
}

/// Run the pipeline once with the configured services
async fn run_pipeline(cfg: &ResolvedConfig, params: RunParams, json: bool) -> Result<()> {
    if LanguagePolicy::find(&params.language).is_none() {
        warn!(
            language = %params.language,
            fallback = LanguagePolicy::default_policy().name,
            "Unknown language, using default"
        );
    }

    let keys = cfg.key_pool();
    if keys.is_empty() {
        anyhow::bail!(
            "No Gemini API keys configured (set {} or generative.api_keys)",
            config::ENV_GEMINI_KEYS
        );
    }

    let services = Services {
        generative: Arc::new(
            GeminiClient::new(cfg.gemini.clone(), keys)
                .context("Failed to build Gemini HTTP client")?,
        ),
        platform: Arc::new(GraphClient::new(cfg.graph.clone())),
        downloader: Arc::new(HttpDownloader::new()),
    };
    let orchestrator = Orchestrator::new(services, cfg.pipeline.clone());

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, aborting run");
            on_interrupt.cancel();
        }
    });

    let run = orchestrator.run(params, &cancel).await;

    if json {
        let out = serde_json::to_string_pretty(&run).context("Failed to serialize run")?;
        println!("{}", out);
    } else {
        print_run(&run);
    }

    match &run.state {
        RunState::Published if run.is_partial_success() => {
            eprintln!("\n[Run {} published with failed follow-ups]", run.id);
            Ok(())
        }
        RunState::Published => {
            eprintln!("\n[Run {} published]", run.id);
            Ok(())
        }
        RunState::Generated => {
            eprintln!("\n[Run {} generated, publishing skipped]", run.id);
            Ok(())
        }
        RunState::GateExhausted { attempts } => {
            anyhow::bail!("Run {} stopped: all {} images were rejected", run.id, attempts)
        }
        RunState::Failed { stage, error } => {
            anyhow::bail!("Run {} failed at {}: {}", run.id, stage, error)
        }
        RunState::Aborted { stage } => {
            anyhow::bail!("Run {} aborted during {}", run.id, stage)
        }
        RunState::Running => anyhow::bail!("Run {} did not finish", run.id),
    }
}

/// Human-readable run summary
fn print_run(run: &Run) {
    println!("Run ID: {}", run.id);
    println!("Subject: {} / {}", run.params.subject, run.params.category);
    println!("Language: {}", LanguagePolicy::lookup(&run.params.language).name);
    println!("\nSteps:");
    for step in run.ledger.snapshot() {
        let status = match step.status {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Completed => "done",
            StepStatus::Failed => "FAILED",
        };
        let timing = step
            .duration_ms()
            .map(|ms| format!(" ({} ms)", ms))
            .unwrap_or_default();
        println!("  {:<20} {:<8}{}", step.title, status, timing);
        if let Some(ref error) = step.error_message {
            println!("    error: {}", error);
        } else if let Some(ref detail) = step.detail {
            println!("    {}", detail);
        }
    }

    if let Some(ref artifact) = run.artifact {
        println!("\n=== TOPIC ===\n{}", artifact.topic);
        println!("\n=== POST ===\n{}", artifact.body);
        println!("\n=== FOLLOW-UPS ===");
        for (i, prompt) in artifact.prompts.iter().enumerate() {
            println!("  {}. {}", i + 1, prompt);
        }
    }

    if !run.candidates.is_empty() {
        println!("\n=== IMAGE ATTEMPTS ===");
        for c in &run.candidates {
            println!("  #{} score {:>3} {:?}: {}", c.attempt, c.score, c.verdict, c.rationale);
        }
    }

    if let Some(ref report) = run.report {
        println!("\nPost: {}", report.post_id);
        println!("Media: {}", report.media_id);
        if let Some(ts) = report.mode.scheduled_time() {
            let when = run
                .schedule
                .as_ref()
                .map(|w| w.instant().to_rfc3339())
                .unwrap_or_default();
            println!("Scheduled for: {} (unix {})", when, ts);
        }
        println!(
            "Follow-ups: {}/{} posted",
            report.follow_ups_succeeded, report.follow_ups_total
        );
        for failure in &report.follow_up_failures {
            println!("  #{} failed: {}", failure.index + 1, failure.error);
        }
    }
}

fn check_schedule(input: &str) -> Result<()> {
    let now = Utc::now();
    let window = validate_schedule_input(now, input)
        .with_context(|| format!("Cannot schedule at '{}'", input))?;

    println!("Schedule OK");
    println!("  Time:  {}", window.instant().to_rfc3339());
    println!("  Unix:  {}", window.epoch_seconds());
    println!(
        "  Lead:  {} minutes",
        (window.instant() - now).num_minutes()
    );

    Ok(())
}

fn list_languages() {
    println!("{:<12} {:<6} {}", "LANGUAGE", "CODE", "INSTRUCTION");
    println!("{}", "-".repeat(80));
    for language in LanguagePolicy::all() {
        println!(
            "{:<12} {:<6} {}",
            language.name, language.code, language.instruction
        );
    }
    println!(
        "\nUnknown languages fall back to {}.",
        LanguagePolicy::default_policy().name
    );
}

fn show_config(cfg: &ResolvedConfig) {
    println!("autopub configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Generative:");
    println!("  Base URL:      {}", cfg.gemini.base_url);
    println!("  Text model:    {}", cfg.pipeline.models.text);
    println!("  Image model:   {}", cfg.pipeline.models.image);
    println!("  Scoring model: {}", cfg.pipeline.models.scoring);
    println!("  API keys:      {} configured", cfg.api_keys.len());
    println!();
    println!("Platform:");
    println!("  Graph URL:     {}/{}", cfg.graph.base_url, cfg.graph.api_version);
    println!(
        "  Page ID:       {}",
        cfg.page_id.as_deref().unwrap_or("(not set)")
    );
    println!(
        "  Access token:  {}",
        if cfg.access_token.is_some() { "set" } else { "(not set)" }
    );
    println!();
    println!("Image gate:");
    println!("  Threshold:     {}", cfg.pipeline.gate.accept_threshold);
    println!("  Max retries:   {}", cfg.pipeline.gate.max_retries);
    println!("  Fallback:      {}", cfg.pipeline.gate.effective_fallback());
    println!();
    println!("Publishing:");
    println!(
        "  Follow-up gap: {} ms",
        cfg.pipeline.publishing.follow_up_delay().as_millis()
    );
    println!(
        "  Call timeout:  {}s",
        cfg.pipeline.limits.remote_call_timeout_seconds
    );
}
