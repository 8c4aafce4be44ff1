//! Configuration for autopub.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (AUTOPUB_GEMINI_KEYS, AUTOPUB_PAGE_ID, AUTOPUB_PAGE_TOKEN)
//! 2. Config file (.autopub/config.yaml)
//! 3. Defaults
//!
//! Config file discovery:
//! - An explicit path (`--config` or AUTOPUB_CONFIG) wins
//! - Otherwise searches current directory and parents for .autopub/config.yaml
//! - Falls back to ~/.autopub/config.yaml

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;

use crate::adapters::{GeminiConfig, GraphConfig, KeyPool};
use crate::core::policy::MAX_RETRIES_LIMIT;
use crate::core::{GatePolicy, Limits, ModelIds, PipelineConfig, PublishPolicy};
use crate::domain::PageTarget;

/// Comma-separated Gemini API keys
pub const ENV_GEMINI_KEYS: &str = "AUTOPUB_GEMINI_KEYS";
pub const ENV_PAGE_ID: &str = "AUTOPUB_PAGE_ID";
pub const ENV_PAGE_TOKEN: &str = "AUTOPUB_PAGE_TOKEN";
pub const ENV_CONFIG: &str = "AUTOPUB_CONFIG";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub generative: GenerativeSection,
    #[serde(default)]
    pub platform: PlatformSection,
    #[serde(default)]
    pub gate: GatePolicy,
    #[serde(default)]
    pub publishing: PublishPolicy,
    #[serde(default)]
    pub limits: Limits,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerativeSection {
    #[serde(default = "default_gemini_url")]
    pub base_url: String,
    #[serde(default)]
    pub models: ModelIds,
    #[serde(default)]
    pub api_keys: Vec<String>,
    /// HTTP timeout for one request (default: 120)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

fn default_gemini_url() -> String {
    GeminiConfig::default().base_url
}
fn default_request_timeout() -> u64 {
    120
}

impl Default for GenerativeSection {
    fn default() -> Self {
        Self {
            base_url: default_gemini_url(),
            models: ModelIds::default(),
            api_keys: Vec::new(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlatformSection {
    #[serde(default = "default_graph_url")]
    pub base_url: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    pub page_id: Option<String>,
    pub access_token: Option<String>,
}

fn default_graph_url() -> String {
    GraphConfig::default().base_url
}
fn default_api_version() -> String {
    GraphConfig::default().api_version
}

impl Default for PlatformSection {
    fn default() -> Self {
        Self {
            base_url: default_graph_url(),
            api_version: default_api_version(),
            page_id: None,
            access_token: None,
        }
    }
}

/// Resolved configuration
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    pub pipeline: PipelineConfig,
    pub gemini: GeminiConfig,
    pub graph: GraphConfig,
    pub api_keys: Vec<String>,
    pub page_id: Option<String>,
    pub access_token: Option<String>,
}

impl ResolvedConfig {
    /// Key pool for the generative client
    pub fn key_pool(&self) -> KeyPool {
        KeyPool::new(self.api_keys.iter().cloned())
    }

    /// Page to publish on; both id and token are required
    pub fn page_target(&self) -> Result<PageTarget> {
        let page_id = self
            .page_id
            .clone()
            .with_context(|| format!("No page id configured (set {} or platform.page_id)", ENV_PAGE_ID))?;
        let token = self.access_token.clone().with_context(|| {
            format!(
                "No page access token configured (set {} or platform.access_token)",
                ENV_PAGE_TOKEN
            )
        })?;

        Ok(PageTarget::new(page_id, token))
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".autopub").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    let home_config = dirs::home_dir()?.join(".autopub").join("config.yaml");
    home_config.exists().then_some(home_config)
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

fn split_keys(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

/// Merge a parsed file with environment overrides
fn resolve<F>(file: ConfigFile, config_file: Option<PathBuf>, env: F) -> ResolvedConfig
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| env(key).filter(|v| !v.trim().is_empty());

    let api_keys = match non_empty(ENV_GEMINI_KEYS) {
        Some(raw) => split_keys(&raw),
        None => file.generative.api_keys.clone(),
    };

    if file.gate.max_retries > MAX_RETRIES_LIMIT {
        warn!(
            configured = file.gate.max_retries,
            limit = MAX_RETRIES_LIMIT,
            "gate.max_retries too large, clamping"
        );
    }

    ResolvedConfig {
        config_file,
        pipeline: PipelineConfig {
            models: file.generative.models.clone(),
            gate: file.gate.bounded(),
            publishing: file.publishing,
            limits: file.limits,
        },
        gemini: GeminiConfig {
            base_url: file.generative.base_url.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(file.generative.request_timeout_seconds),
        },
        graph: GraphConfig {
            base_url: file.platform.base_url.trim_end_matches('/').to_string(),
            api_version: file.platform.api_version.clone(),
        },
        api_keys,
        page_id: non_empty(ENV_PAGE_ID).or(file.platform.page_id),
        access_token: non_empty(ENV_PAGE_TOKEN).or(file.platform.access_token),
    }
}

/// Load configuration from all sources.
///
/// `explicit` is a config path given on the command line; it must exist.
pub fn load(explicit: Option<&Path>) -> Result<ResolvedConfig> {
    let env = |key: &str| std::env::var(key).ok();

    let config_file = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => env(ENV_CONFIG).map(PathBuf::from).or_else(find_config_file),
    };

    let file = match config_file {
        Some(ref path) => load_config_file(path)?,
        None => ConfigFile::default(),
    };

    Ok(resolve(file, config_file, env))
}
