//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.plancheck.toml` files.

use crate::checkers::{AREA, COUNCIL, DIMENSION, ENERGY, FORMATTER, WALL, WINDOW_DOOR};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default configuration file name, looked up in the current directory.
pub const DEFAULT_CONFIG_FILE: &str = ".plancheck.toml";

/// Environment variable consulted when no API key is configured.
pub const API_KEY_ENV: &str = "OPENROUTER_API_KEY";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Workflow scheduling settings.
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// Enrichment endpoint settings.
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            verbose: false,
        }
    }
}

fn default_output() -> String {
    "compliance_report.md".to_string()
}

/// Workflow scheduling settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Size of the admission gate.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_checkers: usize,

    /// Whole-workflow budget; unfinished checkers are aborted when it elapses.
    #[serde(default = "default_workflow_timeout")]
    pub timeout_seconds: u64,

    /// Attempts per checker, including the first.
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Backoff base; attempt `n` waits `n * base` before retrying.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,

    /// Number of completed sessions kept in history.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Checkers to run, in order. Unregistered names are skipped.
    #[serde(default = "default_checkers")]
    pub checkers: Vec<String>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_checkers: default_max_concurrent(),
            timeout_seconds: default_workflow_timeout(),
            retry_count: default_retry_count(),
            retry_backoff_ms: default_retry_backoff(),
            history_limit: default_history_limit(),
            checkers: default_checkers(),
        }
    }
}

impl OrchestratorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Delay before the retry that follows `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(u64::from(attempt)))
    }
}

fn default_max_concurrent() -> usize {
    5
}

fn default_workflow_timeout() -> u64 {
    300
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_backoff() -> u64 {
    1000
}

fn default_history_limit() -> usize {
    100
}

fn default_checkers() -> Vec<String> {
    [WALL, DIMENSION, WINDOW_DOOR, AREA, ENERGY, COUNCIL, FORMATTER]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Chat-completion endpoint used to enrich checker results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    /// Run the enrichment step at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// API base URL; `/chat/completions` is appended.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model name sent with each request.
    #[serde(default = "default_model")]
    pub model: String,

    /// Bearer token. Falls back to `OPENROUTER_API_KEY`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Temperature for generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens in response.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub timeout_seconds: u64,

    /// Thought log entries kept in memory.
    #[serde(default = "default_thought_log_limit")]
    pub thought_log_limit: usize,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_base_url(),
            model: default_model(),
            api_key: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_seconds: default_request_timeout(),
            thought_log_limit: default_thought_log_limit(),
        }
    }
}

impl EnrichmentConfig {
    /// The configured key, else the environment's. Blank keys count as absent.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|k| !k.trim().is_empty())
    }
}

fn default_true() -> bool {
    true
}

fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_model() -> String {
    "anthropic/claude-3-opus".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_request_timeout() -> u64 {
    60
}

fn default_thought_log_limit() -> usize {
    1000
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given explicitly.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }
        if args.verbose {
            self.general.verbose = true;
        }

        if let Some(concurrency) = args.concurrency {
            self.orchestrator.max_concurrent_checkers = concurrency;
        }
        if let Some(retries) = args.retries {
            self.orchestrator.retry_count = retries;
        }
        if let Some(timeout) = args.timeout {
            self.orchestrator.timeout_seconds = timeout;
        }
        if let Some(ref checkers) = args.checkers {
            self.orchestrator.checkers = checkers.clone();
        }

        if args.no_enrichment {
            self.enrichment.enabled = false;
        }
        if let Some(ref model) = args.model {
            self.enrichment.model = model.clone();
        }
        if let Some(ref api_key) = args.api_key {
            self.enrichment.api_key = Some(api_key.clone());
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
