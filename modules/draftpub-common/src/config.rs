use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::DraftpubError;

/// TOML-backed tuning knobs. Every key is optional; a missing file means
/// all defaults. Cookies and other session material stay in env vars.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct FileConfig {
    pub pipeline: PipelineConfig,
    pub client: ClientConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PipelineConfig {
    pub page_size: u32,
    /// The single quality level that qualifies a draft.
    pub quality_threshold: i64,
    pub max_publish_attempts: u32,
    pub inter_page_delay_ms: u64,
    pub inter_candidate_delay_ms: u64,
    pub metrics_delay_ms: u64,
    pub delete_delay_ms: u64,
    pub backoff_base_ms: u64,
    pub backoff_jitter_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            page_size: 50,
            quality_threshold: 2,
            max_publish_attempts: 3,
            inter_page_delay_ms: 2_500,
            inter_candidate_delay_ms: 5_000,
            metrics_delay_ms: 1_000,
            delete_delay_ms: 500,
            backoff_base_ms: 30_000,
            backoff_jitter_ms: 10_000,
        }
    }
}

impl PipelineConfig {
    pub fn inter_page_delay(&self) -> Duration {
        Duration::from_millis(self.inter_page_delay_ms)
    }

    pub fn inter_candidate_delay(&self) -> Duration {
        Duration::from_millis(self.inter_candidate_delay_ms)
    }

    pub fn metrics_delay(&self) -> Duration {
        Duration::from_millis(self.metrics_delay_ms)
    }

    pub fn delete_delay(&self) -> Duration {
        Duration::from_millis(self.delete_delay_ms)
    }

    /// Reject tunings that break the pacing order or can never publish.
    pub fn validate(&self) -> std::result::Result<(), DraftpubError> {
        if self.max_publish_attempts == 0 {
            return Err(DraftpubError::Validation(
                "pipeline.max_publish_attempts must be at least 1".to_string(),
            ));
        }
        if self.inter_candidate_delay_ms <= self.inter_page_delay_ms {
            return Err(DraftpubError::Validation(format!(
                "pipeline.inter_candidate_delay_ms ({}) must exceed pipeline.inter_page_delay_ms ({})",
                self.inter_candidate_delay_ms, self.inter_page_delay_ms
            )));
        }
        Ok(())
    }

    /// Backoff before the retry that follows `attempt` (1-based), without jitter.
    pub fn backoff_base(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_base_ms.saturating_mul(attempt as u64))
    }
}

/// Waits the request client applies around failures.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ClientConfig {
    pub rate_limit_wait_min_ms: u64,
    pub rate_limit_wait_max_ms: u64,
    pub rate_limit_cooldown_ms: u64,
    pub failure_cooldown_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            rate_limit_wait_min_ms: 15_000,
            rate_limit_wait_max_ms: 25_000,
            rate_limit_cooldown_ms: 5_000,
            failure_cooldown_ms: 2_000,
        }
    }
}

/// Load and parse a TOML config file.
pub fn load_config(path: &Path) -> Result<FileConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: FileConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
    config
        .pipeline
        .validate()
        .with_context(|| format!("Invalid config file: {}", path.display()))?;
    Ok(config)
}

pub const DEFAULT_STATE_PATH: &str = "data/draftpub-state.json";

/// Browsing-context inputs and the state file location, from env vars.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Raw `Cookie` header string.
    pub cookies: Option<String>,
    pub cookie_file: Option<PathBuf>,
    /// Directory of saved page scripts / HTML documents.
    pub scripts_dir: Option<PathBuf>,
    pub har_file: Option<PathBuf>,
    /// Page the session was taken from; used as referer and domain hint.
    pub page_url: Option<String>,
    pub state_path: PathBuf,
}

impl SessionConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let var = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());

        let config = Self {
            cookies: var("DRAFTPUB_COOKIES"),
            cookie_file: var("DRAFTPUB_COOKIE_FILE").map(PathBuf::from),
            scripts_dir: var("DRAFTPUB_SCRIPTS_DIR").map(PathBuf::from),
            har_file: var("DRAFTPUB_HAR_FILE").map(PathBuf::from),
            page_url: var("DRAFTPUB_PAGE_URL"),
            state_path: var("DRAFTPUB_STATE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_PATH)),
        };

        config.log_keys();
        config
    }

    fn log_keys(&self) {
        fn preview(val: &Option<String>) -> String {
            match val {
                Some(v) if !v.is_empty() => {
                    let n = v.char_indices().nth(5).map(|(i, _)| i).unwrap_or(v.len());
                    format!("{}...({} chars)", &v[..n], v.len())
                }
                _ => "<not set>".to_string(),
            }
        }
        fn path(val: &Option<PathBuf>) -> String {
            val.as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "<not set>".to_string())
        }

        tracing::info!("Session config loaded:");
        tracing::info!("  DRAFTPUB_COOKIES: {}", preview(&self.cookies));
        tracing::info!("  DRAFTPUB_COOKIE_FILE: {}", path(&self.cookie_file));
        tracing::info!("  DRAFTPUB_SCRIPTS_DIR: {}", path(&self.scripts_dir));
        tracing::info!("  DRAFTPUB_HAR_FILE: {}", path(&self.har_file));
        tracing::info!("  DRAFTPUB_PAGE_URL: {}", preview(&self.page_url));
        tracing::info!("  DRAFTPUB_STATE_PATH: {}", self.state_path.display());
    }
}
