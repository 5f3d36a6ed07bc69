//! Corrector configuration stored in `corrector.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::types::PolicyConfig;

/// Default config location, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "corrector.toml";

/// Corrector configuration (TOML).
///
/// This file is intended to be edited by humans. Missing fields default to
/// the values the loop was tuned with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CorrectorConfig {
    /// Hard bound on attempts per task.
    pub max_retries: u32,

    /// Validator scores strictly below this are accepted.
    pub acceptance_threshold: f64,

    /// Growth factor applied per consecutive rate-limited attempt.
    pub rate_limit_backoff_multiplier: f64,

    /// Wait in seconds when the backend is throttled without a retry hint.
    pub initial_rate_limit_delay_secs: f64,

    /// Ask the backend for a short plan before the first attempt.
    pub plan_first: bool,

    /// Where `run` writes per-iteration metrics.
    pub metrics_path: PathBuf,

    pub backend: BackendConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BackendConfig {
    /// Command that reads a prompt on stdin and prints the completion on stdout.
    pub command: Vec<String>,

    /// Per-call wall-clock budget in seconds.
    pub timeout_secs: u64,

    /// Truncate captured stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            command: vec![
                "llm".to_string(),
                "-m".to_string(),
                "gemini-2.5-flash".to_string(),
            ],
            timeout_secs: 120,
            output_limit_bytes: 200_000,
        }
    }
}

impl Default for CorrectorConfig {
    fn default() -> Self {
        let policy = PolicyConfig::default();
        Self {
            max_retries: policy.max_retries,
            acceptance_threshold: policy.acceptance_threshold,
            rate_limit_backoff_multiplier: policy.backoff_multiplier,
            initial_rate_limit_delay_secs: policy.initial_rate_limit_delay_secs,
            plan_first: false,
            metrics_path: PathBuf::from("experiment_logs.json"),
            backend: BackendConfig::default(),
        }
    }
}

impl CorrectorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_retries == 0 {
            return Err(anyhow!("max_retries must be > 0"));
        }
        if !(0.0..=1.0).contains(&self.acceptance_threshold) {
            return Err(anyhow!("acceptance_threshold must be within [0, 1]"));
        }
        if !self.rate_limit_backoff_multiplier.is_finite()
            || self.rate_limit_backoff_multiplier <= 1.0
        {
            return Err(anyhow!("rate_limit_backoff_multiplier must be > 1"));
        }
        if !self.initial_rate_limit_delay_secs.is_finite()
            || self.initial_rate_limit_delay_secs < 0.0
        {
            return Err(anyhow!("initial_rate_limit_delay_secs must be >= 0"));
        }
        if self.metrics_path.as_os_str().is_empty() {
            return Err(anyhow!("metrics_path must be non-empty"));
        }
        if self.backend.command.is_empty() || self.backend.command[0].trim().is_empty() {
            return Err(anyhow!("backend.command must be a non-empty array"));
        }
        if self.backend.timeout_secs == 0 {
            return Err(anyhow!("backend.timeout_secs must be > 0"));
        }
        if self.backend.output_limit_bytes == 0 {
            return Err(anyhow!("backend.output_limit_bytes must be > 0"));
        }
        Ok(())
    }

    /// Loop constants handed to the orchestrator.
    pub fn policy(&self) -> PolicyConfig {
        PolicyConfig {
            max_retries: self.max_retries,
            acceptance_threshold: self.acceptance_threshold,
            backoff_multiplier: self.rate_limit_backoff_multiplier,
            initial_rate_limit_delay_secs: self.initial_rate_limit_delay_secs,
        }
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `CorrectorConfig::default()`.
pub fn load_config(path: &Path) -> Result<CorrectorConfig> {
    if !path.exists() {
        let cfg = CorrectorConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: CorrectorConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &CorrectorConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    super::write_atomic(path, &buf)
}
