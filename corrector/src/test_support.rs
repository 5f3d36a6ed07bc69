//! Scripted collaborators for driving the correction loop in tests.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use tempfile::TempDir;

use crate::agents::executor::{ExecOutcome, Executor};
use crate::agents::validator::Validator;
use crate::core::types::{Correction, ErrorKind, ValidationResult};
use crate::io::backend::{Backend, BackendError};
use crate::io::config::{BackendConfig, CorrectorConfig, write_config};
use crate::workflow::Sleeper;

/// Threshold used by [`judged`].
pub const TEST_ACCEPTANCE_THRESHOLD: f64 = 0.2;

/// A score-judged validation result with the default acceptance threshold.
pub fn judged(score: f64, error_kind: ErrorKind, feedback: &str) -> ValidationResult {
    ValidationResult::scored(
        score,
        TEST_ACCEPTANCE_THRESHOLD,
        error_kind,
        feedback.to_string(),
    )
}

/// Executor that replays queued outcomes and records every call.
///
/// Panics if called more often than outcomes were queued.
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    outcomes: Mutex<VecDeque<ExecOutcome>>,
    calls: Mutex<Vec<(String, Option<Correction>)>>,
}

impl ScriptedExecutor {
    pub fn new(outcomes: Vec<ExecOutcome>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Executor whose attempts all complete with the given texts.
    pub fn completing<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            texts
                .into_iter()
                .map(|t| ExecOutcome::Completed(t.into()))
                .collect(),
        )
    }

    /// `(task, correction)` for each call, in order.
    pub fn calls(&self) -> Vec<(String, Option<Correction>)> {
        self.calls.lock().expect("calls lock").clone()
    }
}

impl Executor for ScriptedExecutor {
    fn execute(&self, task: &str, correction: Option<&Correction>) -> ExecOutcome {
        self.calls
            .lock()
            .expect("calls lock")
            .push((task.to_string(), correction.cloned()));
        self.outcomes
            .lock()
            .expect("outcomes lock")
            .pop_front()
            .expect("scripted executor ran out of outcomes")
    }
}

/// Validator that replays queued results and records what it was shown.
#[derive(Debug, Default)]
pub struct ScriptedValidator {
    results: Mutex<VecDeque<ValidationResult>>,
    seen: Mutex<Vec<String>>,
}

impl ScriptedValidator {
    pub fn new(results: Vec<ValidationResult>) -> Self {
        Self {
            results: Mutex::new(results.into()),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Rendered outcomes passed to `validate`, in order.
    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().expect("seen lock").clone()
    }
}

impl Validator for ScriptedValidator {
    fn validate(&self, _task: &str, outcome: &ExecOutcome) -> ValidationResult {
        self.seen.lock().expect("seen lock").push(outcome.to_string());
        self.results
            .lock()
            .expect("results lock")
            .pop_front()
            .expect("scripted validator ran out of results")
    }
}

/// Backend that replays queued completions and records prompts.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    responses: Mutex<VecDeque<Result<String, BackendError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn new(responses: Vec<Result<String, BackendError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompts lock").clone()
    }
}

impl Backend for ScriptedBackend {
    fn generate(&self, prompt: &str) -> Result<String, BackendError> {
        self.prompts
            .lock()
            .expect("prompts lock")
            .push(prompt.to_string());
        self.responses
            .lock()
            .expect("responses lock")
            .pop_front()
            .expect("scripted backend ran out of responses")
    }
}

/// Sleeper that records requested waits instead of sleeping.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    waits: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().expect("waits lock").clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.waits.lock().expect("waits lock").push(duration);
    }
}

/// Temporary directory holding a config file and its metrics output.
pub struct TestWorkspace {
    dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("create temp dir")?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn config_path(&self) -> PathBuf {
        self.path().join("corrector.toml")
    }

    pub fn metrics_path(&self) -> PathBuf {
        self.path().join("metrics.json")
    }

    /// Write a config with `max_retries` that drives `backend` and logs to
    /// [`Self::metrics_path`]. Returns the config path.
    pub fn write_config(&self, max_retries: u32, backend: BackendConfig) -> Result<PathBuf> {
        let path = self.config_path();
        let cfg = CorrectorConfig {
            max_retries,
            metrics_path: self.metrics_path(),
            backend,
            ..CorrectorConfig::default()
        };
        write_config(&path, &cfg)?;
        Ok(path)
    }
}
