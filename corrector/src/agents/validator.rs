//! Validator agent: scores and classifies an execution outcome.

use tracing::{debug, instrument, warn};

use crate::agents::executor::ExecOutcome;
use crate::core::types::ValidationResult;
use crate::core::verdict::parse_verdict;
use crate::io::backend::{Backend, BackendError};
use crate::io::prompt::PromptEngine;

/// Judges an execution outcome. Must not panic or fail: every problem is
/// reported as a rejected [`ValidationResult`] with a fitting error kind.
pub trait Validator {
    fn validate(&self, task: &str, outcome: &ExecOutcome) -> ValidationResult;
}

impl<T: Validator + ?Sized> Validator for &T {
    fn validate(&self, task: &str, outcome: &ExecOutcome) -> ValidationResult {
        (**self).validate(task, outcome)
    }
}

/// Validator that asks a text-generation backend for a structured verdict.
pub struct BackendValidator<B> {
    backend: B,
    prompts: PromptEngine,
    acceptance_threshold: f64,
    default_retry_delay_secs: f64,
}

impl<B: Backend> BackendValidator<B> {
    pub fn new(backend: B, acceptance_threshold: f64, default_retry_delay_secs: f64) -> Self {
        Self {
            backend,
            prompts: PromptEngine::new(),
            acceptance_threshold,
            default_retry_delay_secs,
        }
    }

    fn judge(&self, task: &str, output: &str) -> ValidationResult {
        let prompt = match self.prompts.render_validator(task, output) {
            Ok(prompt) => prompt,
            Err(err) => {
                return ValidationResult::tool_failure(format!(
                    "Validator failed to render prompt: {err:#}"
                ));
            }
        };

        match self.backend.generate(&prompt) {
            Ok(raw) => match parse_verdict(&raw, self.acceptance_threshold) {
                Ok(result) => {
                    debug!(score = result.score, error_kind = %result.error_kind, "verdict parsed");
                    result
                }
                Err(err) => {
                    warn!(err = %format!("{err:#}"), "unparsable verdict");
                    ValidationResult::tool_failure(format!(
                        "Validator failed to parse verdict: {err:#}"
                    ))
                }
            },
            Err(BackendError::RateLimited {
                retry_after_secs, ..
            }) => {
                let delay = retry_after_secs.unwrap_or(self.default_retry_delay_secs);
                warn!(delay, "validator throttled");
                ValidationResult::rate_limited(
                    delay,
                    format!("Validator rate limited. Please wait {delay:.1} seconds before retrying."),
                )
            }
            Err(BackendError::Failed(message)) => {
                ValidationResult::tool_failure(format!("Validator backend failed: {message}"))
            }
        }
    }
}

impl<B: Backend> Validator for BackendValidator<B> {
    #[instrument(skip_all)]
    fn validate(&self, task: &str, outcome: &ExecOutcome) -> ValidationResult {
        match outcome {
            ExecOutcome::Throttled {
                retry_after_secs, ..
            } => ValidationResult::rate_limited(
                *retry_after_secs,
                format!(
                    "API rate limited. Please wait {retry_after_secs:.1} seconds before retrying."
                ),
            ),
            ExecOutcome::Failed(_) => ValidationResult::tool_failure(outcome.to_string()),
            ExecOutcome::Completed(text) => self.judge(task, text),
        }
    }
}
