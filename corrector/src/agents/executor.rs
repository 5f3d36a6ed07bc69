//! Executor agent: produces a result for the task, steered by prior feedback.

use std::fmt;

use tracing::{debug, instrument, warn};

use crate::core::types::{Action, Correction};
use crate::io::backend::{Backend, BackendError};
use crate::io::prompt::{CorrectionContext, PromptEngine};

/// Typed result of one execution attempt.
///
/// Throttling and failures travel as variants so the validator never has to
/// inspect result text to recognize them.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecOutcome {
    Completed(String),
    Throttled {
        retry_after_secs: f64,
        message: String,
    },
    Failed(String),
}

impl ExecOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, ExecOutcome::Completed(_))
    }
}

/// Renders the user-visible result string stored as the current result.
impl fmt::Display for ExecOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecOutcome::Completed(text) => f.write_str(text),
            ExecOutcome::Throttled {
                retry_after_secs,
                message,
            } => write!(
                f,
                "[rate limited] {message} | retry after {retry_after_secs} seconds"
            ),
            ExecOutcome::Failed(message) => write!(f, "[execution error] {message}"),
        }
    }
}

/// Produces a result for a task. Must not panic or fail: backend problems
/// come back as [`ExecOutcome::Throttled`] or [`ExecOutcome::Failed`].
pub trait Executor {
    fn execute(&self, task: &str, correction: Option<&Correction>) -> ExecOutcome;
}

impl<T: Executor + ?Sized> Executor for &T {
    fn execute(&self, task: &str, correction: Option<&Correction>) -> ExecOutcome {
        (**self).execute(task, correction)
    }
}

/// Prompt guidance for the retry strategy picked by the correction policy.
pub fn strategy_hint(action: Action) -> Option<&'static str> {
    match action {
        Action::RetryToolFix => Some(
            "The previous output was malformed or misused a tool. Produce well-formed output.",
        ),
        Action::RetryGrounding => {
            Some("Only state facts supported by the task. Do not invent details.")
        }
        Action::RetryFormatFix => {
            Some("Follow every format, length, and style rule in the task exactly.")
        }
        Action::RetryReasoning => Some("Reason step by step and check each conclusion."),
        Action::RetryStandard => Some("Address the feedback directly."),
        Action::WaitAndRetry | Action::Accept | Action::StopMaxRetries => None,
    }
}

/// Executor that prompts a text-generation backend.
pub struct BackendExecutor<B> {
    backend: B,
    prompts: PromptEngine,
    plan: Option<String>,
    default_retry_delay_secs: f64,
}

impl<B: Backend> BackendExecutor<B> {
    /// `default_retry_delay_secs` applies when the backend is throttled without a hint.
    pub fn new(backend: B, default_retry_delay_secs: f64) -> Self {
        Self {
            backend,
            prompts: PromptEngine::new(),
            plan: None,
            default_retry_delay_secs,
        }
    }

    /// Include a plan in every execution prompt.
    pub fn with_plan(mut self, plan: Option<String>) -> Self {
        self.plan = plan;
        self
    }
}

impl<B: Backend> Executor for BackendExecutor<B> {
    #[instrument(skip_all, fields(retry = correction.is_some()))]
    fn execute(&self, task: &str, correction: Option<&Correction>) -> ExecOutcome {
        let correction_ctx = correction.map(|c| CorrectionContext {
            feedback: c.feedback.as_str(),
            hint: strategy_hint(c.action),
        });
        let rendered =
            self.prompts
                .render_executor(task, self.plan.as_deref(), correction_ctx.as_ref());
        let prompt = match rendered {
            Ok(prompt) => prompt,
            Err(err) => return ExecOutcome::Failed(format!("render prompt: {err:#}")),
        };

        match self.backend.generate(&prompt) {
            Ok(text) => {
                debug!(bytes = text.len(), "execution completed");
                ExecOutcome::Completed(text)
            }
            Err(BackendError::RateLimited {
                retry_after_secs,
                message,
            }) => {
                let retry_after_secs = retry_after_secs.unwrap_or(self.default_retry_delay_secs);
                warn!(retry_after_secs, "execution throttled");
                ExecOutcome::Throttled {
                    retry_after_secs,
                    message,
                }
            }
            Err(BackendError::Failed(message)) => {
                warn!(%message, "execution failed");
                ExecOutcome::Failed(message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedBackend;

    #[test]
    fn completed_text_is_returned_verbatim() {
        let backend = ScriptedBackend::new(vec![Ok("4".to_string())]);
        let executor = BackendExecutor::new(&backend, 60.0);
        assert_eq!(
            executor.execute("2+2", None),
            ExecOutcome::Completed("4".to_string())
        );
        let prompts = backend.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Task: 2+2"));
    }

    #[test]
    fn correction_feedback_and_strategy_reach_the_prompt() {
        let backend = ScriptedBackend::new(vec![Ok("fixed".to_string())]);
        let executor = BackendExecutor::new(&backend, 60.0).with_plan(Some("1. think".to_string()));
        let correction = Correction {
            feedback: "Invented a citation.".to_string(),
            action: Action::RetryGrounding,
        };
        executor.execute("Summarize", Some(&correction));
        let prompt = &backend.prompts()[0];
        assert!(prompt.contains("Feedback: Invented a citation."));
        assert!(prompt.contains("Do not invent details."));
        assert!(prompt.contains("1. think"));
    }

    #[test]
    fn throttle_without_hint_uses_default_delay() {
        let backend = ScriptedBackend::new(vec![Err(BackendError::RateLimited {
            retry_after_secs: None,
            message: "429".to_string(),
        })]);
        let outcome = BackendExecutor::new(&backend, 42.0).execute("t", None);
        assert_eq!(
            outcome,
            ExecOutcome::Throttled {
                retry_after_secs: 42.0,
                message: "429".to_string()
            }
        );
        assert_eq!(
            outcome.to_string(),
            "[rate limited] 429 | retry after 42 seconds"
        );
    }

    #[test]
    fn throttle_hint_wins_over_default() {
        let backend = ScriptedBackend::new(vec![Err(BackendError::RateLimited {
            retry_after_secs: Some(5.5),
            message: "slow down".to_string(),
        })]);
        let outcome = BackendExecutor::new(&backend, 60.0).execute("t", None);
        assert!(matches!(
            outcome,
            ExecOutcome::Throttled { retry_after_secs, .. } if retry_after_secs == 5.5
        ));
    }

    #[test]
    fn failure_renders_marker() {
        let backend = ScriptedBackend::new(vec![Err(BackendError::Failed("boom".to_string()))]);
        let outcome = BackendExecutor::new(&backend, 60.0).execute("t", None);
        assert!(!outcome.is_completed());
        assert_eq!(outcome.to_string(), "[execution error] boom");
    }

    #[test]
    fn wait_and_retry_has_no_strategy_hint() {
        assert_eq!(strategy_hint(Action::WaitAndRetry), None);
        assert!(strategy_hint(Action::RetryReasoning).is_some());
    }
}
