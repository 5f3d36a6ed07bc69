//! The self-correction loop: execute, validate, decide, and retry.
//!
//! Each [`Orchestrator::run`] owns its [`AgentState`] and rate-limit counter,
//! so independent runs can proceed in parallel against shared collaborators.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};

use crate::agents::executor::Executor;
use crate::agents::validator::Validator;
use crate::core::backoff::{compute_delay, delay_duration};
use crate::core::efficiency::correction_efficiency;
use crate::core::policy::decide;
use crate::core::termination::{Termination, terminal_outcome};
use crate::core::types::{Action, AgentState, Correction, PolicyConfig};
use crate::io::metrics_log::IterationRecord;

/// Blocking wait used between rate-limited attempts.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

impl<T: Sleeper + ?Sized> Sleeper for &T {
    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration);
    }
}

/// Sleeps the current thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Cooperative cancellation signal shared with whoever may stop a run.
///
/// Checked before each attempt and after each wait; an in-flight collaborator
/// call is never interrupted.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Result of one workflow run.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowOutcome {
    /// The current result at termination, failure markers included. Empty if
    /// no attempt ran.
    pub final_result: String,
    pub efficiency: f64,
    pub termination: Termination,
    /// Last action decided, `None` if cancelled before the first decision.
    pub last_action: Option<Action>,
    /// Final state, kept for audit.
    pub state: AgentState,
}

impl WorkflowOutcome {
    pub fn is_success(&self) -> bool {
        self.termination.is_success()
    }
}

/// Drives the executor and validator until a terminal action or cancellation.
pub struct Orchestrator<E, V, S = ThreadSleeper> {
    config: PolicyConfig,
    executor: E,
    validator: V,
    sleeper: S,
    cancel: CancelToken,
}

impl<E: Executor, V: Validator> Orchestrator<E, V, ThreadSleeper> {
    pub fn new(config: PolicyConfig, executor: E, validator: V) -> Self {
        Self {
            config,
            executor,
            validator,
            sleeper: ThreadSleeper,
            cancel: CancelToken::new(),
        }
    }
}

impl<E: Executor, V: Validator, S: Sleeper> Orchestrator<E, V, S> {
    pub fn with_sleeper<S2: Sleeper>(self, sleeper: S2) -> Orchestrator<E, V, S2> {
        Orchestrator {
            config: self.config,
            executor: self.executor,
            validator: self.validator,
            sleeper,
            cancel: self.cancel,
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// Run the loop for `task` without observing iterations.
    pub fn run(&self, task: &str) -> WorkflowOutcome {
        self.run_with(task, |_| {})
    }

    /// Run the loop for `task`, calling `on_iteration` once per completed attempt.
    ///
    /// Per attempt: bump the attempt counter, execute with the previous
    /// correction, validate, append to the log, then decide with the log
    /// already holding this attempt's validation. Terminal actions
    /// end the loop. A rate-limit wait still consumes the attempt.
    #[instrument(skip_all, fields(max_retries = self.config.max_retries))]
    pub fn run_with<F: FnMut(&IterationRecord)>(
        &self,
        task: &str,
        mut on_iteration: F,
    ) -> WorkflowOutcome {
        let mut state = AgentState::new(task);
        let mut correction: Option<Correction> = None;
        let mut consecutive_rate_limits = 0u32;
        let mut last_action = None;

        let termination = loop {
            if self.cancel.is_cancelled() {
                warn!(attempt = state.attempt_count, "run cancelled");
                break Termination::Cancelled;
            }

            let started = Instant::now();
            state.attempt_count += 1;

            let outcome = self.executor.execute(&state.task, correction.as_ref());
            state.current_result = Some(outcome.to_string());

            let validation = self.validator.validate(&state.task, &outcome);
            state.validation_log.push(validation.clone());
            let action = decide(&state, &validation, self.config.max_retries);
            last_action = Some(action);

            info!(
                attempt = state.attempt_count,
                score = validation.score,
                error_kind = %validation.error_kind,
                action = %action,
                "attempt validated"
            );
            let record = IterationRecord {
                step: state.validation_log.len(),
                attempt: state.attempt_count,
                score: validation.score,
                error_kind: validation.error_kind,
                action,
                duration_secs: started.elapsed().as_secs_f64(),
            };
            on_iteration(&record);

            if let Some(termination) = terminal_outcome(action) {
                break termination;
            }

            if action == Action::WaitAndRetry {
                consecutive_rate_limits += 1;
                let base_delay_secs = validation.retry_delay_seconds;
                let delay_secs = compute_delay(
                    base_delay_secs,
                    consecutive_rate_limits,
                    self.config.backoff_multiplier,
                );
                warn!(
                    delay_secs,
                    base_secs = base_delay_secs,
                    consecutive_rate_limits,
                    "rate limited, backing off"
                );
                self.sleeper.sleep(delay_duration(delay_secs));
                if self.cancel.is_cancelled() {
                    warn!(attempt = state.attempt_count, "run cancelled after backoff");
                    break Termination::Cancelled;
                }
            } else {
                consecutive_rate_limits = 0;
            }

            correction = Some(Correction {
                feedback: validation.feedback,
                action,
            });
        };

        let efficiency = correction_efficiency(&state.validation_log);
        info!(
            termination = termination.as_str(),
            attempts = state.attempt_count,
            efficiency,
            "run finished"
        );

        WorkflowOutcome {
            final_result: state.current_result.clone().unwrap_or_default(),
            efficiency,
            termination,
            last_action,
            state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::executor::ExecOutcome;
    use crate::core::types::{ErrorKind, ValidationResult};
    use crate::test_support::{RecordingSleeper, ScriptedExecutor, ScriptedValidator, judged};

    fn policy(max_retries: u32) -> PolicyConfig {
        PolicyConfig {
            max_retries,
            ..PolicyConfig::default()
        }
    }

    #[test]
    fn accepts_on_first_good_attempt() {
        let executor = ScriptedExecutor::completing(["42"]);
        let validator = ScriptedValidator::new(vec![judged(0.0, ErrorKind::None, "ok")]);
        let sleeper = RecordingSleeper::default();

        let outcome = Orchestrator::new(policy(3), &executor, &validator)
            .with_sleeper(&sleeper)
            .run("answer");

        assert!(outcome.is_success());
        assert_eq!(outcome.final_result, "42");
        assert_eq!(outcome.last_action, Some(Action::Accept));
        assert_eq!(outcome.state.attempt_count, 1);
        assert_eq!(outcome.efficiency, 0.0);
        assert!(sleeper.waits().is_empty());
    }

    #[test]
    fn feedback_and_action_seed_next_attempt() {
        let executor = ScriptedExecutor::completing(["draft", "final"]);
        let validator = ScriptedValidator::new(vec![
            judged(0.6, ErrorKind::Constraint, "Too long."),
            judged(0.0, ErrorKind::None, "ok"),
        ]);

        Orchestrator::new(policy(3), &executor, &validator)
            .with_sleeper(RecordingSleeper::default())
            .run("t");

        let calls = executor.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].1, None);
        assert_eq!(
            calls[1].1,
            Some(Correction {
                feedback: "Too long.".to_string(),
                action: Action::RetryFormatFix,
            })
        );
        assert_eq!(validator.seen(), vec!["draft".to_string(), "final".to_string()]);
    }

    #[test]
    fn rate_limit_counter_resets_after_other_errors() {
        let executor = ScriptedExecutor::new(vec![
            ExecOutcome::Throttled {
                retry_after_secs: 10.0,
                message: "429".to_string(),
            },
            ExecOutcome::Throttled {
                retry_after_secs: 10.0,
                message: "429".to_string(),
            },
            ExecOutcome::Completed("meh".to_string()),
            ExecOutcome::Throttled {
                retry_after_secs: 10.0,
                message: "429".to_string(),
            },
            ExecOutcome::Completed("good".to_string()),
        ]);
        let validator = ScriptedValidator::new(vec![
            ValidationResult::rate_limited(10.0, "wait".to_string()),
            ValidationResult::rate_limited(10.0, "wait".to_string()),
            judged(0.5, ErrorKind::Semantic, "wrong"),
            ValidationResult::rate_limited(10.0, "wait".to_string()),
            judged(0.1, ErrorKind::None, "ok"),
        ]);
        let sleeper = RecordingSleeper::default();

        let outcome = Orchestrator::new(policy(10), &executor, &validator)
            .with_sleeper(&sleeper)
            .run("t");

        assert!(outcome.is_success());
        assert_eq!(
            sleeper.waits(),
            vec![
                Duration::from_secs(10),
                Duration::from_secs(15),
                Duration::from_secs(10),
            ]
        );
    }

    #[test]
    fn cancelled_before_start_makes_no_calls() {
        let executor = ScriptedExecutor::completing(["never"]);
        let validator = ScriptedValidator::new(Vec::new());
        let cancel = CancelToken::new();
        cancel.cancel();

        let outcome = Orchestrator::new(policy(3), &executor, &validator)
            .with_cancel(cancel)
            .run("t");

        assert_eq!(outcome.termination, Termination::Cancelled);
        assert!(!outcome.is_success());
        assert_eq!(outcome.final_result, "");
        assert_eq!(outcome.last_action, None);
        assert!(executor.calls().is_empty());
    }

    #[test]
    fn each_step_is_logged_before_its_record() {
        let executor = ScriptedExecutor::completing(["a", "b", "c"]);
        let validator = ScriptedValidator::new(vec![
            judged(0.7, ErrorKind::Tool, "bad call"),
            judged(0.4, ErrorKind::None, "meh"),
            judged(0.0, ErrorKind::None, "ok"),
        ]);
        let mut steps = Vec::new();

        let outcome = Orchestrator::new(policy(5), &executor, &validator)
            .with_sleeper(RecordingSleeper::default())
            .run_with("t", |record| steps.push((record.step, record.attempt)));

        assert_eq!(steps, vec![(1, 1), (2, 2), (3, 3)]);
        assert_eq!(outcome.state.validation_log.len(), 3);
        assert_eq!(
            outcome.state.last_validation().map(|v| v.feedback.as_str()),
            Some("ok")
        );
    }

    #[test]
    fn records_one_metric_per_attempt() {
        let executor = ScriptedExecutor::completing(["a", "b"]);
        let validator = ScriptedValidator::new(vec![
            judged(0.9, ErrorKind::Hallucination, "made up"),
            judged(0.3, ErrorKind::Semantic, "close"),
        ]);
        let mut records = Vec::new();

        let outcome = Orchestrator::new(policy(2), &executor, &validator)
            .with_sleeper(RecordingSleeper::default())
            .run_with("t", |record| records.push(record.clone()));

        assert_eq!(outcome.termination, Termination::MaxRetries);
        assert_eq!(outcome.final_result, "b");
        let actions: Vec<Action> = records.iter().map(|r| r.action).collect();
        assert_eq!(actions, vec![Action::RetryGrounding, Action::StopMaxRetries]);
        assert_eq!(records[1].step, 2);
        assert_eq!(records[1].error_kind, ErrorKind::Semantic);
        assert!((outcome.efficiency - 0.3).abs() < 1e-9);
    }
}
