//! Text-generation backend abstraction.
//!
//! The [`Backend`] trait decouples the agents from the actual model provider.
//! [`CommandBackend`] shells out to a CLI that reads a prompt on stdin and
//! prints the completion on stdout. Tests use scripted backends that return
//! predetermined completions without spawning processes.

use std::fmt;
use std::process::Command;
use std::time::Duration;

use tracing::{debug, instrument, warn};

use crate::core::retry_hint::{looks_throttled, parse_retry_hint};
use crate::io::config::BackendConfig;
use crate::io::process::{ProcessLimits, ProcessOutput, run_with_input};

const MESSAGE_LIMIT_CHARS: usize = 150;

/// Why a backend call produced no completion.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendError {
    /// The provider throttled the call. `retry_after_secs` is its hint, if any.
    RateLimited {
        retry_after_secs: Option<f64>,
        message: String,
    },
    /// Any other failure.
    Failed(String),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::RateLimited {
                retry_after_secs: Some(secs),
                message,
            } => write!(f, "rate limited (retry after {secs}s): {message}"),
            BackendError::RateLimited {
                retry_after_secs: None,
                message,
            } => write!(f, "rate limited: {message}"),
            BackendError::Failed(message) => write!(f, "backend failed: {message}"),
        }
    }
}

impl std::error::Error for BackendError {}

/// Abstraction over text-generation backends.
///
/// Implementations must be safe to share between independent workflow runs.
pub trait Backend: Send + Sync {
    /// Complete `prompt`. Never panics on provider failures.
    fn generate(&self, prompt: &str) -> Result<String, BackendError>;
}

impl<T: Backend + ?Sized> Backend for &T {
    fn generate(&self, prompt: &str) -> Result<String, BackendError> {
        (**self).generate(prompt)
    }
}

/// Backend that spawns a configured command per call.
#[derive(Debug, Clone)]
pub struct CommandBackend {
    command: Vec<String>,
    limits: ProcessLimits,
}

impl CommandBackend {
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            command: config.command.clone(),
            limits: ProcessLimits {
                timeout: Duration::from_secs(config.timeout_secs),
                output_limit_bytes: config.output_limit_bytes,
            },
        }
    }
}

impl Backend for CommandBackend {
    #[instrument(skip_all, fields(timeout_secs = self.limits.timeout.as_secs(), prompt_bytes = prompt.len()))]
    fn generate(&self, prompt: &str) -> Result<String, BackendError> {
        let Some((program, args)) = self.command.split_first() else {
            return Err(BackendError::Failed("backend command is empty".to_string()));
        };
        debug!(program = %program, "invoking backend command");

        let mut cmd = Command::new(program);
        cmd.args(args);
        let output = run_with_input(cmd, prompt.as_bytes(), self.limits).map_err(|err| {
            BackendError::Failed(truncate_chars(&format!("{err:#}"), MESSAGE_LIMIT_CHARS))
        })?;

        classify_output(&output, self.limits.timeout)
    }
}

/// Map a finished backend process to a completion or a typed failure.
fn classify_output(output: &ProcessOutput, timeout: Duration) -> Result<String, BackendError> {
    if output.timed_out {
        warn!(timeout_secs = timeout.as_secs(), "backend timed out");
        return Err(BackendError::Failed(format!(
            "backend timed out after {}s",
            timeout.as_secs()
        )));
    }

    if !output.status.success() {
        let diagnostics = format!("{}\n{}", output.stderr.text(), output.stdout.text());
        let diagnostics = diagnostics.trim();
        let message = truncate_chars(diagnostics, MESSAGE_LIMIT_CHARS);
        if looks_throttled(diagnostics) {
            let retry_after_secs = parse_retry_hint(diagnostics);
            warn!(?retry_after_secs, "backend throttled");
            return Err(BackendError::RateLimited {
                retry_after_secs,
                message,
            });
        }
        warn!(exit_code = ?output.status.code(), "backend failed");
        return Err(BackendError::Failed(format!(
            "exit status {:?}: {message}",
            output.status.code()
        )));
    }

    let text = output.stdout.text();
    let text = text.trim();
    if text.is_empty() {
        return Err(BackendError::Failed(
            "backend returned empty output".to_string(),
        ));
    }
    Ok(text.to_string())
}

/// Truncate to at most `max_chars` characters, marking the cut.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé...");
        assert_eq!(truncate_chars("short", 10), "short");
    }

    #[test]
    fn display_mentions_hint() {
        let err = BackendError::RateLimited {
            retry_after_secs: Some(7.5),
            message: "quota".to_string(),
        };
        assert_eq!(err.to_string(), "rate limited (retry after 7.5s): quota");
    }

    #[cfg(unix)]
    mod command {
        use super::super::*;

        fn backend(script: &str) -> CommandBackend {
            CommandBackend::new(&BackendConfig {
                command: vec!["sh".to_string(), "-c".to_string(), script.to_string()],
                timeout_secs: 10,
                output_limit_bytes: 10_000,
            })
        }

        #[test]
        fn returns_trimmed_stdout() {
            let out = backend("cat; echo").generate("  the answer  ").expect("generate");
            assert_eq!(out, "the answer");
        }

        #[test]
        fn throttled_exit_carries_hint() {
            let err = backend("echo '429 RESOURCE_EXHAUSTED: Please retry in 51.63s.' >&2; exit 1")
                .generate("p")
                .unwrap_err();
            match err {
                BackendError::RateLimited {
                    retry_after_secs, ..
                } => assert_eq!(retry_after_secs, Some(51.63)),
                other => panic!("expected rate limit, got {other:?}"),
            }
        }

        #[test]
        fn throttled_exit_without_hint() {
            let err = backend("echo 'Too Many Requests' >&2; exit 1")
                .generate("p")
                .unwrap_err();
            assert!(matches!(
                err,
                BackendError::RateLimited {
                    retry_after_secs: None,
                    ..
                }
            ));
        }

        #[test]
        fn generic_exit_is_failure() {
            let err = backend("echo 'model not found' >&2; exit 3")
                .generate("p")
                .unwrap_err();
            match err {
                BackendError::Failed(message) => {
                    assert!(message.contains("model not found"), "{message}");
                }
                other => panic!("expected failure, got {other:?}"),
            }
        }

        #[test]
        fn empty_output_is_failure() {
            let err = backend("cat >/dev/null").generate("p").unwrap_err();
            assert_eq!(
                err,
                BackendError::Failed("backend returned empty output".to_string())
            );
        }
    }
}
