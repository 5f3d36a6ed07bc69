//! Shared deterministic types for the correction loop.
//!
//! These types define stable contracts between the loop driver, the policy,
//! and the collaborators. They carry no I/O and serialize with stable
//! snake_case names so metrics files stay readable across versions.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Classification of what went wrong with a produced result.
///
/// Exactly one kind is attached to every validation outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No detectable error.
    None,
    /// Logical, factual, or reasoning mistake.
    Semantic,
    /// Malformed output, tool or API misuse, unparsable structured response.
    Tool,
    /// Format, length, or style violation.
    Constraint,
    /// Invented content not supported by the task.
    Hallucination,
    /// Backend throttling.
    RateLimit,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::None => "none",
            ErrorKind::Semantic => "semantic",
            ErrorKind::Tool => "tool",
            ErrorKind::Constraint => "constraint",
            ErrorKind::Hallucination => "hallucination",
            ErrorKind::RateLimit => "rate_limit",
        }
    }

    /// Parse a classifier label. Unknown labels yield `None` so callers can
    /// pick their own fallback.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "none" => Some(ErrorKind::None),
            "semantic" => Some(ErrorKind::Semantic),
            "tool" => Some(ErrorKind::Tool),
            "constraint" => Some(ErrorKind::Constraint),
            "hallucination" => Some(ErrorKind::Hallucination),
            "rate_limit" => Some(ErrorKind::RateLimit),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of validating one produced result.
///
/// `score` is a failure distance in `[0.0, 1.0]` (0.0 = perfect).
/// `retry_delay_seconds` is only meaningful for [`ErrorKind::RateLimit`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub accepted: bool,
    pub score: f64,
    pub error_kind: ErrorKind,
    pub feedback: String,
    pub retry_delay_seconds: f64,
}

impl ValidationResult {
    /// Result judged by score alone: accepted iff `score < threshold`.
    pub fn scored(score: f64, threshold: f64, error_kind: ErrorKind, feedback: String) -> Self {
        Self {
            accepted: score < threshold,
            score,
            error_kind,
            feedback,
            retry_delay_seconds: 0.0,
        }
    }

    /// Forced rejection for a throttled backend.
    pub fn rate_limited(retry_delay_seconds: f64, feedback: String) -> Self {
        Self {
            accepted: false,
            score: 1.0,
            error_kind: ErrorKind::RateLimit,
            feedback,
            retry_delay_seconds: retry_delay_seconds.max(0.0),
        }
    }

    /// Forced rejection for a generic backend or parsing failure.
    pub fn tool_failure(feedback: String) -> Self {
        Self {
            accepted: false,
            score: 1.0,
            error_kind: ErrorKind::Tool,
            feedback,
            retry_delay_seconds: 0.0,
        }
    }
}

/// Running state of one workflow invocation.
///
/// Only the loop driver mutates this. `validation_log` is append-only and
/// ordered chronologically.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentState {
    pub task: String,
    pub attempt_count: u32,
    pub current_result: Option<String>,
    pub validation_log: Vec<ValidationResult>,
}

impl AgentState {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            attempt_count: 0,
            current_result: None,
            validation_log: Vec::new(),
        }
    }

    pub fn last_validation(&self) -> Option<&ValidationResult> {
        self.validation_log.last()
    }
}

/// Decision taken by the correction policy after each validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Accept,
    StopMaxRetries,
    WaitAndRetry,
    RetryToolFix,
    RetryGrounding,
    RetryFormatFix,
    RetryReasoning,
    RetryStandard,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Accept => "accept",
            Action::StopMaxRetries => "stop_max_retries",
            Action::WaitAndRetry => "wait_and_retry",
            Action::RetryToolFix => "retry_tool_fix",
            Action::RetryGrounding => "retry_grounding",
            Action::RetryFormatFix => "retry_format_fix",
            Action::RetryReasoning => "retry_reasoning",
            Action::RetryStandard => "retry_standard",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Feedback carried from a rejected attempt into the next execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Correction {
    pub feedback: String,
    /// Non-terminal action chosen for the rejected attempt.
    pub action: Action,
}

/// Loop constants, passed explicitly so concurrent runs can differ.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolicyConfig {
    /// Hard bound on attempts, applied regardless of error kind.
    pub max_retries: u32,
    /// Scores strictly below this are accepted.
    pub acceptance_threshold: f64,
    /// Growth factor per consecutive rate-limit outcome.
    pub backoff_multiplier: f64,
    /// Wait used when a throttling signal carries no usable hint.
    pub initial_rate_limit_delay_secs: f64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            acceptance_threshold: 0.2,
            backoff_multiplier: 1.5,
            initial_rate_limit_delay_secs: 60.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_labels_round_trip_through_from_label() {
        for kind in [
            ErrorKind::None,
            ErrorKind::Semantic,
            ErrorKind::Tool,
            ErrorKind::Constraint,
            ErrorKind::Hallucination,
            ErrorKind::RateLimit,
        ] {
            assert_eq!(ErrorKind::from_label(kind.as_str()), Some(kind));
        }
        assert_eq!(ErrorKind::from_label("  Semantic "), Some(ErrorKind::Semantic));
        assert_eq!(ErrorKind::from_label("typo"), None);
    }

    #[test]
    fn action_serializes_as_snake_case() {
        let json = serde_json::to_string(&Action::StopMaxRetries).expect("serialize");
        assert_eq!(json, "\"stop_max_retries\"");
        assert_eq!(Action::WaitAndRetry.to_string(), "wait_and_retry");
    }

    #[test]
    fn scored_result_uses_strict_threshold() {
        let below = ValidationResult::scored(0.19, 0.2, ErrorKind::None, "ok".to_string());
        let at = ValidationResult::scored(0.2, 0.2, ErrorKind::Constraint, "meh".to_string());
        assert!(below.accepted);
        assert!(!at.accepted);
    }

    #[test]
    fn new_state_starts_empty() {
        let state = AgentState::new("task");
        assert_eq!(state.attempt_count, 0);
        assert!(state.current_result.is_none());
        assert!(state.last_validation().is_none());
    }
}
