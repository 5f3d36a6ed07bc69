//! Correction policy: maps a validation outcome to the next action.

use crate::core::types::{Action, AgentState, ErrorKind, ValidationResult};

/// Decide the next action for `state` given its latest `validation`.
///
/// First match wins:
/// 1. accepted results are accepted, whatever their kind or attempt count;
/// 2. the retry bound stops the loop before any error-specific branch, so a
///    throttled final attempt still terminates;
/// 3. rate limits wait before retrying;
/// 4. other kinds map to a targeted retry;
/// 5. anything left (`none` while rejected) falls back to a standard retry.
pub fn decide(state: &AgentState, validation: &ValidationResult, max_retries: u32) -> Action {
    if validation.accepted {
        return Action::Accept;
    }
    if state.attempt_count >= max_retries {
        return Action::StopMaxRetries;
    }
    match validation.error_kind {
        ErrorKind::RateLimit => Action::WaitAndRetry,
        ErrorKind::Tool => Action::RetryToolFix,
        ErrorKind::Hallucination => Action::RetryGrounding,
        ErrorKind::Constraint => Action::RetryFormatFix,
        ErrorKind::Semantic => Action::RetryReasoning,
        ErrorKind::None => Action::RetryStandard,
    }
}
