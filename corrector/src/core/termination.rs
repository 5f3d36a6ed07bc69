//! Termination decisions derived from policy actions.

use serde::{Deserialize, Serialize};

use crate::core::types::Action;

/// How a workflow ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// A result was accepted.
    Accepted,
    /// The retry bound was reached without an accepted result.
    MaxRetries,
    /// An external cancellation stopped the loop before a terminal action.
    Cancelled,
}

impl Termination {
    pub fn is_success(self) -> bool {
        matches!(self, Termination::Accepted)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Termination::Accepted => "accepted",
            Termination::MaxRetries => "max_retries",
            Termination::Cancelled => "cancelled",
        }
    }
}

/// Returns true if `action` ends the loop.
pub fn should_terminate(action: Action) -> bool {
    terminal_outcome(action).is_some()
}

/// The terminal outcome signalled by `action`, or `None` if the loop continues.
pub fn terminal_outcome(action: Action) -> Option<Termination> {
    match action {
        Action::Accept => Some(Termination::Accepted),
        Action::StopMaxRetries => Some(Termination::MaxRetries),
        Action::WaitAndRetry
        | Action::RetryToolFix
        | Action::RetryGrounding
        | Action::RetryFormatFix
        | Action::RetryReasoning
        | Action::RetryStandard => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_accept_and_stop_are_terminal() {
        assert!(should_terminate(Action::Accept));
        assert!(should_terminate(Action::StopMaxRetries));
        for action in [
            Action::WaitAndRetry,
            Action::RetryToolFix,
            Action::RetryGrounding,
            Action::RetryFormatFix,
            Action::RetryReasoning,
            Action::RetryStandard,
        ] {
            assert!(!should_terminate(action), "{action} must not terminate");
        }
    }

    #[test]
    fn terminal_outcome_distinguishes_success_from_failure() {
        assert_eq!(terminal_outcome(Action::Accept), Some(Termination::Accepted));
        assert_eq!(
            terminal_outcome(Action::StopMaxRetries),
            Some(Termination::MaxRetries)
        );
        assert!(Termination::Accepted.is_success());
        assert!(!Termination::MaxRetries.is_success());
        assert!(!Termination::Cancelled.is_success());
    }
}
