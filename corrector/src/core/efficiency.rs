//! Correction efficiency: improvement in failure score per attempt.

use crate::core::types::ValidationResult;

/// `(first.score - last.score) / len` when the first score is positive, else 0.0.
///
/// Advisory telemetry only.
pub fn correction_efficiency(log: &[ValidationResult]) -> f64 {
    let (Some(first), Some(last)) = (log.first(), log.last()) else {
        return 0.0;
    };
    if first.score <= 0.0 {
        return 0.0;
    }
    (first.score - last.score) / log.len() as f64
}
