//! Parsing of the validator backend's structured verdict.
//!
//! The backend is an untrusted source: its answer may be wrapped in Markdown
//! fences, use legacy key names, or carry labels outside the known set.

use std::sync::LazyLock;

use anyhow::{Context, Result, bail};
use jsonschema::Draft;
use serde::Deserialize;
use serde_json::Value;

use crate::core::types::{ErrorKind, ValidationResult};

const VERDICT_SCHEMA: &str = include_str!("../../schemas/verdict.schema.json");
const MISSING_FEEDBACK: &str = "No reasoning provided";

static VERDICT_VALIDATOR: LazyLock<jsonschema::Validator> = LazyLock::new(|| {
    let schema: Value =
        serde_json::from_str(VERDICT_SCHEMA).expect("verdict schema should be valid json");
    jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema)
        .expect("verdict schema should compile")
});

#[derive(Debug, Deserialize)]
struct RawVerdict {
    score: f64,
    error_kind: Option<String>,
    error_type: Option<String>,
    feedback: Option<String>,
    reasoning: Option<String>,
}

/// Strip Markdown code fences around a JSON payload.
///
/// Prefers a ```` ```json ```` block, then any fenced block, else the trimmed input.
pub fn strip_code_fences(raw: &str) -> &str {
    let inner = if let Some((_, rest)) = raw.split_once("```json") {
        rest.split("```").next().unwrap_or(rest)
    } else if let Some((_, rest)) = raw.split_once("```") {
        rest.split("```").next().unwrap_or(rest)
    } else {
        raw
    };
    inner.trim()
}

/// Parse a verdict into a [`ValidationResult`] using `acceptance_threshold`.
///
/// Scores are clamped into `[0, 1]`; unknown kinds fall back to
/// [`ErrorKind::Semantic`]; blank feedback gets a placeholder.
///
/// `rate_limit` is not a verdict the classifier may give: throttling only
/// arrives as a typed backend signal, so that label takes the unknown-kind
/// fallback too.
pub fn parse_verdict(raw: &str, acceptance_threshold: f64) -> Result<ValidationResult> {
    let cleaned = strip_code_fences(raw);
    let value: Value = serde_json::from_str(cleaned).context("parse verdict json")?;

    let messages: Vec<String> = VERDICT_VALIDATOR
        .iter_errors(&value)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        bail!("verdict does not match schema: {}", messages.join("; "));
    }

    let verdict: RawVerdict = serde_json::from_value(value).context("decode verdict")?;
    if !verdict.score.is_finite() {
        bail!("verdict score is not finite");
    }
    let score = verdict.score.clamp(0.0, 1.0);

    let label = verdict
        .error_kind
        .or(verdict.error_type)
        .unwrap_or_default();
    let error_kind = match ErrorKind::from_label(&label) {
        Some(ErrorKind::RateLimit) | None => ErrorKind::Semantic,
        Some(kind) => kind,
    };

    let feedback = verdict
        .feedback
        .or(verdict.reasoning)
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| MISSING_FEEDBACK.to_string());

    Ok(ValidationResult::scored(
        score,
        acceptance_threshold,
        error_kind,
        feedback,
    ))
}
