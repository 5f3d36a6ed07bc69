//! Throttling detection and retry-hint extraction for provider error text.
//!
//! Only backends call into this module. Everything downstream of a backend
//! works with typed signals.

use std::sync::LazyLock;

use regex::Regex;

static RETRY_HINT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)retry\s+(?:in|after)\s+(\d+(?:\.\d+)?)\s*s(?:ec(?:ond)?s?)?\b")
        .expect("retry hint regex should be valid")
});

const THROTTLE_MARKERS: [&str; 5] = [
    "429",
    "resource_exhausted",
    "resource exhausted",
    "rate limit",
    "too many requests",
];

/// Extract a provider's suggested wait in seconds, e.g. "Please retry in 51.63s"
/// or "retry after 60 seconds".
pub fn parse_retry_hint(text: &str) -> Option<f64> {
    RETRY_HINT_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|secs| secs.is_finite())
}

/// Returns true if `text` carries a recognizable throttling signal.
pub fn looks_throttled(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    THROTTLE_MARKERS.iter().any(|marker| lower.contains(marker))
}
