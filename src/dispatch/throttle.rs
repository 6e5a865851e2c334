//! Rate-limit signal detection and wait hints

use regex::{Regex, RegexBuilder};
use std::sync::OnceLock;
use std::time::Duration;

/// Message fragments that mark a throttling response, matched case-insensitively
const THROTTLE_MARKERS: &[&str] = &["429", "resource_exhausted", "rate limit"];

/// Upper bound on a server-suggested wait
pub const MAX_RETRY_WAIT: Duration = Duration::from_secs(600);

fn retry_in_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            RegexBuilder::new(r"retry in\s+(\d+(?:\.\d+)?)\s*s")
                .case_insensitive(true)
                .build()
                .ok()
        })
        .as_ref()
}

/// True if an error message reads like a throttling response
pub fn mentions_throttling(message: &str) -> bool {
    let lowered = message.to_ascii_lowercase();
    THROTTLE_MARKERS.iter().any(|marker| lowered.contains(marker))
}

/// Extracts a server-suggested wait such as `retry in 5s` or `Retry in 2.5 s`
///
/// Hints longer than [`MAX_RETRY_WAIT`] are clamped to it.
pub fn parse_retry_delay(message: &str) -> Option<Duration> {
    let captures = retry_in_pattern()?.captures(message)?;
    let secs: f64 = captures.get(1)?.as_str().parse().ok()?;
    if secs.is_nan() || secs < 0.0 {
        return None;
    }
    let wait = Duration::try_from_secs_f64(secs).unwrap_or(MAX_RETRY_WAIT);
    Some(wait.min(MAX_RETRY_WAIT))
}
