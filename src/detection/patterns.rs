//! Failed-login classification and source IP extraction.
//!
//! Both functions are total over arbitrary text: a line that doesn't match
//! is simply not an event.

use super::UNKNOWN_KEY;
use once_cell::sync::Lazy;
use regex::Regex;

/// Literal substrings that mark a failed login, compared case-insensitively.
pub const FAILED_PATTERNS: &[&str] = &[
    "Failed password",
    "Failed login",
    "authentication failure",
    "Invalid user",
    "login failed",
];

static LOWERED_PATTERNS: Lazy<Vec<(String, &'static str)>> = Lazy::new(|| {
    FAILED_PATTERNS
        .iter()
        .map(|p| (p.to_lowercase(), *p))
        .collect()
});

// Octets are not range-checked; any 1-3 digit group qualifies.
static IPV4_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[0-9]{1,3}(?:\.[0-9]{1,3}){3}").unwrap());

/// Return the first configured pattern contained in `line`, ignoring case.
pub fn matched_pattern(line: &str) -> Option<&'static str> {
    let lower = line.to_lowercase();
    LOWERED_PATTERNS
        .iter()
        .find(|(needle, _)| lower.contains(needle.as_str()))
        .map(|(_, original)| *original)
}

/// Check whether `line` reports a failed login.
pub fn is_failed_login(line: &str) -> bool {
    matched_pattern(line).is_some()
}

/// Extract the leftmost dotted-quad token from `line`.
pub fn extract_ip(line: &str) -> Option<&str> {
    IPV4_RE.find(line).map(|m| m.as_str())
}

/// Correlation key for a failure line: its IP, or [`UNKNOWN_KEY`].
pub fn event_key(line: &str) -> &str {
    extract_ip(line).unwrap_or(UNKNOWN_KEY)
}
