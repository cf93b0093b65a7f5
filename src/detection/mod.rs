//! Common types for failed-login detection.

pub mod patterns;

pub use patterns::{event_key, extract_ip, is_failed_login, matched_pattern, FAILED_PATTERNS};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Key used for failures whose line carries no IPv4 address.
pub const UNKNOWN_KEY: &str = "unknown";

/// A single line read from a followed log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub source: PathBuf,
    pub text: String,
}

impl LogLine {
    pub fn new(source: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            text: text.into(),
        }
    }
}

/// A line classified as a failed login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureEvent {
    /// Source IP, or [`UNKNOWN_KEY`]
    pub key: String,
    /// Monotonic offset since the detector started
    pub timestamp: Duration,
    /// Which configured pattern matched
    pub pattern: &'static str,
}

impl FailureEvent {
    /// Classify `line` at time `timestamp`, returning `None` for non-failures.
    pub fn from_line(line: &str, timestamp: Duration) -> Option<Self> {
        let pattern = matched_pattern(line)?;
        Some(Self {
            key: event_key(line).to_string(),
            timestamp,
            pattern,
        })
    }

    pub fn is_unattributed(&self) -> bool {
        self.key == UNKNOWN_KEY
    }
}

/// Raised when a key reaches the failure threshold inside the window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub key: String,
    pub count: usize,
    pub window_seconds: u64,
    pub raised_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
}

impl AlertEvent {
    pub fn new(key: impl Into<String>, count: usize, window_seconds: u64) -> Self {
        Self {
            key: key.into(),
            count,
            window_seconds,
            raised_at: Utc::now(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl std::fmt::Display for AlertEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[ALERT] {} failed logins from {} within {}s",
            self.count, self.key, self.window_seconds
        )
    }
}
