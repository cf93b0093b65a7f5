//! Per-key sliding time window of failure timestamps.

use std::collections::VecDeque;
use std::time::Duration;

/// Timestamps of recent failures for a single key, oldest first.
///
/// Timestamps are offsets from a monotonic origin, so they never decrease.
/// A timestamp earlier than the newest stored one is clamped to it.
#[derive(Debug, Clone, Default)]
pub struct KeyWindow {
    timestamps: VecDeque<Duration>,
}

impl KeyWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `now`, evict entries older than `window` and return the live count.
    pub fn record(&mut self, now: Duration, window: Duration) -> usize {
        let now = match self.timestamps.back() {
            Some(&newest) if now < newest => newest,
            _ => now,
        };
        self.timestamps.push_back(now);
        self.evict(now, window);
        self.timestamps.len()
    }

    /// Drop the expired prefix: every entry with `now - t > window`.
    pub fn evict(&mut self, now: Duration, window: Duration) {
        while let Some(&front) = self.timestamps.front() {
            if now.saturating_sub(front) > window {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    /// Get the number of timestamps in the window.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Check if the window is empty.
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Most recent timestamp, if any.
    pub fn newest(&self) -> Option<Duration> {
        self.timestamps.back().copied()
    }

    /// Get an iterator over timestamps without cloning.
    pub fn iter(&self) -> impl Iterator<Item = &Duration> {
        self.timestamps.iter()
    }

    /// Clear all timestamps from the window.
    pub fn clear(&mut self) {
        self.timestamps.clear();
    }
}
