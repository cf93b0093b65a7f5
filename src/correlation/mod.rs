//! Sliding-window failure detector.
//!
//! Every failed login is filed under its correlation key (the source IP).
//! A key whose window holds `threshold` failures raises one alert and is
//! reset, so a sustained burst alerts once per `threshold` new failures.

mod window;

pub use window::KeyWindow;

use crate::config::DetectionConfig;
use crate::detection::{AlertEvent, FailureEvent};
use crate::metrics::FAILURES_SEEN;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Detector that owns one [`KeyWindow`] per observed key.
///
/// The key map is bounded: once `max_keys` keys are tracked, the least
/// recently updated key is dropped to make room.
pub struct FailureDetector {
    windows: LruCache<String, KeyWindow>,
    threshold: usize,
    window: Duration,
    /// Monotonic origin for timestamps
    origin: Instant,
}

impl std::fmt::Debug for FailureDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailureDetector")
            .field("threshold", &self.threshold)
            .field("window", &self.window)
            .field("tracked_keys", &self.windows.len())
            .finish()
    }
}

impl FailureDetector {
    /// Create a detector from configuration.
    pub fn new(config: &DetectionConfig) -> Self {
        Self::with_capacity(config.threshold, config.window_secs, config.max_keys)
    }

    /// Create with explicit threshold and window, default key capacity.
    pub fn with_params(threshold: usize, window_secs: u64) -> Self {
        Self::with_capacity(threshold, window_secs, DetectionConfig::default().max_keys)
    }

    /// Create with custom key capacity.
    pub fn with_capacity(threshold: usize, window_secs: u64, max_keys: usize) -> Self {
        let capacity = NonZeroUsize::new(max_keys).unwrap_or(NonZeroUsize::MIN);
        Self {
            windows: LruCache::new(capacity),
            threshold: threshold.max(1),
            window: Duration::from_secs(window_secs),
            origin: Instant::now(),
        }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn window_secs(&self) -> u64 {
        self.window.as_secs()
    }

    /// Time elapsed on the detector's monotonic clock.
    pub fn elapsed(&self) -> Duration {
        self.origin.elapsed()
    }

    /// Classify `line` and update its key's window at the current time.
    pub fn observe(&mut self, line: &str) -> Option<AlertEvent> {
        let now = self.elapsed();
        self.observe_at(line, now)
    }

    /// Classify `line` and update its key's window at time `now`.
    pub fn observe_at(&mut self, line: &str, now: Duration) -> Option<AlertEvent> {
        let event = FailureEvent::from_line(line, now)?;
        FAILURES_SEEN.inc();
        debug!(key = %event.key, pattern = event.pattern, "Failed login");
        self.record_event(&event)
    }

    pub fn record_event(&mut self, event: &FailureEvent) -> Option<AlertEvent> {
        self.record_at(&event.key, event.timestamp)
    }

    /// Record one failure for `key` at `now`.
    ///
    /// Returns an alert when the live count reaches the threshold; the key's
    /// window is emptied at the same time.
    pub fn record_at(&mut self, key: &str, now: Duration) -> Option<AlertEvent> {
        if !self.windows.contains(key) {
            if let Some((evicted, _)) = self.windows.push(key.to_string(), KeyWindow::new()) {
                debug!(key = %evicted, "Key capacity reached, dropped least recent key");
            }
        }

        let window_len = self.window;
        let window = self.windows.get_mut(key)?;
        let count = window.record(now, window_len);
        if count < self.threshold {
            return None;
        }

        window.clear();
        info!(key, count, window_secs = self.window.as_secs(), "Failure threshold reached");
        Some(AlertEvent::new(key, count, self.window.as_secs()))
    }

    /// Live count for `key` without touching recency.
    pub fn window_len(&self, key: &str) -> usize {
        self.windows.peek(key).map(KeyWindow::len).unwrap_or(0)
    }

    /// Get the number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }

    /// Drop keys with no failure inside the window as of `now`.
    ///
    /// Returns the number of keys removed.
    pub fn sweep_idle(&mut self, now: Duration) -> usize {
        let window_len = self.window;
        let idle: Vec<String> = self
            .windows
            .iter_mut()
            .filter_map(|(key, window)| {
                window.evict(now, window_len);
                window.is_empty().then(|| key.clone())
            })
            .collect();

        for key in &idle {
            self.windows.pop(key.as_str());
        }

        if !idle.is_empty() {
            debug!(removed = idle.len(), remaining = self.windows.len(), "Swept idle keys");
        }
        idle.len()
    }

    /// Like [`sweep_idle`](Self::sweep_idle) at the current time.
    pub fn sweep(&mut self) -> usize {
        let now = self.elapsed();
        self.sweep_idle(now)
    }
}

impl Default for FailureDetector {
    fn default() -> Self {
        Self::new(&DetectionConfig::default())
    }
}
