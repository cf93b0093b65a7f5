//! TOML-based configuration for the detector and log followers.
//!
//! The failure pattern set is fixed in [`crate::detection::FAILED_PATTERNS`];
//! only thresholds, intervals and output settings are configurable.

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_THRESHOLD: usize = 5;
const DEFAULT_WINDOW_SECS: u64 = 60;
const DEFAULT_MAX_KEYS: usize = 10_000;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;
const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
const DEFAULT_MAX_READ_FAILURES: u32 = 5;
const DEFAULT_MAX_LINE_BYTES: usize = 64 * 1024;
const DEFAULT_LOG_PATH: &str = "samples/ids_sample.log";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub follower: FollowerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_paths")]
    pub log_paths: Vec<PathBuf>,
    /// Rendering of alert lines on stdout
    #[serde(default)]
    pub alert_format: LogFormat,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Text,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Failures within the window that raise an alert
    #[serde(default = "default_threshold")]
    pub threshold: usize,
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    /// Upper bound on tracked source keys (LRU)
    #[serde(default = "default_max_keys")]
    pub max_keys: usize,
    /// How often keys with an empty window are dropped
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowerConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Consecutive read errors tolerated before giving up on a file
    #[serde(default = "default_max_read_failures")]
    pub max_read_failures: u32,
    /// A partial line this long is delivered without waiting for its newline
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,
}

fn default_threshold() -> usize { DEFAULT_THRESHOLD }
fn default_window_secs() -> u64 { DEFAULT_WINDOW_SECS }
fn default_max_keys() -> usize { DEFAULT_MAX_KEYS }
fn default_sweep_interval_secs() -> u64 { DEFAULT_SWEEP_INTERVAL_SECS }
fn default_poll_interval_ms() -> u64 { DEFAULT_POLL_INTERVAL_MS }
fn default_max_read_failures() -> u32 { DEFAULT_MAX_READ_FAILURES }
fn default_max_line_bytes() -> usize { DEFAULT_MAX_LINE_BYTES }
fn default_log_paths() -> Vec<PathBuf> { vec![PathBuf::from(DEFAULT_LOG_PATH)] }

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_paths: default_log_paths(),
            alert_format: LogFormat::Text,
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            window_secs: DEFAULT_WINDOW_SECS,
            max_keys: DEFAULT_MAX_KEYS,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
        }
    }
}

impl DetectionConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for FollowerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_read_failures: DEFAULT_MAX_READ_FAILURES,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }
}

impl FollowerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the detector or followers can't run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.general.log_paths.is_empty() {
            bail!("general.log_paths must name at least one file");
        }
        if self.detection.threshold == 0 {
            bail!("detection.threshold must be at least 1");
        }
        if self.detection.window_secs == 0 {
            bail!("detection.window_secs must be at least 1");
        }
        if self.detection.max_keys == 0 {
            bail!("detection.max_keys must be at least 1");
        }
        if self.detection.sweep_interval_secs == 0 {
            bail!("detection.sweep_interval_secs must be at least 1");
        }
        if self.follower.poll_interval_ms == 0 {
            bail!("follower.poll_interval_ms must be at least 1");
        }
        if self.follower.max_line_bytes == 0 {
            bail!("follower.max_line_bytes must be at least 1");
        }
        Ok(())
    }
}
