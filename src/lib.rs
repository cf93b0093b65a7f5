//! failwatch - failed-login burst detection for live auth logs
//!
//! Follows one or more append-only logs, classifies failed-login lines, and
//! raises an alert when a single source IP produces `threshold` failures
//! within a sliding time window.
//!
//! This library provides the core detection and following functionality.
//! The binary in main.rs wires it to the command line and signals.

pub mod config;
pub mod correlation;
pub mod detection;
pub mod metrics;
pub mod monitors;
pub mod pipeline;
pub mod response;

// Re-export commonly used types
pub use config::*;
pub use correlation::{FailureDetector, KeyWindow};
pub use detection::*;
pub use monitors::{FollowError, LogFollower};
pub use pipeline::{Pipeline, RunOutcome};
pub use response::ResponseHandler;
