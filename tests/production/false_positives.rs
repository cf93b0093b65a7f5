//! False Positive Tests
//!
//! Ordinary auth traffic must never reach a key window.

use super::fixtures::*;
use failwatch::correlation::FailureDetector;
use failwatch::detection::{is_failed_login, FailureEvent};
use std::time::Duration;

/// Test: Benign lines are not classified as failures
#[test]
fn test_benign_lines_not_classified() {
    for line in benign_lines() {
        assert!(!is_failed_login(line), "false positive: {}", line);
        assert!(FailureEvent::from_line(line, Duration::ZERO).is_none());
    }
}

/// Test: A flood of benign lines leaves the detector empty
#[test]
fn test_benign_flood_tracks_nothing() {
    let mut detector = FailureDetector::with_params(1, 60);
    for round in 0..100u64 {
        for line in benign_lines() {
            assert!(detector.observe_at(line, Duration::from_secs(round)).is_none());
        }
    }
    assert_eq!(detector.tracked_keys(), 0);
}

/// Test: Successful logins from an attacking address don't add to its count
#[test]
fn test_success_does_not_count_toward_attacker() {
    let mut detector = FailureDetector::default();
    let failure = ssh_failure_from("10.0.0.5");
    let success = "sshd[501]: Accepted password for deploy from 10.0.0.5 port 50122 ssh2";

    for t in 0..4 {
        assert!(detector.observe_at(&failure, Duration::from_secs(t)).is_none());
        assert!(detector.observe_at(success, Duration::from_secs(t)).is_none());
    }
    assert_eq!(detector.window_len("10.0.0.5"), 4);
}

/// Test: Near-miss phrasing is not a failure
#[test]
fn test_near_misses() {
    let near_misses = [
        "Failed to open /var/log/auth.log",
        "password changed for root",
        "user admin logged in",
        "login succeeded for bob from 10.1.1.1",
        "invalid token in request",
        "authentication succeeded",
    ];
    for line in near_misses {
        assert!(!is_failed_login(line), "false positive: {}", line);
    }
}
