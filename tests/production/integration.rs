//! Integration Tests
//!
//! Full pipeline runs over real files: followers, detector loop and alert
//! channel wired together the way the binary wires them.

use super::fixtures::*;
use failwatch::config::{Config, FollowerConfig, LogFormat};
use failwatch::detection::AlertEvent;
use failwatch::pipeline::{Pipeline, RunOutcome};
use failwatch::response::ResponseHandler;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

fn follower_config() -> FollowerConfig {
    FollowerConfig {
        poll_interval_ms: 20,
        ..FollowerConfig::default()
    }
}

fn append_lines(path: &Path, lines: &[&str]) {
    let mut file = OpenOptions::new().append(true).open(path).expect("open for append");
    for line in lines {
        writeln!(file, "{}", line).expect("append");
    }
    file.flush().expect("flush");
}

struct Running {
    alerts: mpsc::Receiver<AlertEvent>,
    stop: oneshot::Sender<()>,
    handle: JoinHandle<Result<RunOutcome, failwatch::FollowError>>,
}

async fn start(paths: &[PathBuf]) -> Running {
    let followers = Pipeline::open_followers(paths, &follower_config())
        .await
        .expect("followers open");
    let (alert_tx, alerts) = mpsc::channel(16);
    let (stop, stop_rx) = oneshot::channel::<()>();

    let pipeline = Pipeline::new(&Config::default());
    let handle = tokio::spawn(pipeline.run(followers, alert_tx, async move {
        let _ = stop_rx.await;
    }));

    Running { alerts, stop, handle }
}

async fn recv_alert(alerts: &mut mpsc::Receiver<AlertEvent>) -> AlertEvent {
    tokio::time::timeout(Duration::from_secs(5), alerts.recv())
        .await
        .expect("alert within timeout")
        .expect("alert channel open")
}

/// Test: Five appended failures produce exactly one alert tagged with its file
#[tokio::test]
async fn test_end_to_end_single_alert() {
    let file = NamedTempFile::new().unwrap();
    let mut running = start(&[file.path().to_path_buf()]).await;

    append_lines(file.path(), &[SSH_BRUTE_FORCE; 5]);
    let alert = recv_alert(&mut running.alerts).await;
    assert_eq!(alert.to_string(), "[ALERT] 5 failed logins from 10.0.0.5 within 60s");
    assert_eq!(alert.source.as_deref(), Some(file.path()));

    // The sixth line starts a fresh window.
    append_lines(file.path(), &[SSH_BRUTE_FORCE]);
    let quiet = tokio::time::timeout(Duration::from_millis(300), running.alerts.recv()).await;
    assert!(quiet.is_err(), "no second alert expected");

    running.stop.send(()).unwrap();
    let outcome = running.handle.await.unwrap().unwrap();
    assert_eq!(outcome, RunOutcome::Interrupted);
}

/// Test: Failures split across two files share one detector
#[tokio::test]
async fn test_multiple_sources_merge() {
    let auth = NamedTempFile::new().unwrap();
    let secure = NamedTempFile::new().unwrap();
    let mut running = start(&[auth.path().to_path_buf(), secure.path().to_path_buf()]).await;

    let line = ssh_failure_from("203.0.113.7");
    append_lines(auth.path(), &[line.as_str(); 3]);
    append_lines(secure.path(), &[line.as_str(); 2]);

    let alert = recv_alert(&mut running.alerts).await;
    assert_eq!(alert.key, "203.0.113.7");
    assert_eq!(alert.count, 5);
    assert!(alert.source.is_some());

    running.stop.send(()).unwrap();
    assert_eq!(running.handle.await.unwrap().unwrap(), RunOutcome::Interrupted);
}

/// Test: Benign traffic through the full pipeline raises nothing
#[tokio::test]
async fn test_benign_traffic_no_alert() {
    let file = NamedTempFile::new().unwrap();
    let mut running = start(&[file.path().to_path_buf()]).await;

    let benign = benign_lines();
    for _ in 0..5 {
        append_lines(file.path(), &benign);
    }
    let quiet = tokio::time::timeout(Duration::from_millis(300), running.alerts.recv()).await;
    assert!(quiet.is_err());

    running.stop.send(()).unwrap();
    assert_eq!(running.handle.await.unwrap().unwrap(), RunOutcome::Interrupted);
}

/// Test: Content present before start is not replayed
#[tokio::test]
async fn test_history_not_replayed() {
    let file = NamedTempFile::new().unwrap();
    append_lines(file.path(), &[SSH_BRUTE_FORCE; 4]);
    let mut running = start(&[file.path().to_path_buf()]).await;

    append_lines(file.path(), &[SSH_BRUTE_FORCE]);
    let quiet = tokio::time::timeout(Duration::from_millis(300), running.alerts.recv()).await;
    assert!(quiet.is_err(), "history must not count toward the threshold");

    running.stop.send(()).unwrap();
    running.handle.await.unwrap().unwrap();
}

/// Test: A missing path is reported before anything runs
#[tokio::test]
async fn test_missing_file_not_found() {
    let paths = [PathBuf::from("/nonexistent/dir/auth.log")];
    let err = Pipeline::open_followers(&paths, &follower_config())
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(err.to_string(), "log file not found: /nonexistent/dir/auth.log");
}

/// Test: Alerts rendered as JSON carry every field
#[tokio::test]
async fn test_alert_json_output() {
    let file = NamedTempFile::new().unwrap();
    let mut running = start(&[file.path().to_path_buf()]).await;

    append_lines(file.path(), &[SSH_BRUTE_FORCE; 5]);
    let alert = recv_alert(&mut running.alerts).await;

    let rendered = ResponseHandler::new(LogFormat::Json).render(&alert);
    let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
    assert_eq!(value["key"], "10.0.0.5");
    assert_eq!(value["count"], 5);
    assert_eq!(value["window_seconds"], 60);
    assert_eq!(value["source"], &*file.path().to_string_lossy());

    let back: AlertEvent = serde_json::from_str(&rendered).unwrap();
    assert_eq!(back, alert);

    running.stop.send(()).unwrap();
    running.handle.await.unwrap().unwrap();
}
