//! Wiring from log followers to the detector.
//!
//! Each follower runs as its own task and forwards lines over a bounded
//! channel. A single loop owns the [`FailureDetector`], so window state is
//! never shared between tasks. Alerts leave through another channel to the
//! response handler. A follower that fails or crashes ends the run with an
//! error.

use crate::config::{Config, FollowerConfig};
use crate::correlation::FailureDetector;
use crate::detection::{AlertEvent, LogLine};
use crate::metrics::{ACTIVE_FOLLOWERS, TRACKED_KEYS};
use crate::monitors::{FollowError, LogFollower};
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinError, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

const LINE_CHANNEL_CAPACITY: usize = 1000;

/// How a pipeline run ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The shutdown signal fired.
    Interrupted,
    /// Every follower stopped and no lines remain.
    SourcesClosed,
}

/// Aborts the wrapped task when dropped.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Run `task` on its own tokio task, turning a panic into an error for `path`.
async fn supervise<F>(path: PathBuf, task: F) -> Result<(), FollowError>
where
    F: Future<Output = Result<(), FollowError>> + Send + 'static,
{
    let handle = tokio::spawn(task);
    let _guard = AbortOnDrop(handle.abort_handle());
    match handle.await {
        Ok(result) => result,
        Err(e) => Err(FollowError::Crashed {
            path,
            reason: e.to_string(),
        }),
    }
}

/// Log a finished follower and return its error, if it had one.
fn follower_exit(joined: Result<Result<(), FollowError>, JoinError>) -> Option<FollowError> {
    ACTIVE_FOLLOWERS.dec();
    match joined {
        Ok(Ok(())) => None,
        Ok(Err(e)) => {
            error!(path = %e.path().display(), "Follower failed: {}", e);
            Some(e)
        }
        Err(e) if e.is_cancelled() => None,
        Err(e) => {
            error!("Follower supervisor failed: {}", e);
            None
        }
    }
}

/// Wait for the remaining followers once the line channel has closed.
async fn drain(tasks: &mut JoinSet<Result<(), FollowError>>) -> Result<RunOutcome, FollowError> {
    while let Some(joined) = tasks.join_next().await {
        if let Some(e) = follower_exit(joined) {
            return Err(e);
        }
    }
    Ok(RunOutcome::SourcesClosed)
}

pub struct Pipeline {
    detector: FailureDetector,
    sweep_interval: Duration,
}

impl Pipeline {
    pub fn new(config: &Config) -> Self {
        Self::with_detector(FailureDetector::new(&config.detection), config.detection.sweep_interval())
    }

    pub fn with_detector(detector: FailureDetector, sweep_interval: Duration) -> Self {
        Self {
            detector,
            sweep_interval,
        }
    }

    pub fn detector(&self) -> &FailureDetector {
        &self.detector
    }

    /// Open every path, failing on the first one that can't be followed.
    pub async fn open_followers(
        paths: &[PathBuf],
        config: &FollowerConfig,
    ) -> Result<Vec<LogFollower>, FollowError> {
        let mut followers = Vec::with_capacity(paths.len());
        for path in paths {
            followers.push(LogFollower::open(path, config).await?);
        }
        Ok(followers)
    }

    /// Feed one line to the detector.
    pub fn handle_line(&mut self, line: &LogLine) -> Option<AlertEvent> {
        let alert = self.detector.observe(&line.text)?;
        Some(alert.with_source(&line.source))
    }

    /// Run until `shutdown` resolves, all followers stop, or one fails.
    ///
    /// Follower tasks are aborted when this returns.
    pub async fn run<F>(
        mut self,
        followers: Vec<LogFollower>,
        alerts: mpsc::Sender<AlertEvent>,
        shutdown: F,
    ) -> Result<RunOutcome, FollowError>
    where
        F: Future<Output = ()>,
    {
        let (line_tx, mut line_rx) = mpsc::channel(LINE_CHANNEL_CAPACITY);
        let mut tasks = JoinSet::new();
        for follower in followers {
            let tx = line_tx.clone();
            ACTIVE_FOLLOWERS.inc();
            let path = follower.path().to_path_buf();
            tasks.spawn(supervise(path, follower.run(tx)));
        }
        drop(line_tx);

        let mut sweep = tokio::time::interval(self.sweep_interval);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tokio::pin!(shutdown);

        let outcome = loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break Ok(RunOutcome::Interrupted);
                }
                line = line_rx.recv() => {
                    let Some(line) = line else {
                        debug!("All followers stopped");
                        break drain(&mut tasks).await;
                    };
                    if let Some(alert) = self.handle_line(&line) {
                        if alerts.send(alert).await.is_err() {
                            debug!("Alert receiver closed");
                            break Ok(RunOutcome::SourcesClosed);
                        }
                    }
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Some(e) = follower_exit(joined) {
                        break Err(e);
                    }
                }
                _ = sweep.tick() => {
                    self.detector.sweep();
                    TRACKED_KEYS.set(self.detector.tracked_keys() as i64);
                }
            }
        };

        tasks.abort_all();
        ACTIVE_FOLLOWERS.set(0);
        outcome
    }
}
