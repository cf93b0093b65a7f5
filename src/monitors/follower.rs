//! Log Follower
//!
//! Tails a growing text file the way `tail -f` does:
//! - Starts at the current end of file, skipping existing content
//! - Polls at a fixed interval when no new data is available
//! - Buffers partial lines until their newline arrives, up to `max_line_bytes`
//! - Rewinds to the start when the file is truncated under it
//!
//! Rotation (the path being replaced) is not followed; reading continues on
//! the original handle.

use crate::config::FollowerConfig;
use crate::detection::LogLine;
use crate::metrics::LINES_READ;
use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncSeekExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Errors raised while following a log file.
#[derive(Debug, Error)]
pub enum FollowError {
    /// The path did not exist when the follower was opened.
    #[error("log file not found: {}", path.display())]
    NotFound { path: PathBuf },
    /// The file could not be opened or read.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The follower task ended abnormally (panic or cancellation).
    #[error("follower for {} crashed: {reason}", path.display())]
    Crashed { path: PathBuf, reason: String },
}

impl FollowError {
    fn from_open(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            Self::NotFound { path: path.to_path_buf() }
        } else {
            Self::io(path, source)
        }
    }

    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io { path: path.to_path_buf(), source }
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::NotFound { path } | Self::Io { path, .. } | Self::Crashed { path, .. } => path,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub struct LogFollower {
    path: PathBuf,
    reader: BufReader<File>,
    /// Bytes consumed from the start of the file
    offset: u64,
    /// Bytes of a line whose newline hasn't arrived yet
    pending: Vec<u8>,
    poll_interval: Duration,
    max_read_failures: u32,
    max_line_bytes: usize,
}

impl std::fmt::Debug for LogFollower {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogFollower")
            .field("path", &self.path)
            .field("offset", &self.offset)
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl LogFollower {
    /// Open `path` and position at its current end.
    pub async fn open(path: impl AsRef<Path>, config: &FollowerConfig) -> Result<Self, FollowError> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path)
            .await
            .map_err(|e| FollowError::from_open(&path, e))?;
        let offset = file
            .seek(SeekFrom::End(0))
            .await
            .map_err(|e| FollowError::io(&path, e))?;

        debug!(path = %path.display(), offset, "Opened log at end of file");

        Ok(Self {
            path,
            reader: BufReader::new(file),
            offset,
            pending: Vec::new(),
            poll_interval: config.poll_interval(),
            max_read_failures: config.max_read_failures.max(1),
            max_line_bytes: config.max_line_bytes.max(1),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wait for the next complete line, newline stripped.
    ///
    /// Never returns at end of file; it sleeps for the poll interval and
    /// retries. Read errors are retried the same way until
    /// `max_read_failures` happen in a row. A partial line that reaches
    /// `max_line_bytes` is returned as is and the remainder starts a new line.
    pub async fn next_line(&mut self) -> Result<String, FollowError> {
        let mut failures = 0u32;

        loop {
            let room = self.max_line_bytes.saturating_sub(self.pending.len()) as u64;
            let read = (&mut self.reader)
                .take(room)
                .read_until(b'\n', &mut self.pending)
                .await;
            match read {
                Ok(0) => {
                    failures = 0;
                    self.check_truncation().await?;
                    tokio::time::sleep(self.poll_interval).await;
                }
                Ok(n) => {
                    failures = 0;
                    self.offset += n as u64;
                    if self.pending.last() == Some(&b'\n') {
                        return Ok(self.take_line());
                    }
                    if self.pending.len() >= self.max_line_bytes {
                        warn!(
                            path = %self.path.display(),
                            limit = self.max_line_bytes,
                            "Line exceeds limit, splitting"
                        );
                        return Ok(self.take_line());
                    }
                }
                Err(e) => {
                    failures += 1;
                    if failures >= self.max_read_failures {
                        return Err(FollowError::io(&self.path, e));
                    }
                    warn!(path = %self.path.display(), attempt = failures, "Read failed: {}", e);
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }

    /// Forward every line to `tx` until the receiver goes away.
    pub async fn run(mut self, tx: mpsc::Sender<LogLine>) -> Result<(), FollowError> {
        info!(path = %self.path.display(), "Log follower started");

        loop {
            let text = self.next_line().await?;
            LINES_READ.inc();

            if tx.send(LogLine::new(self.path.clone(), text)).await.is_err() {
                debug!(path = %self.path.display(), "Line receiver closed, stopping follower");
                return Ok(());
            }
        }
    }

    fn take_line(&mut self) -> String {
        if self.pending.last() == Some(&b'\n') {
            self.pending.pop();
            if self.pending.last() == Some(&b'\r') {
                self.pending.pop();
            }
        }
        let line = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        line
    }

    /// Rewind when the file shrank below what we've already read.
    async fn check_truncation(&mut self) -> Result<(), FollowError> {
        let len = match self.reader.get_ref().metadata().await {
            Ok(meta) => meta.len(),
            Err(e) => {
                debug!(path = %self.path.display(), "Could not stat log: {}", e);
                return Ok(());
            }
        };

        if len < self.offset {
            warn!(
                path = %self.path.display(),
                len,
                offset = self.offset,
                "Log truncated, reading from start"
            );
            self.reader
                .seek(SeekFrom::Start(0))
                .await
                .map_err(|e| FollowError::io(&self.path, e))?;
            self.offset = 0;
            self.pending.clear();
        }
        Ok(())
    }
}
