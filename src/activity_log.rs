//! Durable, append-only activity log.
//!
//! Every event is one line, `"<UTC timestamp>: <message>\n"`. A write that
//! keeps failing after the retry budget is fatal to the process: the log is
//! the only record of what the service deleted or moved.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::{LogError, Result, SweeperError, EXIT_LOG_FAILURE};

/// Destination for formatted log lines.
pub trait LogSink: Send {
    /// Append one complete line. Partial writes must not be left behind on success.
    fn append(&mut self, line: &str) -> io::Result<()>;
}

/// Appends to a file, reopening it for every line so external rotation and
/// concurrent writers are tolerated.
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogSink for FileSink {
    fn append(&mut self, line: &str) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.sync_data()
    }
}

/// Keeps lines in memory; shares its buffer with every clone.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything written so far
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl LogSink for MemorySink {
    fn append(&mut self, line: &str) -> io::Result<()> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_string());
        Ok(())
    }
}

/// Bounded retry for sink writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total write attempts, including the first
    pub max_attempts: u32,
    /// Fixed pause between attempts
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: Duration::from_millis(100),
        }
    }
}

pub struct ActivityLog {
    sink: Mutex<Box<dyn LogSink>>,
    policy: RetryPolicy,
    verbose: bool,
}

impl ActivityLog {
    /// Open a file-backed log, creating its parent directory.
    pub fn open(path: &Path, verbose: bool) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| SweeperError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        Ok(Self::with_sink(
            Box::new(FileSink::new(path)),
            verbose,
            RetryPolicy::default(),
        ))
    }

    pub fn with_sink(sink: Box<dyn LogSink>, verbose: bool, policy: RetryPolicy) -> Self {
        Self {
            sink: Mutex::new(sink),
            policy,
            verbose,
        }
    }

    /// Whether per-candidate diagnostics are wanted
    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Record `message`, or terminate the process with [`EXIT_LOG_FAILURE`]
    /// once the retry budget is spent.
    pub fn log(&self, message: impl AsRef<str>) {
        if let Err(e) = self.try_log(message.as_ref()) {
            tracing::error!("Activity log unavailable, exiting: {}", e);
            eprintln!("drive-sweeper: {e}");
            std::process::exit(EXIT_LOG_FAILURE);
        }
    }

    /// Record `message`, returning the error instead of exiting.
    pub fn try_log(&self, message: &str) -> std::result::Result<(), LogError> {
        tracing::debug!("{}", message);

        let line = format_line(Utc::now(), message);
        let mut sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);

        let mut attempts = 0;
        loop {
            attempts += 1;
            match sink.append(&line) {
                Ok(()) => return Ok(()),
                Err(source) if attempts >= self.policy.max_attempts => {
                    return Err(LogError::Exhausted { attempts, source });
                }
                Err(e) => {
                    tracing::warn!("Log write attempt {} failed: {}", attempts, e);
                    thread::sleep(self.policy.backoff);
                }
            }
        }
    }
}

/// `2026-10-16 08:15:00Z: message\n`
pub fn format_line(timestamp: DateTime<Utc>, message: &str) -> String {
    format!("{}: {}\n", format_timestamp(timestamp), message)
}

/// Universal sortable form, `2026-10-16 08:15:00Z`
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%SZ").to_string()
}
