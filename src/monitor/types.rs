use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use serde::Serialize;

use crate::error::{Result, SweeperError};

const SECS_PER_DAY: f64 = 86_400.0;

/// What to do with an expired entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum DisposalMethod {
    /// Remove the file, or the directory and everything below it
    Delete,
    /// Relocate the entry into `destination`
    Move { destination: PathBuf },
}

impl fmt::Display for DisposalMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisposalMethod::Delete => write!(f, "Delete"),
            DisposalMethod::Move { .. } => write!(f, "Move"),
        }
    }
}

/// One configured (volume, watch path, policy) triple
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitorRule {
    /// Mount point or device name of the volume to measure
    pub volume: String,

    /// Directory whose direct children are candidates
    pub watch_path: PathBuf,

    pub disposal: DisposalMethod,

    /// Entries at least this many days old are disposed of
    pub age_threshold_days: u32,

    /// Free-space fraction below which the rule fires; negative = always
    pub trigger_ratio: f64,
}

impl MonitorRule {
    /// Whether a volume with `free_ratio` free space should be swept
    pub fn is_triggered(&self, free_ratio: f64) -> bool {
        free_ratio < self.trigger_ratio || self.trigger_ratio < 0.0
    }
}

impl fmt::Display for MonitorRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let move_to = match &self.disposal {
            DisposalMethod::Move { destination } => destination.display().to_string(),
            DisposalMethod::Delete => String::new(),
        };

        write!(
            f,
            "\n\tVolume: {}\n\tWatchPath: {}\n\tDisposalMethod: {}\n\tOlderThanDays: {}\n\tMoveTo: {}\n\tTriggerPercent: {}\n",
            self.volume,
            self.watch_path.display(),
            self.disposal,
            self.age_threshold_days,
            move_to,
            self.trigger_ratio * 100.0,
        )
    }
}

/// Validated runtime configuration, read-only once the service starts
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Time between evaluation passes
    pub poll_interval: Duration,

    /// Log per-candidate diagnostics
    pub verbose: bool,

    /// Activity log location
    pub log_file: PathBuf,

    /// Rules in evaluation order
    pub rules: Vec<MonitorRule>,
}

impl ServiceConfig {
    /// Multi-line settings dump written when the service starts
    pub fn settings_summary(&self) -> String {
        let mut message = format!(
            "Monitoring drives with settings:\n\tTimeIntervalSeconds = {}",
            self.poll_interval.as_secs()
        );
        for rule in &self.rules {
            message.push_str(&rule.to_string());
        }
        message
    }
}

/// Capacity of one volume at the moment of inspection
#[derive(Debug, Clone, Serialize)]
pub struct VolumeSnapshot {
    /// Identifier the snapshot was requested for
    pub volume: String,

    /// Mount point that was queried
    pub mount_point: PathBuf,

    /// Total capacity in bytes
    pub total_bytes: u64,

    /// Bytes available to unprivileged users
    pub available_bytes: u64,
}

impl VolumeSnapshot {
    /// Fraction of the volume that is free (`available / total`).
    ///
    /// A zero-capacity volume is an error rather than a ratio.
    pub fn free_ratio(&self) -> Result<f64> {
        if self.total_bytes == 0 {
            return Err(SweeperError::ZeroCapacity(self.volume.clone()));
        }
        Ok(self.available_bytes as f64 / self.total_bytes as f64)
    }

    /// Human-readable total space
    pub fn total_human(&self) -> String {
        humansize::format_size(self.total_bytes, humansize::BINARY)
    }

    /// Human-readable available space
    pub fn available_human(&self) -> String {
        humansize::format_size(self.available_bytes, humansize::BINARY)
    }
}

/// A direct child of a watch path, considered for disposal
#[derive(Debug, Clone)]
pub struct Candidate {
    pub path: PathBuf,

    /// Last write time
    pub modified: SystemTime,

    pub is_dir: bool,

    /// Fractional days since `modified`; negative if it lies in the future
    pub age_days: f64,
}

impl Candidate {
    pub fn new(path: PathBuf, modified: SystemTime, is_dir: bool, now: SystemTime) -> Self {
        Self {
            path,
            modified,
            is_dir,
            age_days: age_in_days(modified, now),
        }
    }

    /// Inclusive age check
    pub fn is_expired(&self, threshold_days: u32) -> bool {
        self.age_days >= f64::from(threshold_days)
    }

    pub fn kind(&self) -> &'static str {
        if self.is_dir {
            "Folder"
        } else {
            "File"
        }
    }
}

/// Signed age of `modified` relative to `now`, in days
pub fn age_in_days(modified: SystemTime, now: SystemTime) -> f64 {
    match now.duration_since(modified) {
        Ok(elapsed) => elapsed.as_secs_f64() / SECS_PER_DAY,
        Err(ahead) => -ahead.duration().as_secs_f64() / SECS_PER_DAY,
    }
}

/// Counters for one rule within a pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct RuleReport {
    pub volume: String,
    pub volume_found: bool,
    pub triggered: bool,
    pub free_ratio: Option<f64>,
    pub examined: usize,
    pub disposed: usize,
    /// Expired entries left in place because of dry-run
    pub dry_run: usize,
    pub failed: usize,
    pub unreadable: usize,
}

/// Outcome of one full evaluation pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct PassReport {
    pub rules: Vec<RuleReport>,
}

impl PassReport {
    pub fn total_disposed(&self) -> usize {
        self.rules.iter().map(|r| r.disposed).sum()
    }

    pub fn total_failed(&self) -> usize {
        self.rules.iter().map(|r| r.failed).sum()
    }
}
