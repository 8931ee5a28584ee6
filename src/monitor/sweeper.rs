//! Age-based enumeration of a watch path.
//!
//! Only the direct children of the watch path are visited. A subdirectory is
//! one disposal unit and is never descended into.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use thiserror::Error;
use walkdir::WalkDir;

use super::types::Candidate;

/// An entry (or the watch path itself) that could not be read
#[derive(Error, Debug)]
pub enum SweepError {
    #[error("Cannot read {}: {source}", .path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Cannot read last write time of {}: {source}", .path.display())]
    Modified {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SweepError {
    pub fn path(&self) -> &Path {
        match self {
            SweepError::Walk { path, .. } | SweepError::Modified { path, .. } => path,
        }
    }
}

pub struct RetentionSweeper {
    watch_path: PathBuf,
    now: SystemTime,
}

impl RetentionSweeper {
    /// Sweep `watch_path`, measuring ages against the current time
    pub fn new(watch_path: impl Into<PathBuf>) -> Self {
        Self::at(watch_path, SystemTime::now())
    }

    /// Sweep `watch_path`, measuring ages against `now`
    pub fn at(watch_path: impl Into<PathBuf>, now: SystemTime) -> Self {
        Self {
            watch_path: watch_path.into(),
            now,
        }
    }

    /// Lazily enumerate the children of the watch path in file-name order.
    ///
    /// An unreadable entry is reported as an `Err` item and iteration
    /// continues. If the watch path itself cannot be opened, a single `Err` is
    /// produced.
    pub fn candidates(self) -> impl Iterator<Item = Result<Candidate, SweepError>> {
        let now = self.now;
        let watch_path = self.watch_path.clone();

        WalkDir::new(&self.watch_path)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .map(move |entry| {
                let walk_error = |source: walkdir::Error| SweepError::Walk {
                    path: source
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| watch_path.clone()),
                    source,
                };

                let entry = entry.map_err(walk_error)?;
                let metadata = entry.metadata().map_err(walk_error)?;
                let modified = metadata.modified().map_err(|source| SweepError::Modified {
                    path: entry.path().to_path_buf(),
                    source,
                })?;

                Ok(Candidate::new(
                    entry.into_path(),
                    modified,
                    metadata.is_dir(),
                    now,
                ))
            })
    }
}
