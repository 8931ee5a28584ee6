//! Executor for retiring a single expired entry.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};

use nix::errno::Errno;

use super::types::{Candidate, DisposalMethod};

/// Result of one disposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisposalOutcome {
    /// The entry was removed.
    Deleted,
    /// The entry now lives at `to`.
    Moved { to: PathBuf },
    /// Nothing was touched because dry-run is on.
    DryRun,
    /// The entry could not be disposed of.
    Failed { reason: String },
}

impl DisposalOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, DisposalOutcome::Failed { .. })
    }
}

/// Options for the disposer.
#[derive(Debug, Clone, Default)]
pub struct DisposeOptions {
    /// If true, don't actually delete or move anything.
    pub dry_run: bool,
}

/// Deletes or moves one candidate at a time.
pub struct Disposer {
    options: DisposeOptions,
}

impl Disposer {
    /// Create a new disposer with the given options.
    pub fn new(options: DisposeOptions) -> Self {
        Self { options }
    }

    pub fn is_dry_run(&self) -> bool {
        self.options.dry_run
    }

    /// Apply `method` to `candidate`. Failures are reported, never propagated.
    pub fn dispose(&self, candidate: &Candidate, method: &DisposalMethod) -> DisposalOutcome {
        if self.options.dry_run {
            return DisposalOutcome::DryRun;
        }

        let result = match method {
            DisposalMethod::Delete => Self::delete(candidate).map(|()| DisposalOutcome::Deleted),
            DisposalMethod::Move { destination } => {
                Self::relocate(candidate, destination).map(|to| DisposalOutcome::Moved { to })
            }
        };

        result.unwrap_or_else(|e| DisposalOutcome::Failed {
            reason: e.to_string(),
        })
    }

    fn delete(candidate: &Candidate) -> io::Result<()> {
        if candidate.is_dir {
            fs::remove_dir_all(removal_path(&candidate.path))
        } else {
            fs::remove_file(&candidate.path)
        }
    }

    fn relocate(candidate: &Candidate, destination: &Path) -> io::Result<PathBuf> {
        let name = candidate.path.file_name().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} has no file name", candidate.path.display()),
            )
        })?;
        let target = destination.join(name);

        // rename(2) silently replaces files and empty directories
        if target.symlink_metadata().is_ok() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!(
                    "Cannot move {}: {} already exists",
                    candidate.path.display(),
                    target.display()
                ),
            ));
        }

        match fs::rename(&candidate.path, &target) {
            Ok(()) => Ok(target),
            Err(e) if is_cross_device(&e) && !candidate.is_dir => {
                fs::copy(&candidate.path, &target)?;
                fs::remove_file(&candidate.path)?;
                Ok(target)
            }
            Err(e) => Err(e),
        }
    }
}

fn is_cross_device(err: &io::Error) -> bool {
    err.raw_os_error() == Some(Errno::EXDEV as i32)
}

/// Directory paths ending in a space get a trailing separator so the
/// removal call sees the full name.
pub fn removal_path(path: &Path) -> PathBuf {
    let raw = path.as_os_str();
    if raw.to_string_lossy().ends_with(' ') {
        let mut with_separator = OsString::from(raw);
        with_separator.push(MAIN_SEPARATOR.to_string());
        PathBuf::from(with_separator)
    } else {
        path.to_path_buf()
    }
}
