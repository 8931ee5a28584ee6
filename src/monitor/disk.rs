use std::fs;
use std::path::{Path, PathBuf};

use nix::sys::statvfs::statvfs;

use super::types::VolumeSnapshot;
use crate::error::{Result, SweeperError};

const PROC_MOUNTS: &str = "/proc/mounts";

/// Reads capacity for a configured volume identifier
pub trait DriveInspector: Send + Sync {
    /// `Ok(None)` when no mounted volume matches `volume`
    fn inspect(&self, volume: &str) -> Result<Option<VolumeSnapshot>>;
}

/// Information about a mount point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountPoint {
    pub device: String,
    pub path: PathBuf,
}

/// Resolves identifiers against the kernel mount table and queries `statvfs`
#[derive(Debug, Clone)]
pub struct MountTableInspector {
    mounts_file: PathBuf,
}

impl MountTableInspector {
    pub fn new() -> Self {
        Self {
            mounts_file: PathBuf::from(PROC_MOUNTS),
        }
    }

    /// Read the mount table from another file (same format as /proc/mounts)
    pub fn with_mounts_file(path: impl Into<PathBuf>) -> Self {
        Self {
            mounts_file: path.into(),
        }
    }
}

impl Default for MountTableInspector {
    fn default() -> Self {
        Self::new()
    }
}

impl DriveInspector for MountTableInspector {
    fn inspect(&self, volume: &str) -> Result<Option<VolumeSnapshot>> {
        let content = fs::read_to_string(&self.mounts_file).map_err(|source| SweeperError::Io {
            path: self.mounts_file.clone(),
            source,
        })?;
        let mounts = parse_mount_table(&content);

        let Some(mount) = find_mount(&mounts, volume) else {
            return Ok(None);
        };

        let (total_bytes, available_bytes) = query_capacity(&mount.path)?;

        Ok(Some(VolumeSnapshot {
            volume: volume.to_string(),
            mount_point: mount.path.clone(),
            total_bytes,
            available_bytes,
        }))
    }
}

/// Total and unprivileged-available bytes for the filesystem holding `path`
pub fn query_capacity(path: &Path) -> Result<(u64, u64)> {
    let stat = statvfs(path)?;

    let block_size = stat.fragment_size() as u64;
    let total = stat.blocks() as u64 * block_size;
    // Available excludes blocks reserved for root
    let available = stat.blocks_available() as u64 * block_size;

    Ok((total, available))
}

/// Parse /proc/mounts content
pub fn parse_mount_table(content: &str) -> Vec<MountPoint> {
    content
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let device = parts.next()?;
            let mount_point = parts.next()?;

            Some(MountPoint {
                device: unescape_mount_field(device),
                path: PathBuf::from(unescape_mount_field(mount_point)),
            })
        })
        .collect()
}

/// Mount points take precedence over device names. A later mount on the same
/// path shadows an earlier one, so the last match wins.
fn find_mount<'a>(mounts: &'a [MountPoint], volume: &str) -> Option<&'a MountPoint> {
    let wanted = normalize_identifier(volume);

    mounts
        .iter()
        .rev()
        .find(|m| normalize_identifier(&m.path.to_string_lossy()) == wanted)
        .or_else(|| {
            mounts
                .iter()
                .rev()
                .find(|m| normalize_identifier(&m.device) == wanted)
        })
}

fn normalize_identifier(id: &str) -> &str {
    let trimmed = id.trim_end_matches('/');
    if trimmed.is_empty() && id.starts_with('/') {
        "/"
    } else {
        trimmed
    }
}

/// The kernel escapes space, tab, newline and backslash as `\ooo`
fn unescape_mount_field(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() && is_octal_escape(&bytes[i + 1..i + 4]) {
            let value =
                (bytes[i + 1] - b'0') * 64 + (bytes[i + 2] - b'0') * 8 + (bytes[i + 3] - b'0');
            out.push(value);
            i += 4;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }

    String::from_utf8_lossy(&out).into_owned()
}

fn is_octal_escape(digits: &[u8]) -> bool {
    digits.len() == 3
        && (b'0'..=b'3').contains(&digits[0])
        && digits[1..].iter().all(|d| (b'0'..=b'7').contains(d))
}
