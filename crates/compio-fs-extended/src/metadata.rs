//! Lightweight metadata conversion and mtime bumping.
//!
//! The object store only ever surfaces a `(size, timestamp_ms)` pair to
//! callers (see [`FileStat`]), so this module skips
//! the nanosecond-precision, `statx`-based metadata machinery a full
//! directory-tree copier needs and sticks to what `std::fs::Metadata`
//! already gives us.

use crate::error::{metadata_error, Result};
use filetime::FileTime;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Size and last-modified time of a stored object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    /// Size in bytes.
    pub size: u64,
    /// Last-modified time, milliseconds since the Unix epoch.
    pub modified_ms: i64,
}

impl FileStat {
    /// Build a [`FileStat`] from `std::fs::Metadata`.
    #[must_use]
    pub fn from_std(meta: &std::fs::Metadata) -> Self {
        let modified_ms = meta
            .modified()
            .map(system_time_to_millis)
            .unwrap_or(0);
        Self {
            size: meta.len(),
            modified_ms,
        }
    }
}

fn system_time_to_millis(t: SystemTime) -> i64 {
    match t.duration_since(UNIX_EPOCH) {
        Ok(d) => i64::try_from(d.as_millis()).unwrap_or(i64::MAX),
        Err(e) => -i64::try_from(e.duration().as_millis()).unwrap_or(i64::MAX),
    }
}

/// Read size and mtime for the file at `path`.
///
/// # Errors
///
/// Returns an error if the path does not exist or metadata cannot be read.
pub async fn stat(path: &Path) -> Result<FileStat> {
    let path = path.to_path_buf();
    let meta = compio::runtime::spawn_blocking(move || std::fs::metadata(&path))
        .await
        .map_err(|e| metadata_error(&format!("spawn_blocking join failed: {e}")))?
        .map_err(|e| metadata_error(&format!("metadata: {e}")))?;
    Ok(FileStat::from_std(&meta))
}

/// Bump the mtime (and atime) of the file at `path` to "now".
///
/// Used for the store's `copy(S, S)` and `move(S, S)` no-op path, where the
/// object already lives at its destination and the only observable effect
/// is a refreshed modification time.
///
/// # Errors
///
/// Returns an error if `path` does not exist or the filesystem rejects the
/// timestamp update.
pub async fn touch(path: &Path) -> Result<()> {
    let path = path.to_path_buf();
    compio::runtime::spawn_blocking(move || {
        if !path.exists() {
            return Err(metadata_error(&format!(
                "touch: no such file: {}",
                path.display()
            )));
        }
        let now = FileTime::now();
        filetime::set_file_times(&path, now, now)
            .map_err(|e| metadata_error(&format!("set_file_times failed: {e}")))
    })
    .await
    .map_err(|e| metadata_error(&format!("spawn_blocking join failed: {e}")))?
}
