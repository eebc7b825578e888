//! Durability helper: fsync file and containing directory (§4.2).
//!
//! Both calls are best-effort. Directory fsync is rejected outright by some
//! platforms/filesystems; the policy here is to swallow that failure rather
//! than let a durability nicety fail an otherwise-successful operation
//! (§9, "Directory-sync on unsupported platforms").

use compio::fs::File;
use std::path::Path;
use tracing::{debug, warn};

/// fsync the file at `path`, opening it read-only first.
///
/// Only called when [`crate::config::StoreConfig::synced`] is set.
pub async fn fsync_file(path: &Path) {
    match File::open(path).await {
        Ok(file) => {
            if let Err(e) = file.sync_all().await {
                warn!(path = %path.display(), error = %e, "fsync_file failed");
            } else {
                debug!(path = %path.display(), "fsync_file ok");
            }
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "fsync_file: open failed");
        }
    }
}

/// fsync the directory at `path`.
///
/// Swallows failures unconditionally: some platforms reject opening or
/// syncing a directory descriptor, and that is not a durability regression
/// worth failing the calling operation over.
pub async fn fsync_dir(path: &Path) {
    match File::open(path).await {
        Ok(dir) => match dir.sync_all().await {
            Ok(()) => debug!(path = %path.display(), "fsync_dir ok"),
            Err(e) => debug!(path = %path.display(), error = %e, "fsync_dir not supported, ignoring"),
        },
        Err(e) => {
            debug!(path = %path.display(), error = %e, "fsync_dir: open failed, ignoring");
        }
    }
}
