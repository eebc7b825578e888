//! Copy/Move Primitives (§4.4): hardlink, hardlink-then-unlink move,
//! temp-dir stage-and-rename copy, touch.

use crate::config::StoreConfig;
use crate::error::{normalize_io_error, Result};
use crate::path_resolver;
use crate::target_ensurer;
use compio_fs_extended::hardlink::hardlink;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Move `src` to `dst` (§4.4).
///
/// If `src == dst`, this only bumps `dst`'s mtime. Otherwise it prefers a
/// hardlink-then-unlink (cheap, and atomic from a reader's point of view
/// once the hardlink lands) and falls back to a host rename if hardlinking
/// fails — e.g. cross-device moves, where `link(2)` always fails but
/// `rename(2)` can still succeed via copy-and-delete semantics on some
/// filesystems.
///
/// # Errors
///
/// Returns a normalized domain error; see [`target_ensurer::ensure`] for the
/// translation rules applied to the underlying rename/link failure.
pub async fn move_object(config: &StoreConfig, src: &Path, dst: &Path) -> Result<()> {
    if src == dst {
        return touch(dst).await;
    }

    let src_owned = src.to_path_buf();
    target_ensurer::ensure(config, dst, move || async move {
        move_via_hardlink_or_rename(&src_owned, dst).await
    })
    .await?;

    touch(dst).await?;

    if config.synced() {
        crate::durability::fsync_file(dst).await;
    }

    Ok(())
}

async fn move_via_hardlink_or_rename(src: &Path, dst: &Path) -> io::Result<()> {
    match hardlink(src, dst).await {
        Ok(()) => {
            if let Err(e) = compio::fs::remove_file(src).await {
                warn!(src = %src.display(), error = %e, "move: unlink source after hardlink failed");
                return Err(e);
            }
            Ok(())
        }
        Err(e) => {
            debug!(error = %e, "move: hardlink failed, falling back to rename");
            compio::fs::rename(src, dst).await
        }
    }
}

/// Copy `src` to `dst` (§4.4).
///
/// If `src == dst`, this only bumps `dst`'s mtime. Otherwise, when
/// [`StoreConfig::hardlink_on_copy`] is set, a hardlink is attempted first;
/// on failure it falls through to a temp-dir stage-and-rename copy so a
/// reader never observes a partially-written `dst`.
///
/// # Errors
///
/// Returns a normalized domain error. The original hardlink failure (if
/// attempted) is logged, not surfaced, per §7's "local recovery" policy:
/// only the final outcome (success, or the temp-dir copy's failure)
/// reaches the caller.
pub async fn copy_object(config: &StoreConfig, src: &Path, dst: &Path) -> Result<()> {
    if src == dst {
        return touch(dst).await;
    }

    if config.hardlink_on_copy() {
        match hardlink(src, dst).await {
            Ok(()) => {
                touch(dst).await?;
                if config.synced() {
                    if let Some(parent) = dst.parent() {
                        crate::durability::fsync_dir(parent).await;
                    }
                }
                return Ok(());
            }
            Err(e) => {
                debug!(error = %e, "copy: hardlink failed, falling back to temp-dir copy");
            }
        }
    }

    temp_dir_copy(config, src, dst).await
}

async fn temp_dir_copy(config: &StoreConfig, src: &Path, dst: &Path) -> Result<()> {
    let name = path_resolver::relative_name(config, dst)
        .unwrap_or_else(|_| dst.display().to_string());

    compio::fs::create_dir_all(config.temp_dir())
        .await
        .map_err(|e| normalize_io_error(&e, &name, dst))?;

    let staged: PathBuf = tempfile::Builder::new()
        .prefix("upload")
        .tempfile_in(config.temp_dir())
        .map_err(|e| normalize_io_error(&e, &name, dst))?
        .into_temp_path()
        .keep()
        .map_err(|e| normalize_io_error(&e.error, &name, dst))?;

    let copy_result = copy_bytes(src, &staged).await;
    if let Err(e) = copy_result {
        let _ = compio::fs::remove_file(&staged).await;
        return Err(normalize_io_error(&e, &name, dst));
    }

    let staged_for_rename = staged.clone();
    let result = target_ensurer::ensure(config, dst, move || async move {
        compio::fs::rename(&staged_for_rename, dst).await
    })
    .await;

    if result.is_err() {
        let _ = compio::fs::remove_file(&staged).await;
    }

    result
}

async fn copy_bytes(src: &Path, dst: &Path) -> io::Result<()> {
    let src_file = compio::fs::File::open(src).await?;
    let dst_file = compio::fs::File::create(dst).await?;
    let len = src_file.metadata().await?.len();
    compio_fs_extended::copy_file_range_with_fallback(&src_file, &dst_file, 0, 0, len)
        .await
        .map_err(|e| io::Error::other(e.to_string()))?;
    Ok(())
}

/// Bump `path`'s mtime to now (§4.4).
///
/// # Errors
///
/// Returns [`crate::error::Error::FileNotFound`] if `path` does not exist.
pub async fn touch(path: &Path) -> Result<()> {
    compio_fs_extended::metadata::touch(path)
        .await
        .map_err(|e| {
            if path.exists() {
                crate::error::Error::IOError(e.to_string())
            } else {
                crate::error::Error::FileNotFound(path.display().to_string())
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(root: &Path) -> StoreConfig {
        StoreConfig::builder(root).build()
    }

    #[compio::test]
    async fn move_same_path_only_touches() {
        let dir = TempDir::new().unwrap();
        let cfg = config(dir.path());
        let path = dir.path().join("a.txt");
        std::fs::write(&path, b"hello").unwrap();

        move_object(&cfg, &path, &path).await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"hello");
    }

    #[compio::test]
    async fn move_to_new_path_relocates_file() {
        let dir = TempDir::new().unwrap();
        let cfg = config(dir.path());
        let src = dir.path().join("a.txt");
        let dst = dir.path().join("b.txt");
        std::fs::write(&src, b"hello").unwrap();

        move_object(&cfg, &src, &dst).await.unwrap();

        assert!(!src.exists());
        assert_eq!(std::fs::read(&dst).unwrap(), b"hello");
    }

    #[compio::test]
    async fn copy_hardlinks_when_enabled() {
        let dir = TempDir::new().unwrap();
        let cfg = config(dir.path());
        let src = dir.path().join("a.txt");
        let dst = dir.path().join("b.txt");
        std::fs::write(&src, b"hello").unwrap();

        copy_object(&cfg, &src, &dst).await.unwrap();

        assert_eq!(std::fs::read(&dst).unwrap(), b"hello");
        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            let src_meta = std::fs::metadata(&src).unwrap();
            let dst_meta = std::fs::metadata(&dst).unwrap();
            assert_eq!(src_meta.ino(), dst_meta.ino());
        }
    }

    #[compio::test]
    async fn copy_falls_back_to_temp_dir_copy_when_hardlink_disabled() {
        let dir = TempDir::new().unwrap();
        let cfg = StoreConfig::builder(dir.path())
            .hardlink_on_copy(false)
            .build();
        let src = dir.path().join("a.txt");
        let dst = dir.path().join("b.txt");
        std::fs::write(&src, b"hello").unwrap();

        copy_object(&cfg, &src, &dst).await.unwrap();

        assert_eq!(std::fs::read(&dst).unwrap(), b"hello");
        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            let src_meta = std::fs::metadata(&src).unwrap();
            let dst_meta = std::fs::metadata(&dst).unwrap();
            assert_ne!(src_meta.ino(), dst_meta.ino());
        }
    }

    #[compio::test]
    async fn copy_same_path_only_touches() {
        let dir = TempDir::new().unwrap();
        let cfg = config(dir.path());
        let path = dir.path().join("a.txt");
        std::fs::write(&path, b"hello").unwrap();

        copy_object(&cfg, &path, &path).await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"hello");
    }

    #[compio::test]
    async fn touch_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let result = touch(&dir.path().join("missing.txt")).await;
        assert!(matches!(result, Err(crate::error::Error::FileNotFound(_))));
    }
}
