//! Hardlink creation.
//!
//! The object store prefers hardlinking a new key onto an existing file's
//! inode over copying bytes, falling back to a full copy when the link
//! fails (cross-device, existing destination, filesystem without hardlink
//! support). This module only wraps the syscall; the fallback decision is
//! made by the caller.

use crate::error::{hardlink_error, Result};
use std::path::Path;

/// Hardlink operations on paths.
#[allow(async_fn_in_trait)]
pub trait HardlinkOps {
    /// Create a hardlink at `link` pointing at the same inode as `self`.
    ///
    /// # Errors
    ///
    /// Returns an error if the link already exists, `self` and `link` are
    /// on different filesystems, or the filesystem does not support
    /// hardlinks.
    async fn hardlink_to(&self, link: &Path) -> Result<()>;
}

impl HardlinkOps for Path {
    async fn hardlink_to(&self, link: &Path) -> Result<()> {
        hardlink(self, link).await
    }
}

/// Create a hardlink at `link` pointing at the same inode as `target`.
///
/// # Errors
///
/// Returns an error if the underlying `link(2)` syscall fails.
pub async fn hardlink(target: &Path, link: &Path) -> Result<()> {
    let target = target.to_path_buf();
    let link = link.to_path_buf();

    compio::runtime::spawn_blocking(move || std::fs::hard_link(&target, &link))
        .await
        .map_err(|e| hardlink_error(&format!("spawn_blocking join failed: {e}")))?
        .map_err(|e| hardlink_error(&format!("link({e})")))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs::write;
    use tempfile::TempDir;

    #[compio::test]
    async fn test_hardlink_basic() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("source.txt");
        let dst = dir.path().join("linked.txt");
        write(&src, b"hello").unwrap();

        hardlink(&src, &dst).await.unwrap();

        let meta_src = std::fs::metadata(&src).unwrap();
        let meta_dst = std::fs::metadata(&dst).unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            assert_eq!(meta_src.ino(), meta_dst.ino());
        }
        assert_eq!(meta_dst.len(), meta_src.len());
    }

    #[compio::test]
    async fn test_hardlink_existing_destination_fails() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("source.txt");
        let dst = dir.path().join("already-there.txt");
        write(&src, b"hello").unwrap();
        write(&dst, b"other").unwrap();

        let result = hardlink(&src, &dst).await;
        assert!(result.is_err());
    }
}
