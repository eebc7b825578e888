//! Target Ensurer: atomically make a target path appear with given
//! contents (§4.3).
//!
//! This is the only place parent-directory creation and the post-publish
//! directory fsync happen, so every caller that publishes a file — upload,
//! copy, move — goes through it rather than re-implementing the sequence.

use crate::config::StoreConfig;
use crate::durability;
use crate::error::{normalize_io_error, Error, Result};
use crate::path_resolver;
use std::future::Future;
use std::io;
use std::path::Path;

/// Ensure the parent directory of `target` exists, run `produce(target)`,
/// then fsync the parent directory if `config.synced()`.
///
/// `produce` performs the actual create-or-replace of `target` (a rename, a
/// hardlink, a streamed write) and returns a plain `io::Result` so this
/// function can apply the host-error translations in §4.3 uniformly.
///
/// # Errors
///
/// - Propagates failures creating the parent directory.
/// - Translates a `produce` failure against `target`: `DirectoryNotEmpty` →
///   [`Error::IsADirectory`]; an intermediate path component that is a
///   regular file → [`Error::PathContainsFile`]; anything else is
///   normalized via [`normalize_io_error`].
pub async fn ensure<F, Fut>(config: &StoreConfig, target: &Path, produce: F) -> Result<()>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = io::Result<()>>,
{
    let name = path_resolver::relative_name(config, target).unwrap_or_else(|_| {
        target.display().to_string()
    });

    if let Some(parent) = target.parent() {
        if !parent.exists() {
            compio::fs::create_dir_all(parent)
                .await
                .map_err(|e| normalize_io_error(&e, &name, target))?;
        }
    }

    if let Err(e) = produce().await {
        return Err(translate_produce_error(&e, &name, target));
    }

    if config.synced() {
        if let Some(parent) = target.parent() {
            durability::fsync_dir(parent).await;
        }
    }

    Ok(())
}

fn translate_produce_error(err: &io::Error, name: &str, target: &Path) -> Error {
    // §4.3: "NoSuchFile during parent creation → propagate." Let the normal
    // normalizer turn it into `FileNotFound` rather than guessing at
    // `IsADirectory` below.
    if err.kind() == io::ErrorKind::NotFound {
        return normalize_io_error(err, name, target);
    }
    // `DirectoryNotEmpty` lacks a stable ErrorKind constant; match it via
    // raw_os_error (ENOTEMPTY = 39 on Linux) as a best-effort translation.
    #[cfg(target_os = "linux")]
    if err.raw_os_error() == Some(39) {
        return Error::IsADirectory(name.to_string());
    }
    if target.is_dir() {
        return Error::IsADirectory(name.to_string());
    }
    if let Some(parent) = target.parent() {
        if path_has_file_component(parent) {
            return Error::PathContainsFile(name.to_string());
        }
    }
    normalize_io_error(err, name, target)
}

/// Whether any ancestor of `dir` (inclusive) exists and is a regular file,
/// i.e. a path component that should be a directory is actually a file.
fn path_has_file_component(dir: &Path) -> bool {
    let mut current = Some(dir);
    while let Some(p) = current {
        if p.is_file() {
            return true;
        }
        if p.exists() {
            break;
        }
        current = p.parent();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(root: &Path) -> StoreConfig {
        StoreConfig::builder(root).build()
    }

    #[compio::test]
    async fn creates_missing_parent_directories() {
        let dir = TempDir::new().unwrap();
        let cfg = config(dir.path());
        let target = dir.path().join("a/b/c.txt");

        ensure(&cfg, &target, || async {
            std::fs::write(&target, b"hi").map_err(Into::into)
        })
        .await
        .unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), b"hi");
    }

    #[compio::test]
    async fn path_contains_file_detected() {
        let dir = TempDir::new().unwrap();
        let cfg = config(dir.path());
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"im a file").unwrap();
        let target = blocker.join("child.txt");

        let result = ensure(&cfg, &target, || async {
            std::fs::write(&target, b"hi").map_err(Into::into)
        })
        .await;

        assert!(matches!(result, Err(Error::PathContainsFile(_))));
    }
}
