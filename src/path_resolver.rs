//! Logical name to physical path resolution and confinement (§4.1).
//!
//! Pure and total: no syscalls, no partial application. Every other
//! component calls through here before touching the filesystem, which is
//! what makes the "every path handed to a syscall is under storage root"
//! invariant checkable in one place.

use crate::config::StoreConfig;
use crate::error::{Error, Result};
use std::path::{Component, Path, PathBuf};

/// Resolve a logical name to an absolute path under `config.storage_root()`.
///
/// # Errors
///
/// Returns [`Error::ForbiddenPath`] if `name` is empty, escapes storage
/// root, or resolves into the temp directory.
pub fn resolve(config: &StoreConfig, name: &str) -> Result<PathBuf> {
    if name.is_empty() {
        return Err(Error::ForbiddenPath("empty name".to_string()));
    }

    let host_relative = to_host_relative(name);
    let joined = config.storage_root().join(&host_relative);
    let resolved = logically_normalize(&joined);

    if !is_descendant_of(&resolved, config.storage_root()) {
        return Err(Error::ForbiddenPath(name.to_string()));
    }

    if resolved == config.temp_dir() || is_descendant_of(&resolved, config.temp_dir()) {
        return Err(Error::ForbiddenPath(name.to_string()));
    }

    Ok(resolved)
}

/// Convert a `name` is unconditionally `/`-separated; translate to the host
/// separator where they differ (only matters on Windows).
fn to_host_relative(name: &str) -> PathBuf {
    if std::path::MAIN_SEPARATOR == '/' {
        PathBuf::from(name)
    } else {
        let translated: String = name
            .chars()
            .map(|c| if c == '/' { std::path::MAIN_SEPARATOR } else { c })
            .collect();
        PathBuf::from(translated)
    }
}

/// Collapse `.` and `..` components without touching the filesystem
/// (`Path::canonicalize` requires the path to exist, which staging files
/// and not-yet-created upload targets do not).
fn logically_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Whether `path` is `base` or lies strictly beneath it, after logical
/// normalization of both.
fn is_descendant_of(path: &Path, base: &Path) -> bool {
    path.starts_with(base)
}

/// Root-relative, `/`-delimited logical name for a resolved path. Used by
/// the lister and by error messages that must name a key rather than an
/// absolute filesystem path.
///
/// # Errors
///
/// Returns [`Error::ForbiddenPath`] if `path` is not under
/// `config.storage_root()`.
pub fn relative_name(config: &StoreConfig, path: &Path) -> Result<String> {
    let rel = path.strip_prefix(config.storage_root()).map_err(|_| {
        Error::ForbiddenPath(path.display().to_string())
    })?;
    let mut parts = Vec::new();
    for component in rel.components() {
        if let Component::Normal(part) = component {
            parts.push(part.to_string_lossy().into_owned());
        }
    }
    Ok(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> StoreConfig {
        StoreConfig::builder("/store").build()
    }

    #[test]
    fn resolves_simple_name() {
        let cfg = config();
        let resolved = resolve(&cfg, "a/b.txt").unwrap();
        assert_eq!(resolved, Path::new("/store/a/b.txt"));
    }

    #[test]
    fn rejects_empty_name() {
        let cfg = config();
        assert!(matches!(resolve(&cfg, ""), Err(Error::ForbiddenPath(_))));
    }

    #[test]
    fn rejects_traversal_escaping_root() {
        let cfg = config();
        assert!(matches!(
            resolve(&cfg, "../escape"),
            Err(Error::ForbiddenPath(_))
        ));
    }

    #[test]
    fn allows_traversal_that_stays_under_root() {
        let cfg = config();
        let resolved = resolve(&cfg, "a/../b.txt").unwrap();
        assert_eq!(resolved, Path::new("/store/b.txt"));
    }

    #[test]
    fn rejects_temp_dir_itself() {
        let cfg = config();
        assert!(matches!(
            resolve(&cfg, ".upload"),
            Err(Error::ForbiddenPath(_))
        ));
    }

    #[test]
    fn rejects_paths_inside_temp_dir() {
        let cfg = config();
        assert!(matches!(
            resolve(&cfg, ".upload/staged-123"),
            Err(Error::ForbiddenPath(_))
        ));
    }

    #[test]
    fn relative_name_roundtrips() {
        let cfg = config();
        let resolved = resolve(&cfg, "a/b.txt").unwrap();
        assert_eq!(relative_name(&cfg, &resolved).unwrap(), "a/b.txt");
    }
}
