//! Glob Matcher / Lister (§4.5): split glob into literal prefix + pattern,
//! walk, emit metadata.

use crate::config::StoreConfig;
use crate::error::{Error, Result};
use compio_fs_extended::metadata::FileStat;
use std::collections::BTreeMap;
use std::path::Path;
use walkdir::WalkDir;

const GLOB_METACHARS: &[char] = &['*', '?', '[', '{'];

/// List every regular file under `config.storage_root()` whose root-relative,
/// `/`-delimited path matches `glob` (§4.5, §8 property 10).
///
/// An empty glob yields an empty map, not an error. The temp-dir subtree is
/// never walked, even if `glob` would otherwise match paths inside it.
///
/// # Errors
///
/// Returns [`Error::MalformedGlob`] if `glob` cannot be parsed as a
/// [`glob::Pattern`].
pub async fn list(config: &StoreConfig, glob: &str) -> Result<BTreeMap<String, FileStat>> {
    if glob.is_empty() {
        return Ok(BTreeMap::new());
    }

    let pattern = glob::Pattern::new(glob)
        .map_err(|e| Error::MalformedGlob(format!("{glob}: {e}")))?;

    let (literal_prefix, _) = split_literal_prefix(glob);
    let walk_root = config.storage_root().join(&literal_prefix);
    if !walk_root.exists() {
        return Ok(BTreeMap::new());
    }

    let storage_root = config.storage_root().to_path_buf();
    let temp_dir = config.temp_dir().to_path_buf();
    let walk_root_owned = walk_root.clone();

    let entries = compio::runtime::spawn_blocking(move || {
        let mut matches = Vec::new();
        for entry in WalkDir::new(&walk_root_owned)
            .into_iter()
            .filter_entry(|e| e.path() != temp_dir && !e.path().starts_with(&temp_dir))
        {
            let Ok(entry) = entry else { continue };
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(&storage_root) else {
                continue;
            };
            let rel_str = path_to_slash(rel);
            if pattern.matches(&rel_str) {
                if let Ok(meta) = entry.metadata() {
                    matches.push((rel_str, FileStat::from_std(&meta)));
                }
            }
        }
        matches
    })
    .await
    .map_err(|e| Error::IOError(format!("list: spawn_blocking join failed: {e}")))?;

    Ok(entries.into_iter().collect())
}

/// Split `glob` at the first path segment containing a glob metacharacter;
/// everything before that segment is the literal prefix to walk from.
fn split_literal_prefix(glob: &str) -> (String, String) {
    let mut prefix_segments = Vec::new();
    let mut rest_segments = Vec::new();
    let mut in_pattern = false;

    for segment in glob.split('/') {
        if in_pattern {
            rest_segments.push(segment);
        } else if segment.contains(GLOB_METACHARS) {
            in_pattern = true;
            rest_segments.push(segment);
        } else {
            prefix_segments.push(segment);
        }
    }

    (prefix_segments.join("/"), rest_segments.join("/"))
}

fn path_to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|c| c.as_os_str().to_str())
        .collect::<Vec<_>>()
        .join("/")
}

/// Path resolution helper shared with `info`/`info_all`: read `(size,
/// timestamp_ms)` for a single resolved path.
///
/// Returns `Ok(None)` if the path does not exist or is a directory, per the
/// data model's "directories produce no metadata" rule.
pub async fn stat_or_absent(path: &Path) -> Option<FileStat> {
    if !path.is_file() {
        return None;
    }
    compio_fs_extended::metadata::stat(path).await.ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_literal_prefix_basic() {
        let (prefix, pattern) = split_literal_prefix("sub/dir/*.bin");
        assert_eq!(prefix, "sub/dir");
        assert_eq!(pattern, "*.bin");
    }

    #[test]
    fn split_literal_prefix_no_pattern() {
        let (prefix, pattern) = split_literal_prefix("a/b/c.txt");
        assert_eq!(prefix, "a/b/c.txt");
        assert_eq!(pattern, "");
    }

    #[test]
    fn split_literal_prefix_pattern_at_root() {
        let (prefix, pattern) = split_literal_prefix("*.txt");
        assert_eq!(prefix, "");
        assert_eq!(pattern, "*.txt");
    }

    #[compio::test]
    async fn list_empty_glob_is_empty_map() {
        let dir = tempfile::TempDir::new().unwrap();
        let cfg = StoreConfig::builder(dir.path()).build();
        let result = list(&cfg, "").await.unwrap();
        assert!(result.is_empty());
    }

    #[compio::test]
    async fn list_malformed_glob_errors() {
        let dir = tempfile::TempDir::new().unwrap();
        let cfg = StoreConfig::builder(dir.path()).build();
        let result = list(&cfg, "[").await;
        assert!(matches!(result, Err(Error::MalformedGlob(_))));
    }

    #[compio::test]
    async fn list_matches_under_literal_prefix_only() {
        let dir = tempfile::TempDir::new().unwrap();
        let cfg = StoreConfig::builder(dir.path()).build();
        std::fs::create_dir_all(dir.path().join("sub/dir")).unwrap();
        std::fs::write(dir.path().join("sub/dir/a.bin"), b"x").unwrap();
        std::fs::write(dir.path().join("other.bin"), b"x").unwrap();

        let result = list(&cfg, "sub/dir/*.bin").await.unwrap();
        assert_eq!(result.len(), 1);
        assert!(result.contains_key("sub/dir/a.bin"));
    }

    #[compio::test]
    async fn list_skips_temp_dir_subtree() {
        let dir = tempfile::TempDir::new().unwrap();
        let cfg = StoreConfig::builder(dir.path()).build();
        std::fs::create_dir_all(cfg.temp_dir()).unwrap();
        std::fs::write(cfg.temp_dir().join("staged.bin"), b"x").unwrap();

        let result = list(&cfg, "**/*.bin").await.unwrap();
        assert!(result.is_empty());
    }
}
