//! Store configuration (§4.10, §6).
//!
//! `StoreConfig` is built through [`StoreConfigBuilder`] rather than
//! constructed as a bare struct literal or threaded through as a free-form
//! map, mirroring how the rest of the ambient stack treats configuration as
//! a typed, validated value.

use std::path::{Path, PathBuf};

/// Default block size for streaming reads: 256 KiB.
pub const DEFAULT_READER_BUFFER_SIZE: usize = 256 * 1024;

/// Default temp-dir name, relative to storage root.
pub const DEFAULT_TEMP_DIR_NAME: &str = ".upload";

/// Environment variable consulted for the default value of `synced` when a
/// builder leaves it unset.
pub const ENV_SYNCED: &str = "OBJSTORE_SYNCED";

/// Environment variable consulted for the default value of `synced_append`
/// when a builder leaves it unset.
pub const ENV_SYNCED_APPEND: &str = "OBJSTORE_SYNCED_APPEND";

/// Validated, immutable store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    storage_root: PathBuf,
    temp_dir: PathBuf,
    reader_buffer_size: usize,
    hardlink_on_copy: bool,
    synced: bool,
    synced_append: bool,
}

impl StoreConfig {
    /// Start building a configuration rooted at `storage_root`.
    #[must_use]
    pub fn builder(storage_root: impl Into<PathBuf>) -> StoreConfigBuilder {
        StoreConfigBuilder::new(storage_root.into())
    }

    /// Absolute path that bounds all reachable files.
    #[must_use]
    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    /// Absolute path used to stage uploads and copy fallbacks.
    #[must_use]
    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Block size used for streaming reads.
    #[must_use]
    pub fn reader_buffer_size(&self) -> usize {
        self.reader_buffer_size
    }

    /// Whether `copy` should attempt a hardlink before falling back to a
    /// temp-dir copy.
    #[must_use]
    pub fn hardlink_on_copy(&self) -> bool {
        self.hardlink_on_copy
    }

    /// Whether creates/replaces fsync the file and its containing
    /// directory.
    #[must_use]
    pub fn synced(&self) -> bool {
        self.synced
    }

    /// Whether append channels open with a synchronous-write flag.
    #[must_use]
    pub fn synced_append(&self) -> bool {
        self.synced_append
    }
}

/// Builder for [`StoreConfig`].
///
/// Fields left unset take documented defaults; `synced`/`synced_append` fall
/// back to the process-wide environment defaults described in §4.10 rather
/// than a fixed `false` when left unset.
#[derive(Debug, Clone)]
pub struct StoreConfigBuilder {
    storage_root: PathBuf,
    temp_dir: Option<PathBuf>,
    reader_buffer_size: usize,
    hardlink_on_copy: bool,
    synced: Option<bool>,
    synced_append: Option<bool>,
}

impl StoreConfigBuilder {
    fn new(storage_root: PathBuf) -> Self {
        Self {
            storage_root,
            temp_dir: None,
            reader_buffer_size: DEFAULT_READER_BUFFER_SIZE,
            hardlink_on_copy: true,
            synced: None,
            synced_append: None,
        }
    }

    /// Override the default `<storage_root>/.upload` staging directory.
    ///
    /// The caller is responsible for the resulting path being a descendant
    /// of `storage_root`; [`StoreConfigBuilder::build`] does not validate it
    /// (path confinement is enforced per-operation by the path resolver,
    /// not at config-build time — see `objectfs_store::path_resolver`).
    #[must_use]
    pub fn temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(temp_dir.into());
        self
    }

    /// Set the block size used for streaming reads.
    #[must_use]
    pub fn reader_buffer_size(mut self, size: usize) -> Self {
        self.reader_buffer_size = size;
        self
    }

    /// Set whether `copy` should attempt a hardlink before falling back.
    #[must_use]
    pub fn hardlink_on_copy(mut self, enabled: bool) -> Self {
        self.hardlink_on_copy = enabled;
        self
    }

    /// Set whether creates/replaces fsync the file and its containing
    /// directory. Leaving this unset consults `OBJSTORE_SYNCED`.
    #[must_use]
    pub fn synced(mut self, enabled: bool) -> Self {
        self.synced = Some(enabled);
        self
    }

    /// Set whether append channels open with a synchronous-write flag.
    /// Leaving this unset consults `OBJSTORE_SYNCED_APPEND`.
    #[must_use]
    pub fn synced_append(mut self, enabled: bool) -> Self {
        self.synced_append = Some(enabled);
        self
    }

    /// Finalize the configuration.
    #[must_use]
    pub fn build(self) -> StoreConfig {
        let temp_dir = self
            .temp_dir
            .unwrap_or_else(|| self.storage_root.join(DEFAULT_TEMP_DIR_NAME));
        StoreConfig {
            synced: self.synced.unwrap_or_else(|| env_bool(ENV_SYNCED)),
            synced_append: self
                .synced_append
                .unwrap_or_else(|| env_bool(ENV_SYNCED_APPEND)),
            storage_root: self.storage_root,
            temp_dir,
            reader_buffer_size: self.reader_buffer_size,
            hardlink_on_copy: self.hardlink_on_copy,
        }
    }
}

/// Read a boolean environment variable, defaulting to `false` if unset or
/// unparseable (§4.10).
fn env_bool(key: &str) -> bool {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<bool>().ok())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_temp_dir_is_under_storage_root() {
        let cfg = StoreConfig::builder("/tmp/store").build();
        assert_eq!(cfg.temp_dir(), Path::new("/tmp/store/.upload"));
    }

    #[test]
    fn explicit_temp_dir_overrides_default() {
        let cfg = StoreConfig::builder("/tmp/store")
            .temp_dir("/tmp/store/.stage")
            .build();
        assert_eq!(cfg.temp_dir(), Path::new("/tmp/store/.stage"));
    }

    #[test]
    fn reader_buffer_size_defaults() {
        let cfg = StoreConfig::builder("/tmp/store").build();
        assert_eq!(cfg.reader_buffer_size(), DEFAULT_READER_BUFFER_SIZE);
    }

    #[test]
    fn env_bool_unset_is_false() {
        std::env::remove_var("OBJSTORE_TEST_UNSET_VAR");
        assert!(!env_bool("OBJSTORE_TEST_UNSET_VAR"));
    }

    #[test]
    fn env_bool_unparseable_is_false() {
        std::env::set_var("OBJSTORE_TEST_GARBAGE_VAR", "not-a-bool");
        assert!(!env_bool("OBJSTORE_TEST_GARBAGE_VAR"));
        std::env::remove_var("OBJSTORE_TEST_GARBAGE_VAR");
    }

    #[test]
    fn explicit_synced_wins_over_env() {
        std::env::set_var("OBJSTORE_SYNCED", "true");
        let cfg = StoreConfig::builder("/tmp/store").synced(false).build();
        assert!(!cfg.synced());
        std::env::remove_var("OBJSTORE_SYNCED");
    }
}
