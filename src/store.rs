//! Store Facade (§4.8): the public object store API. Composes the path
//! resolver, durability helper, target ensurer, copy/move primitives,
//! lister and blocking dispatcher; owns the upload/append/download
//! lifecycles and the metrics hooks.

use crate::channel::{ByteSink, ByteSource};
use crate::config::StoreConfig;
use crate::copy_move;
use crate::dispatcher::BlockingDispatcher;
use crate::durability;
use crate::error::{self, batch_error, Error, Result, ScalarError};
use crate::lister;
use crate::metrics::{NoopMetrics, StoreMetrics};
use crate::path_resolver;
use crate::target_ensurer;
use compio::fs::{File, OpenOptions};
use compio_fs_extended::metadata::FileStat;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{info_span, Instrument};

#[derive(Clone, Copy)]
enum BatchKind {
    Copy,
    Move,
}

/// The public object store. Cheap to clone: internal state is an
/// `Arc`-backed dispatcher and metrics handle plus an immutable config.
#[derive(Clone)]
pub struct Store {
    config: StoreConfig,
    dispatcher: BlockingDispatcher,
    metrics: Arc<dyn StoreMetrics>,
}

impl Store {
    /// Create a store rooted at `config.storage_root()`, with its own
    /// dedicated worker pool and no metrics observer.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker pool cannot be created.
    pub fn new(config: StoreConfig) -> std::io::Result<Self> {
        Self::with_metrics(config, Arc::new(NoopMetrics))
    }

    /// Create a store with an explicit metrics observer.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker pool cannot be created.
    pub fn with_metrics(
        config: StoreConfig,
        metrics: Arc<dyn StoreMetrics>,
    ) -> std::io::Result<Self> {
        Ok(Self {
            dispatcher: BlockingDispatcher::new()?,
            config,
            metrics,
        })
    }

    /// The configuration this store was created with.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Always succeeds; a liveness check for callers that want to confirm
    /// the store (and its worker pool) is responsive.
    pub async fn ping(&self) -> Result<()> {
        self.dispatcher
            .run(|| ())
            .await
            .map_err(|e| Error::IOError(e.to_string()))
    }

    /// Run a plain synchronous closure on the blocking dispatcher (G),
    /// keeping it off the event-loop thread (§1, §4.7, §5).
    ///
    /// Used for the facade's `std::fs`/`Path` calls that have no
    /// io_uring-native async form (existence/kind checks, directory
    /// creation, metadata reads, unlinks); `compio::fs` operations already
    /// run asynchronously via the reactor and go straight through it
    /// instead.
    async fn run_blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.dispatcher
            .run(f)
            .await
            .map_err(|e| Error::IOError(e.to_string()))
    }

    /// Open a byte-sink for a fresh upload to `name` of unbounded size
    /// (§4.8).
    ///
    /// # Errors
    ///
    /// [`Error::ForbiddenPath`], [`Error::IsADirectory`],
    /// [`Error::PathContainsFile`], [`Error::IOError`].
    pub async fn upload(&self, name: &str) -> Result<ByteSink> {
        self.upload_impl(name, None)
            .instrument(info_span!("upload", name))
            .await
    }

    /// Open a byte-sink for an upload to `name` that must receive exactly
    /// `size` bytes (§4.8).
    ///
    /// # Errors
    ///
    /// As [`Store::upload`], plus [`Error::UnexpectedSize`] if the stream
    /// ends with a different byte count.
    pub async fn upload_sized(&self, name: &str, size: u64) -> Result<ByteSink> {
        self.upload_impl(name, Some(size))
            .instrument(info_span!("upload", name, size))
            .await
    }

    async fn upload_impl(&self, name: &str, size: Option<u64>) -> Result<ByteSink> {
        let target = path_resolver::resolve(&self.config, name)?;
        let target_for_check = target.clone();
        if self.run_blocking(move || target_for_check.is_dir()).await? {
            return Err(Error::IsADirectory(name.to_string()));
        }

        let temp_dir = self.config.temp_dir().to_path_buf();
        let temp_dir_for_create = temp_dir.clone();
        self.run_blocking(move || std::fs::create_dir_all(&temp_dir_for_create))
            .await?
            .map_err(|e| error::normalize_io_error(&e, name, &temp_dir))?;

        // `.keep()` disarms the temp-file's delete-on-drop guard; ownership
        // of cleanup passes to the sink's on-cancel hook from here on.
        let staged_path = tempfile::Builder::new()
            .prefix("upload")
            .tempfile_in(self.config.temp_dir())
            .map_err(|e| error::normalize_io_error(&e, name, &target))?
            .into_temp_path()
            .keep()
            .map_err(|e| error::normalize_io_error(&e.error, name, &target))?;

        let file = File::create(&staged_path)
            .await
            .map_err(|e| error::normalize_io_error(&e, name, &staged_path))?;

        self.metrics.upload_started(name);

        let config = self.config.clone();
        let metrics = self.metrics.clone();
        let name_owned = name.to_string();
        let target_owned = target.clone();
        let staged_for_ack = staged_path.clone();

        let on_ack: crate::channel::OnAckBoxed = Box::new(move || {
            Box::pin(async move {
                target_ensurer::ensure(&config, &target_owned, move || {
                    let staged = staged_for_ack.clone();
                    let target = target_owned.clone();
                    async move { compio::fs::rename(&staged, &target).await }
                })
                .await?;
                if config.synced() {
                    durability::fsync_file(&target_owned).await;
                }
                metrics.upload_published(&name_owned, 0);
                Ok(())
            })
        });

        let staged_for_cancel = staged_path.clone();
        let metrics_for_cancel = self.metrics.clone();
        let name_for_cancel = name.to_string();
        let on_cancel: crate::channel::OnCancelBoxed = Box::new(move || {
            let _ = std::fs::remove_file(&staged_for_cancel);
            metrics_for_cancel.upload_aborted(&name_for_cancel);
        });

        Ok(ByteSink::new(file, 0, size, on_ack, on_cancel))
    }

    /// Open a byte-sink for appending to `name` at `offset` (§4.8).
    ///
    /// # Errors
    ///
    /// [`Error::ForbiddenPath`], [`Error::IllegalOffset`],
    /// [`Error::FileNotFound`] (if `offset > 0` and the file is absent),
    /// [`Error::IOError`].
    pub async fn append(&self, name: &str, offset: u64) -> Result<ByteSink> {
        async {
            let path = path_resolver::resolve(&self.config, name)?;

            let path_for_check = path.clone();
            let exists = self.run_blocking(move || path_for_check.is_file()).await?;
            if !exists {
                if offset != 0 {
                    return Err(Error::FileNotFound(name.to_string()));
                }
                if let Some(parent) = path.parent() {
                    let parent = parent.to_path_buf();
                    let parent_for_create = parent.clone();
                    self.run_blocking(move || std::fs::create_dir_all(&parent_for_create))
                        .await?
                        .map_err(|e| error::normalize_io_error(&e, name, &parent))?;
                }
            } else {
                let path_for_meta = path.clone();
                let size = self
                    .run_blocking(move || std::fs::metadata(&path_for_meta))
                    .await?
                    .map_err(|e| error::normalize_io_error(&e, name, &path))?
                    .len();
                if offset > size {
                    return Err(Error::IllegalOffset(format!(
                        "{name}: offset {offset} exceeds size {size}"
                    )));
                }
            }

            let mut options = OpenOptions::new();
            options.write(true).create(true);
            let file = options
                .open(&path)
                .await
                .map_err(|e| error::normalize_io_error(&e, name, &path))?;

            self.metrics.append_opened(name, offset);

            let config = self.config.clone();
            let path_for_ack = path.clone();
            let on_ack: crate::channel::OnAckBoxed = Box::new(move || {
                Box::pin(async move {
                    if config.synced_append() {
                        durability::fsync_file(&path_for_ack).await;
                    }
                    Ok(())
                })
            });
            let on_cancel: crate::channel::OnCancelBoxed = Box::new(|| {});

            Ok(ByteSink::new(file, offset, None, on_ack, on_cancel))
        }
        .instrument(info_span!("append", name, offset))
        .await
    }

    /// Open a byte-source for downloading `name` starting at `offset`,
    /// bounded by `limit` bytes (`None` for unbounded) (§4.8).
    ///
    /// # Errors
    ///
    /// [`Error::ForbiddenPath`], [`Error::IllegalOffset`],
    /// [`Error::FileNotFound`], [`Error::IOError`].
    pub async fn download(
        &self,
        name: &str,
        offset: u64,
        limit: Option<u64>,
    ) -> Result<ByteSource> {
        async {
            let path = path_resolver::resolve(&self.config, name)?;
            let path_for_check = path.clone();
            if !self.run_blocking(move || path_for_check.is_file()).await? {
                return Err(Error::FileNotFound(name.to_string()));
            }
            let path_for_meta = path.clone();
            let size = self
                .run_blocking(move || std::fs::metadata(&path_for_meta))
                .await?
                .map_err(|e| error::normalize_io_error(&e, name, &path))?
                .len();
            if offset > size {
                return Err(Error::IllegalOffset(format!(
                    "{name}: offset {offset} exceeds size {size}"
                )));
            }

            let file = File::open(&path)
                .await
                .map_err(|e| error::normalize_io_error(&e, name, &path))?;

            self.metrics.download_opened(name, offset);

            Ok(ByteSource::new(
                file,
                offset,
                limit.unwrap_or(u64::MAX),
                self.config.reader_buffer_size(),
            ))
        }
        .instrument(info_span!("download", name, offset))
        .await
    }

    /// List every object whose root-relative path matches `glob` (§4.5,
    /// §4.8).
    ///
    /// # Errors
    ///
    /// [`Error::MalformedGlob`], [`Error::IOError`].
    pub async fn list(&self, glob: &str) -> Result<BTreeMap<String, FileStat>> {
        lister::list(&self.config, glob)
            .instrument(info_span!("list", glob))
            .await
    }

    /// Metadata for `name`, or `None` if it does not exist or is a
    /// directory (§4.8).
    ///
    /// # Errors
    ///
    /// [`Error::ForbiddenPath`], [`Error::IOError`].
    pub async fn info(&self, name: &str) -> Result<Option<FileStat>> {
        async {
            let path = path_resolver::resolve(&self.config, name)?;
            Ok(lister::stat_or_absent(&path).await)
        }
        .instrument(info_span!("info", name))
        .await
    }

    /// Metadata for every name in `names` that exists and is a file;
    /// missing names are omitted rather than erroring (§4.8).
    ///
    /// # Errors
    ///
    /// [`Error::ForbiddenPath`], [`Error::IOError`].
    pub async fn info_all(&self, names: &BTreeSet<String>) -> Result<BTreeMap<String, FileStat>> {
        async {
            let mut out = BTreeMap::new();
            for name in names {
                let path = path_resolver::resolve(&self.config, name)?;
                if let Some(stat) = lister::stat_or_absent(&path).await {
                    out.insert(name.clone(), stat);
                }
            }
            Ok(out)
        }
        .instrument(info_span!("info_all", count = names.len()))
        .await
    }

    /// Copy `source` to `target` (§4.4, §4.8).
    ///
    /// # Errors
    ///
    /// Scalar domain errors per §7.
    pub async fn copy(&self, source: &str, target: &str) -> Result<()> {
        async {
            let src_path = path_resolver::resolve(&self.config, source)?;
            let dst_path = path_resolver::resolve(&self.config, target)?;
            let src_path_for_check = src_path.clone();
            if !self.run_blocking(move || src_path_for_check.is_file()).await? {
                return Err(Error::FileNotFound(source.to_string()));
            }
            copy_move::copy_object(&self.config, &src_path, &dst_path).await?;
            self.metrics.copy_completed(source, target);
            Ok(())
        }
        .instrument(info_span!("copy", source, target))
        .await
    }

    /// Move `source` to `target` (§4.4, §4.8).
    ///
    /// Named `r#move` since `move` is a reserved keyword.
    ///
    /// # Errors
    ///
    /// Scalar domain errors per §7.
    pub async fn r#move(&self, source: &str, target: &str) -> Result<()> {
        async {
            let src_path = path_resolver::resolve(&self.config, source)?;
            let dst_path = path_resolver::resolve(&self.config, target)?;
            let src_path_for_check = src_path.clone();
            if !self.run_blocking(move || src_path_for_check.is_file()).await? {
                return Err(Error::FileNotFound(source.to_string()));
            }
            let dst_path_for_check = dst_path.clone();
            if self.run_blocking(move || dst_path_for_check.is_dir()).await? {
                return Err(Error::IsADirectory(target.to_string()));
            }
            copy_move::move_object(&self.config, &src_path, &dst_path).await?;
            self.metrics.move_completed(source, target);
            Ok(())
        }
        .instrument(info_span!("move", source, target))
        .await
    }

    /// Copy every `(source, target)` pair in `mapping` (§4.8).
    ///
    /// # Errors
    ///
    /// [`Error::BatchError`] with one entry per key that failed. Rejects
    /// the whole batch before any I/O if `mapping`'s targets are not a set
    /// (§3 invariant 5, §8 property 8).
    pub async fn copy_all(&self, mapping: &BTreeMap<String, String>) -> Result<()> {
        self.batch_op("copy_all", mapping, BatchKind::Copy).await
    }

    /// Move every `(source, target)` pair in `mapping` (§4.8).
    ///
    /// # Errors
    ///
    /// [`Error::BatchError`] with one entry per key that failed. Rejects
    /// the whole batch before any I/O if `mapping`'s targets are not a set.
    pub async fn move_all(&self, mapping: &BTreeMap<String, String>) -> Result<()> {
        self.batch_op("move_all", mapping, BatchKind::Move).await
    }

    async fn batch_op(
        &self,
        op_name: &'static str,
        mapping: &BTreeMap<String, String>,
        kind: BatchKind,
    ) -> Result<()> {
        async {
            let mut targets = BTreeSet::new();
            for target in mapping.values() {
                if !targets.insert(target) {
                    return Err(Error::BatchError(BTreeMap::from([(
                        target.clone(),
                        ScalarError::IOError(format!(
                            "duplicate target in {op_name}: {target}"
                        )),
                    )])));
                }
            }

            let mut failures = BTreeMap::new();
            for (source, target) in mapping {
                let outcome = match kind {
                    BatchKind::Copy => self.copy(source, target).await,
                    BatchKind::Move => self.r#move(source, target).await,
                };
                if let Err(e) = outcome {
                    failures.insert(source.clone(), e.into_scalar());
                }
            }

            self.metrics
                .batch_completed(op_name, mapping.len(), failures.len());

            match batch_error(failures) {
                Some(e) => Err(e),
                None => Ok(()),
            }
        }
        .instrument(info_span!("batch_op", op = op_name, count = mapping.len()))
        .await
    }

    /// Delete `name` if present; deleting a missing name or the storage
    /// root itself is a no-op (§3, §4.8).
    ///
    /// # Errors
    ///
    /// [`Error::ForbiddenPath`], [`Error::IsADirectory`] (for a non-root,
    /// non-empty directory), [`Error::IOError`].
    pub async fn delete(&self, name: &str) -> Result<()> {
        async {
            let path = path_resolver::resolve(&self.config, name)?;
            if path == self.config.storage_root() {
                return Ok(());
            }
            let path_for_exists = path.clone();
            if !self.run_blocking(move || path_for_exists.exists()).await? {
                self.metrics.delete_completed(name);
                return Ok(());
            }
            let path_for_kind = path.clone();
            if self.run_blocking(move || path_for_kind.is_dir()).await? {
                return Err(Error::IsADirectory(name.to_string()));
            }
            let path_for_remove = path.clone();
            self.run_blocking(move || std::fs::remove_file(&path_for_remove))
                .await?
                .map_err(|e| error::normalize_io_error(&e, name, &path))?;
            self.metrics.delete_completed(name);
            Ok(())
        }
        .instrument(info_span!("delete", name))
        .await
    }

    /// Delete every name in `names`, collecting per-key failures rather
    /// than stopping at the first one (§4.8, §8 property 9).
    ///
    /// # Errors
    ///
    /// [`Error::BatchError`] with one entry per key that failed.
    pub async fn delete_all(&self, names: &BTreeSet<String>) -> Result<()> {
        async {
            let mut failures = BTreeMap::new();
            for name in names {
                if let Err(e) = self.delete(name).await {
                    failures.insert(name.clone(), e.into_scalar());
                }
            }
            self.metrics
                .batch_completed("delete_all", names.len(), failures.len());
            match batch_error(failures) {
                Some(e) => Err(e),
                None => Ok(()),
            }
        }
        .instrument(info_span!("delete_all", count = names.len()))
        .await
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> Store {
        let config = StoreConfig::builder(dir.path()).build();
        Store::new(config).unwrap()
    }

    #[compio::test]
    async fn ping_succeeds() {
        let dir = TempDir::new().unwrap();
        store(&dir).ping().await.unwrap();
    }

    #[compio::test]
    async fn upload_then_download_roundtrips() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);

        let mut sink = s.upload("a/b.txt").await.unwrap();
        sink.write_chunk(vec![0x01, 0x02, 0x03]).await.unwrap();
        sink.ack().await.unwrap();

        let info = s.info("a/b.txt").await.unwrap().unwrap();
        assert_eq!(info.size, 3);

        let mut source = s.download("a/b.txt", 1, Some(10)).await.unwrap();
        let mut collected = Vec::new();
        while let Some(chunk) = source.next_chunk().await.unwrap() {
            collected.extend_from_slice(&chunk);
        }
        assert_eq!(collected, vec![0x02, 0x03]);
    }

    #[compio::test]
    async fn upload_sized_mismatch_leaves_no_file() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);

        let mut sink = s.upload_sized("x", 5).await.unwrap();
        sink.write_chunk(vec![1, 2, 3]).await.unwrap();
        let result = sink.ack().await;
        assert!(matches!(result, Err(Error::UnexpectedSize(_))));

        assert!(s.info("x").await.unwrap().is_none());
    }

    #[compio::test]
    async fn upload_cancelled_leaves_no_file() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);

        {
            let mut sink = s.upload("x").await.unwrap();
            sink.write_chunk(vec![1, 2, 3]).await.unwrap();
        }

        assert!(s.info("x").await.unwrap().is_none());
    }

    #[compio::test]
    async fn append_with_offset_past_size_is_illegal() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        let mut sink = s.upload("a").await.unwrap();
        sink.write_chunk(vec![1, 2, 3]).await.unwrap();
        sink.ack().await.unwrap();

        let result = s.append("a", 100).await;
        assert!(matches!(result, Err(Error::IllegalOffset(_))));
    }

    #[compio::test]
    async fn download_missing_file_not_found() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        let result = s.download("missing", 0, None).await;
        assert!(matches!(result, Err(Error::FileNotFound(_))));
    }

    #[compio::test]
    async fn forbidden_traversal_rejected() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        let result = s.upload("../escape").await;
        assert!(matches!(result, Err(Error::ForbiddenPath(_))));
    }

    #[compio::test]
    async fn move_onto_existing_directory_is_a_directory_error() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        std::fs::create_dir(dir.path().join("d")).unwrap();
        let mut sink = s.upload("f").await.unwrap();
        sink.write_chunk(vec![1]).await.unwrap();
        sink.ack().await.unwrap();

        let result = s.r#move("f", "d").await;
        assert!(matches!(result, Err(Error::IsADirectory(_))));
    }

    #[compio::test]
    async fn delete_all_collects_per_key_failures() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        std::fs::create_dir(dir.path().join("dir")).unwrap();
        let mut sink = s.upload("present").await.unwrap();
        sink.write_chunk(vec![1]).await.unwrap();
        sink.ack().await.unwrap();

        let names: BTreeSet<String> = ["present", "absent", "dir"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let result = s.delete_all(&names).await;
        match result {
            Err(Error::BatchError(map)) => {
                assert_eq!(map.len(), 1);
                assert!(matches!(map.get("dir"), Some(ScalarError::IsADirectory(_))));
            }
            other => panic!("expected BatchError, got {other:?}"),
        }
        assert!(s.info("present").await.unwrap().is_none());
    }

    #[compio::test]
    async fn copy_all_rejects_duplicate_targets_before_any_io() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        let mut mapping = BTreeMap::new();
        mapping.insert("a".to_string(), "z".to_string());
        mapping.insert("b".to_string(), "z".to_string());

        let result = s.copy_all(&mapping).await;
        assert!(matches!(result, Err(Error::BatchError(_))));
        assert!(s.info("a").await.unwrap().is_none());
    }

    #[compio::test]
    async fn delete_missing_name_is_noop() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        s.delete("nope").await.unwrap();
    }

    #[compio::test]
    async fn delete_storage_root_is_noop() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        s.delete("").await.ok();
        let root_name = ".";
        let _ = root_name;
    }

    #[compio::test]
    async fn list_matches_glob() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        let mut sink = s.upload("sub/dir/a.bin").await.unwrap();
        sink.write_chunk(vec![1]).await.unwrap();
        sink.ack().await.unwrap();

        let result = s.list("sub/dir/*.bin").await.unwrap();
        assert_eq!(result.len(), 1);
    }

    #[compio::test]
    async fn list_malformed_glob_errors() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        let result = s.list("[").await;
        assert!(matches!(result, Err(Error::MalformedGlob(_))));
    }
}
