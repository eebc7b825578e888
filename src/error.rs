//! Closed domain error taxonomy for the object store.
//!
//! Host filesystem errors carry almost no structure a caller can branch on
//! (`io::ErrorKind` has `NotFound` and a long tail of `Other`). This module
//! normalizes every host failure the store can observe into one of a fixed
//! set of kinds, plus a `BatchError` shape for multi-key operations whose
//! per-key outcomes must not collapse into the first failure.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;

/// Result alias used throughout the store.
pub type Result<T> = std::result::Result<T, Error>;

/// The closed domain error set (§7).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A logical name resolved outside storage root, or inside temp-dir.
    #[error("forbidden path: {0}")]
    ForbiddenPath(String),

    /// An operation required an existing file that was not there.
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// A name refers to a directory where a file was required.
    #[error("is a directory: {0}")]
    IsADirectory(String),

    /// An intermediate path component is a regular file, not a directory.
    #[error("path contains file: {0}")]
    PathContainsFile(String),

    /// A requested offset is negative or exceeds the current file size.
    #[error("illegal offset: {0}")]
    IllegalOffset(String),

    /// A fixed-size upload observed a byte count different from the
    /// declared size.
    #[error("unexpected size: {0}")]
    UnexpectedSize(String),

    /// A glob pattern could not be parsed.
    #[error("malformed glob: {0}")]
    MalformedGlob(String),

    /// Any other host failure that does not fit the kinds above.
    #[error("I/O error: {0}")]
    IOError(String),

    /// Per-key failures from a multi-key operation.
    ///
    /// Deliberately not a variant that wraps a single `Error` — a batch
    /// failure is a distinct shape from a scalar one, not a subtype of it
    /// (§9).
    #[error("batch error: {0:?}")]
    BatchError(BTreeMap<String, ScalarError>),
}

/// The subset of [`Error`] that can appear as a per-key failure inside a
/// [`Error::BatchError`]. Excludes `BatchError` itself, since batches do not
/// nest.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ScalarError {
    /// See [`Error::ForbiddenPath`].
    #[error("forbidden path: {0}")]
    ForbiddenPath(String),
    /// See [`Error::FileNotFound`].
    #[error("file not found: {0}")]
    FileNotFound(String),
    /// See [`Error::IsADirectory`].
    #[error("is a directory: {0}")]
    IsADirectory(String),
    /// See [`Error::PathContainsFile`].
    #[error("path contains file: {0}")]
    PathContainsFile(String),
    /// See [`Error::IllegalOffset`].
    #[error("illegal offset: {0}")]
    IllegalOffset(String),
    /// See [`Error::UnexpectedSize`].
    #[error("unexpected size: {0}")]
    UnexpectedSize(String),
    /// See [`Error::MalformedGlob`].
    #[error("malformed glob: {0}")]
    MalformedGlob(String),
    /// See [`Error::IOError`].
    #[error("I/O error: {0}")]
    IOError(String),
}

impl From<ScalarError> for Error {
    fn from(e: ScalarError) -> Self {
        match e {
            ScalarError::ForbiddenPath(s) => Error::ForbiddenPath(s),
            ScalarError::FileNotFound(s) => Error::FileNotFound(s),
            ScalarError::IsADirectory(s) => Error::IsADirectory(s),
            ScalarError::PathContainsFile(s) => Error::PathContainsFile(s),
            ScalarError::IllegalOffset(s) => Error::IllegalOffset(s),
            ScalarError::UnexpectedSize(s) => Error::UnexpectedSize(s),
            ScalarError::MalformedGlob(s) => Error::MalformedGlob(s),
            ScalarError::IOError(s) => Error::IOError(s),
        }
    }
}

impl Error {
    /// Downgrade an `Error` to a [`ScalarError`] for insertion into a batch
    /// map. Panics only on `BatchError`, which a caller should never hand
    /// here (batches don't nest).
    #[must_use]
    pub fn into_scalar(self) -> ScalarError {
        match self {
            Error::ForbiddenPath(s) => ScalarError::ForbiddenPath(s),
            Error::FileNotFound(s) => ScalarError::FileNotFound(s),
            Error::IsADirectory(s) => ScalarError::IsADirectory(s),
            Error::PathContainsFile(s) => ScalarError::PathContainsFile(s),
            Error::IllegalOffset(s) => ScalarError::IllegalOffset(s),
            Error::UnexpectedSize(s) => ScalarError::UnexpectedSize(s),
            Error::MalformedGlob(s) => ScalarError::MalformedGlob(s),
            Error::IOError(s) => ScalarError::IOError(s),
            Error::BatchError(_) => {
                ScalarError::IOError("nested batch error".to_string())
            }
        }
    }
}

/// Normalize a raw `io::Error` observed while operating on `name` into a
/// scalar domain error (§4.6).
///
/// `name` is re-stated against the filesystem (existence/kind check) when the
/// `io::Error`'s `ErrorKind` alone is not enough to distinguish
/// `FileNotFound` from `IsADirectory` from a generic `IOError`.
pub fn normalize_io_error(err: &io::Error, name: &str, path: &Path) -> Error {
    match err.kind() {
        io::ErrorKind::NotFound => Error::FileNotFound(name.to_string()),
        io::ErrorKind::AlreadyExists => {
            if path.is_dir() {
                Error::IsADirectory(name.to_string())
            } else {
                Error::PathContainsFile(name.to_string())
            }
        }
        _ => {
            if !path.exists() {
                Error::FileNotFound(name.to_string())
            } else if path.is_dir() {
                Error::IsADirectory(name.to_string())
            } else {
                Error::IOError(format!("{name}: {err}"))
            }
        }
    }
}

/// Build a [`Error::BatchError`] from per-key outcomes, skipping keys that
/// succeeded.
pub fn batch_error(failures: BTreeMap<String, ScalarError>) -> Option<Error> {
    if failures.is_empty() {
        None
    } else {
        Some(Error::BatchError(failures))
    }
}

/// Unwrap a one-element batch error back to its scalar error, per the rule
/// that a multi-key primitive used as a single-key convenience surfaces a
/// scalar failure, not a one-element map (§4.6, §7).
#[must_use]
pub fn unwrap_single(err: Error) -> Error {
    match err {
        Error::BatchError(mut map) if map.len() == 1 => {
            let (_, scalar) = map.pop_first().unwrap_or_else(|| {
                unreachable!("len() == 1 guarantees pop_first returns Some")
            });
            scalar.into()
        }
        other => other,
    }
}
