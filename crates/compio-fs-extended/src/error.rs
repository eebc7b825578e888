//! Error type for low-level extended filesystem operations.
//!
//! This crate sits below the object store's own error taxonomy
//! (`objectfs_store::error::Error`): it only needs to say *which syscall*
//! failed and *why*, since the caller is responsible for turning that back
//! into a domain error kind.

use std::io;

/// Result alias used throughout this crate.
pub type Result<T> = std::result::Result<T, ExtendedError>;

/// Errors produced by extended filesystem operations.
#[derive(Debug, thiserror::Error)]
pub enum ExtendedError {
    /// `copy_file_range` (or its read/write fallback) failed.
    #[error("copy_file_range failed: {0}")]
    CopyFileRange(String),

    /// Hardlink creation failed.
    #[error("hardlink failed: {0}")]
    Hardlink(String),

    /// Metadata retrieval or mtime update failed.
    #[error("metadata operation failed: {0}")]
    Metadata(String),

    /// A `spawn_blocking` task panicked or was cancelled.
    #[error("blocking task join failed: {0}")]
    SpawnJoin(String),

    /// Any other I/O error, passed through unchanged.
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub(crate) fn copy_file_range_error(msg: &str) -> ExtendedError {
    ExtendedError::CopyFileRange(msg.to_string())
}

pub(crate) fn hardlink_error(msg: &str) -> ExtendedError {
    ExtendedError::Hardlink(msg.to_string())
}

pub(crate) fn metadata_error(msg: &str) -> ExtendedError {
    ExtendedError::Metadata(msg.to_string())
}
