//! # compio-fs-extended
//!
//! Extended filesystem operations for compio that the base `compio::fs`
//! crate does not expose:
//!
//! - `copy_file_range` for efficient same-filesystem copies, with an
//!   async read/write fallback when the syscall is unavailable.
//! - Hardlink creation, used by the object store's hardlink-preferred
//!   copy/move strategy.
//! - Lightweight metadata conversion (size, mtime) and mtime bumping
//!   ("touch"), used for the store's `(size, timestamp_ms)` metadata
//!   tuple and its `copy(S, S)`/`move(S, S)` no-op path.
//!
//! These are small, syscall-shaped building blocks; the policy that
//! decides *when* to hardlink vs. copy, or how to interpret a failed
//! syscall, lives in the `objectfs_store` crate.

pub mod copy;
pub mod error;
pub mod hardlink;
pub mod metadata;

pub use copy::{copy_file_range_with_fallback, CopyFileRange};
pub use error::{ExtendedError, Result};
pub use hardlink::HardlinkOps;
pub use metadata::{touch, FileStat};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
