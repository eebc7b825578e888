//! # objectfs-store
//!
//! A local-filesystem-backed object store: a small, uniform API (upload,
//! append, download, list, info, copy, move, delete) over a bounded
//! storage root, with path confinement, atomic publication, a
//! hardlink-preferred copy strategy and a closed domain error taxonomy.
//!
//! The store runs its public API on a single cooperative event loop
//! ([`compio`]'s reactor); every filesystem syscall is shipped to a
//! blocking worker pool (see [`dispatcher`]) so the reactor thread never
//! blocks on I/O.
//!
//! ```rust,no_run
//! use objectfs_store::{Store, StoreConfig};
//!
//! #[compio::main]
//! async fn main() -> objectfs_store::Result<()> {
//!     let config = StoreConfig::builder("/srv/objects").build();
//!     let store = Store::new(config)?;
//!
//!     let mut sink = store.upload("greeting.txt").await?;
//!     sink.write_chunk(b"hello".to_vec()).await?;
//!     sink.ack().await?;
//!
//!     let info = store.info("greeting.txt").await?;
//!     println!("{info:?}");
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod config;
pub mod copy_move;
pub mod dispatcher;
pub mod durability;
pub mod error;
pub mod lister;
pub mod metrics;
pub mod path_resolver;
pub mod store;
pub mod target_ensurer;

pub use channel::{ByteSink, ByteSource};
pub use config::{StoreConfig, StoreConfigBuilder};
pub use error::{Error, Result, ScalarError};
pub use metrics::{NoopMetrics, StoreMetrics};
pub use store::Store;

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
