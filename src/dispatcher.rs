//! Blocking Dispatcher (§4.7): submit a blocking closure to a worker pool,
//! complete a future on the event loop.
//!
//! The store runs on compio's single-threaded cooperative reactor; every
//! plain, synchronous filesystem call the facade makes (existence/kind
//! checks, directory creation, metadata reads, unlinks) is shipped here as
//! a blocking closure instead of being called directly on the reactor
//! thread. Operations with an io_uring-native async form (file read/write,
//! rename, hardlink) go straight through `compio::fs`/`compio-fs-extended`
//! instead, since the reactor already drives those without blocking.

use compio::dispatcher::Dispatcher;
use std::sync::Arc;

/// Thin wrapper around `compio::dispatcher::Dispatcher` that gives the rest
/// of the store a single chokepoint for "run this blocking closure off the
/// event loop."
#[derive(Clone)]
pub struct BlockingDispatcher {
    inner: Arc<Dispatcher>,
}

impl BlockingDispatcher {
    /// Create a dispatcher with a worker pool sized to the host's CPU
    /// count, mirroring the default the rest of the compio ecosystem uses
    /// for CPU/IO-bound blocking work.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying worker pool cannot be spawned
    /// (thread creation failure).
    pub fn new() -> std::io::Result<Self> {
        Ok(Self {
            inner: Arc::new(Dispatcher::new()?),
        })
    }

    /// Submit the blocking closure `f` to the worker pool and await its
    /// result on the event loop.
    ///
    /// Each worker thread runs its own compio reactor, so `dispatch` wants
    /// an async closure even for purely synchronous work; `f` is wrapped
    /// accordingly.
    ///
    /// # Errors
    ///
    /// Returns an error if the dispatcher's worker pool has shut down or the
    /// task panicked.
    pub async fn run<F, T>(&self, f: F) -> std::io::Result<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.inner
            .dispatch(move || async move { f() })
            .map_err(|e| std::io::Error::other(format!("dispatch failed: {e:?}")))?
            .await
            .map_err(|e| std::io::Error::other(format!("worker task failed: {e:?}")))
    }
}

impl std::fmt::Debug for BlockingDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingDispatcher").finish_non_exhaustive()
    }
}
