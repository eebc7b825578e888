//! Streaming Channels (§4.9, §6): the sink/source abstraction upload,
//! append and download hand back to callers.
//!
//! Both types read/write through compio's io_uring-backed
//! `AsyncReadAt`/`AsyncWriteAt` directly: each `write_chunk`/`next_chunk`
//! issues one `pwrite`/`pread` against the reactor and is awaited before
//! the next chunk is accepted, which is how backpressure works without a
//! bounded channel or extra buffering. There is no separate blocking-pool
//! hop here — unlike `crate::dispatcher`'s plain synchronous calls, a
//! `compio::fs::File` read/write is already asynchronous via io_uring.

use crate::error::{Error, Result};
use compio::fs::File;
use compio_io::{AsyncReadAt, AsyncWriteAt};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};

/// Boxed "on acknowledge" hook run once, when [`ByteSink::ack`] is called.
pub type OnAckBoxed = Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = Result<()>> + Send>> + Send>;
/// Boxed "on cancel" hook run once, if the sink is dropped without acking.
pub type OnCancelBoxed = Box<dyn FnOnce() + Send>;

/// Byte-sink channel handed back by `upload`/`append`.
///
/// Dropping a sink before calling [`ByteSink::ack`] cancels the write: the
/// "on cancel" hook runs (upload's staging-file unlink, §5 "Cancellation").
pub struct ByteSink {
    file: File,
    offset: u64,
    expected_size: Option<u64>,
    written: u64,
    on_ack: Option<OnAckBoxed>,
    on_cancel: Option<OnCancelBoxed>,
    acked: AtomicBool,
}

impl ByteSink {
    pub(crate) fn new(
        file: File,
        offset: u64,
        expected_size: Option<u64>,
        on_ack: OnAckBoxed,
        on_cancel: OnCancelBoxed,
    ) -> Self {
        Self {
            file,
            offset,
            expected_size,
            written: 0,
            on_ack: Some(on_ack),
            on_cancel: Some(on_cancel),
            acked: AtomicBool::new(false),
        }
    }

    /// Write one chunk, advancing the sink's internal offset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IOError`] if the underlying write fails, or
    /// [`Error::UnexpectedSize`] if a fixed-size upload would exceed its
    /// declared size.
    pub async fn write_chunk(&mut self, chunk: Vec<u8>) -> Result<()> {
        let len = chunk.len() as u64;
        if let Some(expected) = self.expected_size {
            if self.written + len > expected {
                return Err(Error::UnexpectedSize(format!(
                    "wrote {} bytes, expected exactly {}",
                    self.written + len,
                    expected
                )));
            }
        }

        let result = self.file.write_at(chunk, self.offset).await;
        result
            .0
            .map_err(|e| Error::IOError(format!("write_chunk: {e}")))?;
        self.offset += len;
        self.written += len;
        Ok(())
    }

    /// Acknowledge the stream as complete, running the on-acknowledge hook
    /// (publication, or forcing durability before close).
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnexpectedSize`] if a fixed-size upload did not
    /// receive exactly the declared number of bytes, or whatever error the
    /// on-acknowledge hook produces.
    pub async fn ack(mut self) -> Result<()> {
        if let Some(expected) = self.expected_size {
            if self.written != expected {
                return Err(Error::UnexpectedSize(format!(
                    "wrote {} bytes, expected exactly {expected}",
                    self.written
                )));
            }
        }
        self.acked.store(true, Ordering::SeqCst);
        let on_ack = self.on_ack.take().expect("ack() is the only consumer");
        self.on_cancel = None;
        on_ack().await
    }

    /// Total bytes written so far.
    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.written
    }
}

impl Drop for ByteSink {
    fn drop(&mut self) {
        if !self.acked.load(Ordering::SeqCst) {
            if let Some(on_cancel) = self.on_cancel.take() {
                on_cancel();
            }
        }
    }
}

/// Byte-source channel handed back by `download`.
pub struct ByteSource {
    file: File,
    offset: u64,
    remaining: u64,
    buffer_size: usize,
}

impl ByteSource {
    pub(crate) fn new(file: File, offset: u64, limit: u64, buffer_size: usize) -> Self {
        Self {
            file,
            offset,
            remaining: limit,
            buffer_size,
        }
    }

    /// Read the next chunk, or `None` at EOF or once `limit` bytes have been
    /// delivered.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IOError`] if the underlying read fails.
    pub async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        let to_read = self.buffer_size.min(self.remaining as usize).max(1);
        let buf = vec![0u8; to_read];
        let (result, buf) = self.file.read_at(buf, self.offset).await;
        let n = result.map_err(|e| Error::IOError(format!("next_chunk: {e}")))?;
        if n == 0 {
            self.remaining = 0;
            return Ok(None);
        }
        self.offset += n as u64;
        self.remaining = self.remaining.saturating_sub(n as u64);
        let mut buf = buf;
        buf.truncate(n);
        Ok(Some(buf))
    }
}
