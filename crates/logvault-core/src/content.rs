//! Line-oriented access to stored objects.
//!
//! Line terminators follow the usual conventions: `\n`, `\r\n` and a lone
//! `\r` all end a line. Invalid UTF-8 is replaced rather than rejected.

use std::io;
use std::ops::ControlFlow;
use std::sync::Arc;

use futures::TryStreamExt;
use tokio::io::AsyncBufReadExt;
use tokio_util::io::StreamReader;

use crate::error::{StorageError, StorageResult};
use crate::storage::ObjectStorage;

/// Outcome of a line traversal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineScan {
    /// Lines handed to the visitor.
    pub lines_read: u64,
    /// Whether the visitor asked to stop before the end of the object.
    pub stopped_early: bool,
}

/// Reads objects from one bucket as text.
#[derive(Clone)]
pub struct ContentReader {
    storage: Arc<dyn ObjectStorage>,
}

impl ContentReader {
    /// Creates a reader over one bucket.
    pub fn new(storage: Arc<dyn ObjectStorage>) -> Self {
        Self { storage }
    }

    /// Reads the whole object, with every line terminated by `\n`.
    pub async fn read_all(&self, key: &str) -> StorageResult<String> {
        let mut text = String::new();
        self.for_each_line(key, |line| {
            text.push_str(line);
            text.push('\n');
            ControlFlow::Continue(())
        })
        .await?;
        Ok(text)
    }

    /// Streams the object line by line, without terminators.
    ///
    /// The visitor returns [`ControlFlow::Break`] to stop early. The
    /// underlying stream is released when this returns, on every path.
    pub async fn for_each_line<F>(&self, key: &str, mut visitor: F) -> StorageResult<LineScan>
    where
        F: FnMut(&str) -> ControlFlow<()>,
    {
        let stream = self.storage.get(key).await?;
        let mut reader = StreamReader::new(stream.map_err(io::Error::other));

        let mut scan = LineScan::default();
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let read = reader
                .read_until(b'\n', &mut buf)
                .await
                .map_err(|e| read_error(key, &e))?;
            if read == 0 {
                break;
            }

            if buf.last() == Some(&b'\n') {
                buf.pop();
            }
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }

            let segment = String::from_utf8_lossy(&buf);
            for line in segment.split('\r') {
                scan.lines_read += 1;
                if visitor(line).is_break() {
                    scan.stopped_early = true;
                    return Ok(scan);
                }
            }
        }
        Ok(scan)
    }
}

fn read_error(key: &str, err: &io::Error) -> StorageError {
    // Errors raised by the byte stream itself come back wrapped.
    if let Some(inner) = err.get_ref().and_then(|e| e.downcast_ref::<StorageError>()) {
        if inner.is_not_found() {
            return StorageError::NotFound(key.to_string());
        }
    }
    StorageError::request("get", format!("reading '{key}': {err}"))
}
