//! Body frame writer for one response.
//!
//! A [`StreamWriter`] owns a FIFO queue of pending chunks and the
//! transport they are flushed to. Each chunk becomes one
//! `http.response.body` frame with `more_body = true`; the writer ends
//! with exactly one frame carrying `more_body = false`.
//!
//! # Cancellation
//!
//! Not cancel-safe. Dropping a `write`/`write_eof` future mid-flush can
//! lose the chunk that was being transmitted. Treat a cancelled write as
//! terminal for the response.

use std::collections::VecDeque;
use std::fmt;

use bytes::Bytes;
use tracing::trace;

use crate::error::{ResponseError, ResponseResult};
use crate::transport::{Message, SharedTransport};

pub struct StreamWriter {
    transport: SharedTransport,
    queue: VecDeque<Bytes>,
    /// Bytes queued but not yet handed to the transport.
    buffer_size: usize,
    /// Bytes handed to the transport, final frame included.
    output_size: usize,
    eof: bool,
}

impl fmt::Debug for StreamWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamWriter")
            .field("buffer_size", &self.buffer_size)
            .field("output_size", &self.output_size)
            .field("eof", &self.eof)
            .finish_non_exhaustive()
    }
}

impl StreamWriter {
    pub fn new(transport: SharedTransport) -> Self {
        Self {
            transport,
            queue: VecDeque::new(),
            buffer_size: 0,
            output_size: 0,
            eof: false,
        }
    }

    /// Queue `chunk` and flush the queue.
    ///
    /// Suspends while the transport applies backpressure. Every call
    /// yields one body frame, empty chunks included.
    pub async fn write(&mut self, chunk: impl Into<Bytes>) -> ResponseResult<()> {
        if self.eof {
            return Err(ResponseError::ProtocolState(
                "Cannot write to a stream after eof",
            ));
        }
        let chunk = chunk.into();
        self.buffer_size += chunk.len();
        self.queue.push_back(chunk);
        self.drain().await
    }

    /// Transmit every queued chunk in FIFO order.
    ///
    /// A no-op once the queue is empty, including after eof.
    pub async fn drain(&mut self) -> ResponseResult<()> {
        while let Some(chunk) = self.queue.pop_front() {
            let len = chunk.len();
            self.buffer_size -= len;
            self.transport.send(Message::body(chunk, true)).await?;
            self.output_size += len;
            trace!(len, total = self.output_size, "body frame sent");
        }
        Ok(())
    }

    /// Flush the queue, then send the terminal frame carrying `chunk`.
    ///
    /// The terminal frame is sent at most once; later calls return `Ok`.
    pub async fn write_eof(&mut self, chunk: impl Into<Bytes>) -> ResponseResult<()> {
        if self.eof {
            return Ok(());
        }
        self.drain().await?;

        let chunk = chunk.into();
        let len = chunk.len();
        self.transport.send(Message::body(chunk, false)).await?;
        self.eof = true;
        self.output_size += len;
        trace!(total = self.output_size, "eof frame sent");
        Ok(())
    }

    pub fn enable_compression(&mut self, _encoding: &str) -> ResponseResult<()> {
        Err(ResponseError::NotSupported("body compression"))
    }

    pub fn enable_chunking(&mut self) -> ResponseResult<()> {
        Err(ResponseError::NotSupported("chunked transfer encoding"))
    }

    pub fn output_size(&self) -> usize {
        self.output_size
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn is_eof(&self) -> bool {
        self.eof
    }
}
