//! Incrementally produced HTTP responses.
//!
//! A [`StreamingResponse`] moves forward through three states:
//!
//! ```text
//! NotStarted ──prepare()──▶ Prepared ──write_eof()──▶ Closed
//! ```
//!
//! `prepare` sends the single `http.response.start` frame and creates the
//! [`StreamWriter`]; `write` is only legal while Prepared; `write_eof`
//! seals the body and releases the request and the writer.
//!
//! Every transition takes `&mut self`, so one task owns the response at a
//! time. There is no internal locking. Like the writer it drives, the
//! response is not cancel-safe: a cancelled `write` leaves it terminal.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use tracing::debug;

use crate::error::{ResponseError, ResponseResult};
use crate::header::HeaderMap;
use crate::state::KeyValueState;
use crate::status::check_status;
use crate::transport::{Message, RequestContext};
use crate::writer::StreamWriter;

/// Content type applied at prepare time when none was set.
pub const DEFAULT_STREAM_CONTENT_TYPE: &str = "application/octet-stream";

static NEXT_RESPONSE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    NotStarted,
    Prepared,
    Closed,
}

pub struct StreamingResponse {
    id: u64,
    status: u16,
    headers: HeaderMap,
    content_type: Option<String>,
    content_length: Option<u64>,
    keep_alive: Option<bool>,
    state: StreamState,
    writer: Option<StreamWriter>,
    request: Option<Arc<dyn RequestContext>>,
    body_length: Option<usize>,
    scratch: KeyValueState,
}

impl StreamingResponse {
    pub fn new(status: u16) -> ResponseResult<Self> {
        Self::with_headers(status, HeaderMap::new())
    }

    pub fn with_headers(status: u16, headers: HeaderMap) -> ResponseResult<Self> {
        Ok(Self {
            id: NEXT_RESPONSE_ID.fetch_add(1, Ordering::Relaxed),
            status: check_status(status)?,
            headers,
            content_type: None,
            content_length: None,
            keep_alive: None,
            state: StreamState::NotStarted,
            writer: None,
            request: None,
            body_length: None,
            scratch: KeyValueState::new(),
        })
    }

    /// Process-unique identity of this instance.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// Change the status. Only meaningful before `prepare`.
    pub fn set_status(&mut self, status: u16) -> ResponseResult<()> {
        self.status = check_status(status)?;
        Ok(())
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn set_content_type(&mut self, content_type: impl Into<String>) {
        self.content_type = Some(content_type.into());
    }

    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    pub fn set_content_length(&mut self, length: u64) {
        self.content_length = Some(length);
    }

    /// The keep-alive policy: the explicit override before `prepare`, the
    /// resolved policy after.
    pub fn keep_alive(&self) -> Option<bool> {
        self.keep_alive
    }

    pub fn set_keep_alive(&mut self, keep_alive: bool) {
        self.keep_alive = Some(keep_alive);
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn prepared(&self) -> bool {
        self.writer.is_some()
    }

    /// Total bytes written, recorded when the response is closed.
    pub fn body_length(&self) -> Option<usize> {
        self.body_length
    }

    pub fn scratch(&self) -> &KeyValueState {
        &self.scratch
    }

    pub fn scratch_mut(&mut self) -> &mut KeyValueState {
        &mut self.scratch
    }

    /// Run the request's prepare hook and send the start frame.
    ///
    /// Idempotent: while Prepared the existing writer is returned and no
    /// frame is sent; once Closed this returns `Ok(None)`.
    pub async fn prepare(
        &mut self,
        request: Arc<dyn RequestContext>,
    ) -> ResponseResult<Option<&mut StreamWriter>> {
        match self.state {
            StreamState::Closed => return Ok(None),
            StreamState::Prepared => return Ok(self.writer.as_mut()),
            StreamState::NotStarted => {}
        }

        request.prepare_hook(self).await?;
        self.start(request).await.map(Some)
    }

    async fn start(&mut self, request: Arc<dyn RequestContext>) -> ResponseResult<&mut StreamWriter> {
        let keep_alive = self
            .keep_alive
            .or_else(|| request.keep_alive())
            .unwrap_or(true);
        self.keep_alive = Some(keep_alive);

        let content_type = self
            .content_type
            .clone()
            .unwrap_or_else(|| DEFAULT_STREAM_CONTENT_TYPE.to_string());
        self.headers.set_default("Content-Type", content_type);
        if let Some(length) = self.content_length {
            self.headers.set_default("Content-Length", length.to_string());
        }

        let transport = request.transport();
        transport
            .send(Message::start(self.status, self.headers.to_wire()))
            .await?;

        debug!(
            response = self.id,
            status = self.status,
            method = request.method(),
            path = request.path(),
            keep_alive,
            "streaming response started"
        );

        self.request = Some(request);
        self.state = StreamState::Prepared;
        Ok(self.writer.insert(StreamWriter::new(transport)))
    }

    pub async fn write(&mut self, data: impl Into<Bytes>) -> ResponseResult<()> {
        self.active_writer("write")?.write(data).await
    }

    /// Flush anything still queued in the writer.
    pub async fn drain(&mut self) -> ResponseResult<()> {
        self.active_writer("drain")?.drain().await
    }

    /// Seal the body. A second call is a no-op.
    pub async fn write_eof(&mut self, data: impl Into<Bytes>) -> ResponseResult<()> {
        if self.state == StreamState::Closed {
            return Ok(());
        }
        let Some(writer) = self.writer.as_mut() else {
            return Err(ResponseError::ProtocolState("Response has not been started"));
        };

        writer.write_eof(data).await?;
        self.body_length = Some(writer.output_size());
        self.state = StreamState::Closed;
        self.request = None;
        self.writer = None;

        debug!(response = self.id, body_length = ?self.body_length, "streaming response closed");
        Ok(())
    }

    fn active_writer(&mut self, op: &'static str) -> ResponseResult<&mut StreamWriter> {
        match (self.state, self.writer.as_mut()) {
            (StreamState::Closed, _) => Err(ResponseError::ProtocolState(match op {
                "write" => "Cannot call write() after write_eof()",
                _ => "EOF has already been sent",
            })),
            (_, Some(writer)) => Ok(writer),
            (_, None) => Err(ResponseError::ProtocolState(match op {
                "write" => "Cannot call write() before prepare()",
                _ => "Response has not been started",
            })),
        }
    }
}

impl PartialEq for StreamingResponse {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for StreamingResponse {}

impl Hash for StreamingResponse {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for StreamingResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingResponse")
            .field("id", &self.id)
            .field("status", &self.status)
            .field("state", &self.state)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for StreamingResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.state, &self.request) {
            (StreamState::Closed, _) => write!(f, "<StreamingResponse eof>"),
            (StreamState::Prepared, Some(req)) => {
                write!(f, "<StreamingResponse {} {}>", req.method(), req.path())
            }
            _ => write!(f, "<StreamingResponse not prepared>"),
        }
    }
}
