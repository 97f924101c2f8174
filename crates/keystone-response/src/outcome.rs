//! Handler results and how the pipeline emits them.
//!
//! Handlers return [`HandlerResult`]. The `Err` side is a complete
//! [`Response`] that short-circuits the handler (a 404, a redirect, an
//! error body); the pipeline sends it exactly like a successful one.

use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use crate::error::ResponseResult;
use crate::response::Response;
use crate::streaming::{StreamState, StreamingResponse};
use crate::transport::RequestContext;

/// What a handler produced on success.
#[derive(Debug)]
pub enum Reply {
    Full(Response),
    /// A streaming response the handler wrote (or left open).
    Streamed(StreamingResponse),
}

pub type HandlerResult = Result<Reply, Response>;

impl From<Response> for Reply {
    fn from(resp: Response) -> Self {
        Reply::Full(resp)
    }
}

impl From<StreamingResponse> for Reply {
    fn from(resp: StreamingResponse) -> Self {
        Reply::Streamed(resp)
    }
}

/// Send a handler's result over the request's transport.
///
/// Streaming responses are sealed if the handler did not close them,
/// so every request ends with exactly one final body frame.
pub async fn emit(result: HandlerResult, request: Arc<dyn RequestContext>) -> ResponseResult<()> {
    match result {
        Ok(Reply::Full(resp)) => resp.send(request.transport().as_ref()).await,
        Err(resp) => {
            debug!(status = resp.status(), path = request.path(), "handler short-circuited");
            resp.send(request.transport().as_ref()).await
        }
        Ok(Reply::Streamed(mut stream)) => match stream.state() {
            StreamState::Closed => Ok(()),
            StreamState::NotStarted => {
                stream.prepare(request).await?;
                stream.write_eof(Bytes::new()).await
            }
            StreamState::Prepared => stream.write_eof(Bytes::new()).await,
        },
    }
}
