//! The boundary between responses and the server transport.
//!
//! Responses never touch sockets. They hand [`Message`] frames to a
//! [`Transport`], which the server wires to whatever carries the bytes
//! (a channel feeding an HTTP body, a test recorder, ...).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;

use crate::error::ResponseResult;
use crate::streaming::StreamingResponse;

/// Message type tag of the frame carrying status and headers.
pub const RESPONSE_START: &str = "http.response.start";

/// Message type tag of a body frame.
pub const RESPONSE_BODY: &str = "http.response.body";

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Future returned by [`Transport::send`] and [`RequestContext::prepare_hook`].
pub type FrameFuture<'a> = BoxFuture<'a, ResponseResult<()>>;

/// One ASGI-style response frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// `http.response.start`: sent exactly once, before any body frame.
    Start {
        status: u16,
        headers: Vec<(Bytes, Bytes)>,
    },
    /// `http.response.body`: `more_body` is `false` only on the last frame.
    Body { body: Bytes, more_body: bool },
}

impl Message {
    pub fn start(status: u16, headers: Vec<(Bytes, Bytes)>) -> Self {
        Message::Start { status, headers }
    }

    pub fn body(body: impl Into<Bytes>, more_body: bool) -> Self {
        Message::Body {
            body: body.into(),
            more_body,
        }
    }

    /// The protocol `type` tag for this frame.
    pub fn message_type(&self) -> &'static str {
        match self {
            Message::Start { .. } => RESPONSE_START,
            Message::Body { .. } => RESPONSE_BODY,
        }
    }

    /// `true` for the body frame that ends the response.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            Message::Body {
                more_body: false,
                ..
            }
        )
    }
}

/// The transport send capability.
///
/// `send` may suspend until the peer accepts the frame; that suspension
/// is the only backpressure a response sees.
pub trait Transport: Send + Sync {
    fn send(&self, message: Message) -> FrameFuture<'_>;
}

/// Shared handle to a transport, cloned into each writer.
pub type SharedTransport = Arc<dyn Transport>;

/// What a streaming response needs from the request that owns it.
pub trait RequestContext: Send + Sync {
    fn method(&self) -> &str;

    fn path(&self) -> &str;

    /// `None` when the request expressed no preference.
    fn keep_alive(&self) -> Option<bool>;

    fn transport(&self) -> SharedTransport;

    /// Invoked once by [`StreamingResponse::prepare`] right before the
    /// start frame; middleware may still change status and headers here.
    fn prepare_hook<'a>(&'a self, _response: &'a mut StreamingResponse) -> FrameFuture<'a> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_type_tags() {
        assert_eq!(Message::start(200, vec![]).message_type(), "http.response.start");
        assert_eq!(Message::body("x", true).message_type(), "http.response.body");
    }

    #[test]
    fn only_last_body_frame_is_final() {
        assert!(!Message::start(200, vec![]).is_final());
        assert!(!Message::body("chunk", true).is_final());
        assert!(Message::body(Bytes::new(), false).is_final());
    }
}
