//! keystone-response — the HTTP response layer of Keystone.
//!
//! Two kinds of response share one transport boundary:
//!
//! - [`Response`]: the body is known up front. Built from the [`Status`]
//!   table, sent as a start frame plus one final body frame.
//! - [`StreamingResponse`]: the body is produced incrementally through a
//!   [`StreamWriter`], under a `NotStarted → Prepared → Closed` state
//!   machine.
//!
//! # Transport Model
//!
//! Responses speak an ASGI-style protocol: an `http.response.start`
//! [`Message`] carrying status and headers, then `http.response.body`
//! frames with `more_body = true`, then exactly one frame with
//! `more_body = false`. The [`Transport`] implementation decides where
//! those frames go. Backpressure is whatever `Transport::send` imposes.
//!
//! # Ownership
//!
//! A response and its writer are driven by one task. All transitions
//! take `&mut self`; nothing here locks.

mod error;
mod header;
mod outcome;
mod response;
mod state;
pub mod status;
mod streaming;
mod transport;
mod writer;

pub use error::{ResponseError, ResponseResult};
pub use header::{Header, HeaderMap};
pub use outcome::{HandlerResult, Reply, emit};
pub use response::{Detail, ErrorOptions, ErrorReason, Payload, Response, ResponseOptions};
pub use state::KeyValueState;
pub use status::{Status, StatusClass, StatusShape};
pub use streaming::{DEFAULT_STREAM_CONTENT_TYPE, StreamState, StreamingResponse};
pub use transport::{
    FrameFuture, Message, RESPONSE_BODY, RESPONSE_START, RequestContext, SharedTransport,
    Transport,
};
pub use writer::StreamWriter;
