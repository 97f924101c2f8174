//! Bridge between axum and the response transport.
//!
//! Each request gets a bounded channel. The handler runs on its own task
//! and emits frames into the channel; the axum side waits for the start
//! frame, turns it into status and headers, and streams the remaining
//! body frames as the HTTP body. A full channel suspends the handler.

use std::future::Future;
use std::sync::Arc;

use axum::body::Body;
use axum::http::header::CONNECTION;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response as HttpResponse};
use bytes::Bytes;
use futures_util::{Stream, stream};
use keystone_response::{
    FrameFuture, HandlerResult, Message, RequestContext, ResponseError, SharedTransport, Transport,
    emit,
};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("response ended without a final body frame")]
    Truncated,

    #[error("start frame sent twice")]
    DuplicateStart,
}

/// Transport that forwards frames into a bounded channel.
pub struct ChannelTransport {
    tx: mpsc::Sender<Message>,
}

impl ChannelTransport {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Message>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl Transport for ChannelTransport {
    fn send(&self, message: Message) -> FrameFuture<'_> {
        Box::pin(async move {
            self.tx
                .send(message)
                .await
                .map_err(|_| ResponseError::Transport("client went away".into()))
        })
    }
}

/// The request as seen by responses.
pub struct HttpRequest {
    method: String,
    path: String,
    keep_alive: Option<bool>,
    transport: SharedTransport,
}

impl HttpRequest {
    pub fn new(method: &Method, path: &str, headers: &HeaderMap, transport: SharedTransport) -> Self {
        Self {
            method: method.as_str().to_string(),
            path: path.to_string(),
            keep_alive: keep_alive_from(headers),
            transport,
        }
    }
}

impl RequestContext for HttpRequest {
    fn method(&self) -> &str {
        &self.method
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn keep_alive(&self) -> Option<bool> {
        self.keep_alive
    }

    fn transport(&self) -> SharedTransport {
        self.transport.clone()
    }
}

/// `Connection: close` / `keep-alive`, else no preference.
fn keep_alive_from(headers: &HeaderMap) -> Option<bool> {
    let value = headers.get(CONNECTION)?.to_str().ok()?;
    value.split(',').map(str::trim).find_map(|token| {
        if token.eq_ignore_ascii_case("close") {
            Some(false)
        } else if token.eq_ignore_ascii_case("keep-alive") {
            Some(true)
        } else {
            None
        }
    })
}

/// Run `handler` against a fresh channel transport and translate its frames.
pub async fn dispatch<F, Fut>(
    method: &Method,
    path: &str,
    headers: &HeaderMap,
    buffer: usize,
    handler: F,
) -> HttpResponse
where
    F: FnOnce(Arc<dyn RequestContext>) -> Fut + Send + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    let (transport, mut rx) = ChannelTransport::channel(buffer);
    let request: Arc<dyn RequestContext> =
        Arc::new(HttpRequest::new(method, path, headers, Arc::new(transport)));

    tokio::spawn(async move {
        let result = handler(request.clone()).await;
        if let Err(e) = emit(result, request.clone()).await {
            warn!(
                method = request.method(),
                path = request.path(),
                error = %e,
                "response emission failed"
            );
        }
    });

    match rx.recv().await {
        Some(Message::Start { status, headers }) => into_http(status, headers, rx),
        Some(Message::Body { .. }) => {
            warn!(%path, "body frame arrived before start frame");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
        None => {
            warn!(%path, "handler finished without responding");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn into_http(status: u16, headers: Vec<(Bytes, Bytes)>, rx: mpsc::Receiver<Message>) -> HttpResponse {
    let mut response = HttpResponse::new(Body::from_stream(body_stream(rx)));
    *response.status_mut() = StatusCode::from_u16(status).unwrap_or_else(|_| {
        warn!(status, "invalid status code in start frame");
        StatusCode::INTERNAL_SERVER_ERROR
    });

    let out = response.headers_mut();
    for (name, value) in headers {
        match (HeaderName::from_bytes(&name), HeaderValue::from_bytes(&value)) {
            (Ok(name), Ok(value)) => {
                out.append(name, value);
            }
            _ => warn!(name = %String::from_utf8_lossy(&name), "dropping invalid header"),
        }
    }
    debug!(status, "response head forwarded");
    response
}

/// Body frames up to and including the one with `more_body = false`.
fn body_stream(
    rx: mpsc::Receiver<Message>,
) -> impl Stream<Item = Result<Bytes, BridgeError>> + Send + 'static {
    stream::unfold(Some(rx), |rx| async move {
        let mut rx = rx?;
        loop {
            match rx.recv().await {
                Some(Message::Body {
                    body,
                    more_body: true,
                }) => {
                    if !body.is_empty() {
                        return Some((Ok(body), Some(rx)));
                    }
                }
                Some(Message::Body {
                    body,
                    more_body: false,
                }) => {
                    if body.is_empty() {
                        return None;
                    }
                    return Some((Ok(body), None));
                }
                Some(Message::Start { .. }) => return Some((Err(BridgeError::DuplicateStart), None)),
                None => return Some((Err(BridgeError::Truncated), None)),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[test]
    fn keep_alive_tokens() {
        let mut headers = HeaderMap::new();
        assert_eq!(keep_alive_from(&headers), None);

        headers.insert(CONNECTION, HeaderValue::from_static("Keep-Alive"));
        assert_eq!(keep_alive_from(&headers), Some(true));

        headers.insert(CONNECTION, HeaderValue::from_static("upgrade, close"));
        assert_eq!(keep_alive_from(&headers), Some(false));
    }

    #[tokio::test]
    async fn body_stream_stops_at_final_frame() {
        let (transport, rx) = ChannelTransport::channel(8);
        transport.send(Message::body("a", true)).await.unwrap();
        transport.send(Message::body(Bytes::new(), true)).await.unwrap();
        transport.send(Message::body("b", false)).await.unwrap();
        transport.send(Message::body("ignored", true)).await.unwrap();

        let chunks: Vec<Bytes> = body_stream(rx).map(|c| c.unwrap()).collect().await;
        assert_eq!(chunks, vec![Bytes::from("a"), Bytes::from("b")]);
    }

    #[tokio::test]
    async fn dropped_sender_truncates_body() {
        let (transport, rx) = ChannelTransport::channel(8);
        transport.send(Message::body("partial", true)).await.unwrap();
        drop(transport);

        let items: Vec<_> = body_stream(rx).collect().await;
        assert_eq!(items.len(), 2);
        assert!(matches!(items[1], Err(BridgeError::Truncated)));
    }

    #[tokio::test]
    async fn send_after_receiver_dropped_fails() {
        let (transport, rx) = ChannelTransport::channel(1);
        drop(rx);
        assert!(matches!(
            transport.send(Message::body("x", false)).await,
            Err(ResponseError::Transport(_))
        ));
    }
}
