//! HTTP handlers.
//!
//! Each axum handler hands its work to [`bridge::dispatch`]; the work
//! itself is a plain async function returning a [`HandlerResult`], where
//! `Err` carries the error response to send.

use std::fmt::Display;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, Method, Uri};
use axum::response::Response as HttpResponse;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use keystone_db::{ApplicationRoot, DbError, DbResult};
use keystone_response::{
    HandlerResult, RequestContext, Response, ResponseOptions, Status, StreamingResponse,
};
use serde_json::{Value, json};
use tracing::{error, warn};

use crate::AppState;
use crate::bridge;

pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

const READ_ONLY: &[&str] = &["GET"];
const OBJECT_METHODS: &[&str] = &["GET", "PUT", "DELETE"];

// ── Error responses ────────────────────────────────────────────

fn internal_error(e: impl Display) -> Response {
    error!(error = %e, "request failed");
    Response::error_status(Status::InternalServerError, "ServerError", &e.to_string())
}

fn db_error(e: DbError) -> Response {
    match e {
        DbError::NotFound(name) => Response::error_status(Status::NotFound, "NotFound", &name),
        other => internal_error(other),
    }
}

fn not_allowed(method: &Method, allowed: &[&str]) -> Response {
    Response::method_not_allowed(method.as_str(), allowed, ResponseOptions::default())
        .unwrap_or_else(internal_error)
}

// ── Handler bodies ─────────────────────────────────────────────

pub async fn list_databases(root: &ApplicationRoot, method: &Method) -> HandlerResult {
    if method != Method::GET {
        return Err(not_allowed(method, READ_ONLY));
    }
    Ok(Response::ok(json!({ "databases": root.names() })).into())
}

pub async fn database_info(root: &ApplicationRoot, method: &Method, name: &str) -> HandlerResult {
    if method != Method::GET {
        return Err(not_allowed(method, READ_ONLY));
    }
    let db = root.async_get(name).await.map_err(db_error)?;
    let length = db.async_len().await.map_err(db_error)?;
    Ok(Response::ok(json!({ "id": db.id(), "length": length })).into())
}

/// Stream every object of `name` as one JSON line per entry.
///
/// Once the start frame is out the status can no longer change; a read
/// failure is reported as a trailing `{"error": ...}` line instead.
pub async fn stream_items(
    root: &ApplicationRoot,
    method: &Method,
    name: &str,
    request: Arc<dyn RequestContext>,
) -> HandlerResult {
    if method != Method::GET {
        return Err(not_allowed(method, READ_ONLY));
    }
    let db = root.async_get(name).await.map_err(db_error)?;
    let items = db.async_items().await.map_err(db_error)?;

    let mut resp = StreamingResponse::new(Status::Ok.code()).map_err(internal_error)?;
    resp.set_content_type(NDJSON_CONTENT_TYPE);
    resp.prepare(request).await.map_err(internal_error)?;

    write_items(&mut resp, items, name).await;

    if let Err(e) = resp.write_eof(Bytes::new()).await {
        warn!(database = %name, error = %e, "failed to close item stream");
    }
    Ok(resp.into())
}

async fn write_items<S>(resp: &mut StreamingResponse, items: S, name: &str)
where
    S: Stream<Item = DbResult<(String, Value)>>,
{
    let mut items = std::pin::pin!(items);
    while let Some(item) = items.next().await {
        let line = match item {
            Ok((key, value)) => json!({ "key": key, "value": value }),
            Err(e) => {
                error!(database = %name, error = %e, "item stream failed");
                json!({ "error": { "type": "ServerError", "message": e.to_string() } })
            }
        };
        let failed = line.get("error").is_some();
        let mut line = line.to_string();
        line.push('\n');
        if let Err(e) = resp.write(line).await {
            warn!(database = %name, error = %e, "item stream aborted");
            return;
        }
        if failed {
            return;
        }
    }
}

pub async fn object(
    root: &ApplicationRoot,
    method: &Method,
    name: &str,
    key: &str,
    body: Bytes,
) -> HandlerResult {
    let db = root.async_get(name).await.map_err(db_error)?;

    match *method {
        Method::GET => {
            let value = db
                .async_get(key)
                .await
                .map_err(db_error)?
                .ok_or_else(|| db_error(DbError::NotFound(format!("{name}/{key}"))))?;
            Ok(Response::ok(value).into())
        }
        Method::PUT => {
            let value: Value = serde_json::from_slice(&body).map_err(|e| {
                Response::error_status(Status::BadRequest, "DeserializationError", &e.to_string())
            })?;
            let existed = db.async_contains(key).await.map_err(db_error)?;
            db.async_set(key, value).await.map_err(db_error)?;
            let resp = if existed {
                Response::ok(json!({ "id": key }))
            } else {
                Response::created(json!({ "id": key }))
            };
            Ok(resp.into())
        }
        Method::DELETE => {
            db.async_del(key).await.map_err(|e| match e {
                DbError::NotFound(_) => db_error(DbError::NotFound(format!("{name}/{key}"))),
                other => db_error(other),
            })?;
            Ok(Response::no_content().into())
        }
        _ => Err(not_allowed(method, OBJECT_METHODS)),
    }
}

// ── axum entry points ──────────────────────────────────────────

/// `/`
pub async fn root(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> HttpResponse {
    let app = state.root.clone();
    let m = method.clone();
    bridge::dispatch(&method, uri.path(), &headers, state.stream_buffer, move |_| async move {
        list_databases(&app, &m).await
    })
    .await
}

/// `/{db}`
pub async fn database(
    State(state): State<AppState>,
    Path(name): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> HttpResponse {
    let app = state.root.clone();
    let m = method.clone();
    bridge::dispatch(&method, uri.path(), &headers, state.stream_buffer, move |_| async move {
        database_info(&app, &m, &name).await
    })
    .await
}

/// `/{db}/@items`
pub async fn items(
    State(state): State<AppState>,
    Path(name): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> HttpResponse {
    let app = state.root.clone();
    let m = method.clone();
    bridge::dispatch(&method, uri.path(), &headers, state.stream_buffer, move |request| async move {
        stream_items(&app, &m, &name, request).await
    })
    .await
}

/// `/{db}/{key}`
pub async fn object_entry(
    State(state): State<AppState>,
    Path((name, key)): Path<(String, String)>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> HttpResponse {
    let app = state.root.clone();
    let m = method.clone();
    bridge::dispatch(&method, uri.path(), &headers, state.stream_buffer, move |_| async move {
        object(&app, &m, &name, &key, body).await
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use keystone_db::{Database, ObjectStore};
    use keystone_response::{Message, Reply};

    fn test_root() -> ApplicationRoot {
        let root = ApplicationRoot::new(None);
        root.set_item("db", Database::new("db", ObjectStore::open_in_memory().unwrap()));
        root
    }

    fn full(result: HandlerResult) -> Response {
        match result {
            Ok(Reply::Full(resp)) | Err(resp) => resp,
            Ok(Reply::Streamed(_)) => panic!("expected a full response"),
        }
    }

    #[tokio::test]
    async fn list_and_info() {
        let root = test_root();
        let resp = full(list_databases(&root, &Method::GET).await);
        assert_eq!(resp.content(), Some(&json!({"databases": ["db"]})));

        let resp = full(database_info(&root, &Method::GET, "db").await);
        assert_eq!(resp.content(), Some(&json!({"id": "db", "length": 0})));
    }

    #[tokio::test]
    async fn unknown_database_is_404() {
        let root = test_root();
        let resp = full(database_info(&root, &Method::GET, "nope").await);
        assert_eq!(resp.status(), 404);
        assert_eq!(resp.content().unwrap()["error"]["type"], json!("NotFound"));
    }

    #[tokio::test]
    async fn put_then_replace() {
        let root = test_root();
        let resp = full(object(&root, &Method::PUT, "db", "k", Bytes::from_static(b"{\"a\":1}")).await);
        assert_eq!(resp.status(), 201);
        let resp = full(object(&root, &Method::PUT, "db", "k", Bytes::from_static(b"2")).await);
        assert_eq!(resp.status(), 200);

        let resp = full(object(&root, &Method::GET, "db", "k", Bytes::new()).await);
        assert_eq!(resp.content(), Some(&json!(2)));
    }

    #[tokio::test]
    async fn bad_json_is_400() {
        let root = test_root();
        let resp = full(object(&root, &Method::PUT, "db", "k", Bytes::from_static(b"{oops")).await);
        assert_eq!(resp.status(), 400);
    }

    #[tokio::test]
    async fn delete_missing_is_404() {
        let root = test_root();
        let resp = full(object(&root, &Method::DELETE, "db", "k", Bytes::new()).await);
        assert_eq!(resp.status(), 404);
        assert_eq!(resp.content().unwrap()["error"]["message"], json!("db/k"));
    }

    #[tokio::test]
    async fn failed_read_ends_stream_with_error_line() {
        let (transport, mut rx) = bridge::ChannelTransport::channel(16);
        let request: Arc<dyn RequestContext> = Arc::new(bridge::HttpRequest::new(
            &Method::GET,
            "/db/@items",
            &HeaderMap::new(),
            Arc::new(transport),
        ));
        let mut resp = StreamingResponse::new(200).unwrap();
        resp.prepare(request).await.unwrap();

        let items = futures_util::stream::iter(vec![
            Ok(("a".to_string(), json!(1))),
            Err(DbError::Read("disk unplugged".into())),
            Ok(("b".to_string(), json!(2))),
        ]);
        write_items(&mut resp, items, "db").await;
        resp.write_eof(Bytes::new()).await.unwrap();
        drop(resp);

        let mut lines = Vec::new();
        while let Some(message) = rx.recv().await {
            if let Message::Body { body, .. } = message {
                if !body.is_empty() {
                    lines.push(serde_json::from_slice::<Value>(&body).unwrap());
                }
            }
        }
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], json!({"key": "a", "value": 1}));
        assert_eq!(lines[1]["error"]["type"], json!("ServerError"));
        assert_eq!(lines[1]["error"]["message"], json!("read error: disk unplugged"));
    }

    #[tokio::test]
    async fn unsupported_method_lists_allowed() {
        let root = test_root();
        let resp = full(object(&root, &Method::POST, "db", "k", Bytes::new()).await);
        assert_eq!(resp.status(), 405);
        assert_eq!(resp.headers().get("allow"), Some("DELETE,GET,PUT"));

        let resp = full(list_databases(&root, &Method::DELETE).await);
        assert_eq!(resp.headers().get("Allow"), Some("GET"));
    }
}
