//! Fully materialized responses.
//!
//! A [`Response`] carries a status, a header set and a payload that is
//! already known when the handler returns. Status-specific behavior comes
//! from the [`Status`] table rather than a type per status:
//!
//! - [`Response::new`] is the generic response; an explicit status is allowed.
//! - [`Response::from_status`] fixes the status; passing one as well fails
//!   with [`ResponseError::DuplicateStatusOverride`].
//! - [`Response::redirect`], [`Response::method_not_allowed`] and
//!   [`Response::unavailable_for_legal_reasons`] build the statuses that
//!   need extra data.
//! - [`Response::error`] wraps a `(type, message)` pair under `"error"`.
//! - [`Response::raw`] holds literal bytes instead of a document.

use std::fmt;

use bytes::Bytes;
use serde_json::{Map, Value};

use crate::error::{ResponseError, ResponseResult};
use crate::header::HeaderMap;
use crate::status::{Status, StatusShape, check_status, is_empty_body_code};
use crate::transport::{Message, Transport};

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Serialized as UTF-8 JSON.
    Document(Value),
    /// Sent as-is.
    Raw(Bytes),
    Empty,
}

/// Data recorded by statuses that need more than a body.
#[derive(Debug, Clone, PartialEq)]
pub enum Detail {
    None,
    Redirect {
        location: String,
    },
    MethodNotAllowed {
        method: String,
        allowed_methods: Vec<String>,
    },
    LegalBlock {
        link: String,
    },
}

/// Optional constructor inputs shared by every response kind.
#[derive(Debug, Clone, Default)]
pub struct ResponseOptions {
    pub content: Option<Value>,
    pub headers: Option<HeaderMap>,
    pub status: Option<u16>,
}

impl ResponseOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content(mut self, content: impl Into<Value>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = Some(headers);
        self
    }

    pub fn status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

/// Structured cause attached to an error response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReason {
    pub name: String,
    pub details: Option<String>,
}

impl ErrorReason {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Inputs for [`Response::error`]. The status defaults to 500.
#[derive(Debug, Clone, Default)]
pub struct ErrorOptions {
    pub reason: Option<ErrorReason>,
    pub content: Option<Map<String, Value>>,
    pub headers: Option<HeaderMap>,
    pub status: Option<u16>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    status: u16,
    headers: HeaderMap,
    payload: Payload,
    detail: Detail,
}

fn empty_document() -> Value {
    Value::Object(Map::new())
}

fn error_document(
    mut content: Map<String, Value>,
    kind: &str,
    message: &str,
    reason: Option<ErrorReason>,
) -> Value {
    content.insert(
        "error".into(),
        serde_json::json!({ "type": kind, "message": message }),
    );
    if let Some(reason) = reason {
        content.insert("reason".into(), Value::String(reason.name));
        content.insert(
            "details".into(),
            reason.details.map(Value::String).unwrap_or(Value::Null),
        );
    }
    Value::Object(content)
}

impl Response {
    /// Generic response. Status defaults to 200.
    pub fn new(opts: ResponseOptions) -> ResponseResult<Self> {
        let status = match opts.status {
            Some(code) => check_status(code)?,
            None => Status::Ok.code(),
        };
        Ok(Self::build(status, opts.content, opts.headers))
    }

    /// Response whose status is fixed by `status`.
    pub fn from_status(status: Status, opts: ResponseOptions) -> ResponseResult<Self> {
        match status.shape() {
            StatusShape::Redirect => Err(ResponseError::MissingLocation),
            StatusShape::MethodNotAllowed => Err(ResponseError::InvalidArgument(
                "405 responses are built with Response::method_not_allowed".into(),
            )),
            StatusShape::LegalBlock => Err(ResponseError::InvalidArgument(
                "451 responses are built with Response::unavailable_for_legal_reasons".into(),
            )),
            StatusShape::Plain | StatusShape::EmptyBody => Self::fixed(status, opts),
        }
    }

    pub fn ok(content: impl Into<Value>) -> Self {
        Self::build(Status::Ok.code(), Some(content.into()), None)
    }

    pub fn created(content: impl Into<Value>) -> Self {
        Self::build(Status::Created.code(), Some(content.into()), None)
    }

    pub fn no_content() -> Self {
        Self::build(Status::NoContent.code(), None, None)
    }

    /// A `3xx` response pointing at `location`. Empty locations are rejected.
    pub fn redirect(status: Status, location: &str, opts: ResponseOptions) -> ResponseResult<Self> {
        if status.shape() != StatusShape::Redirect {
            return Err(ResponseError::InvalidArgument(format!(
                "{} is not a redirect status",
                status.code()
            )));
        }
        if location.is_empty() {
            return Err(ResponseError::MissingLocation);
        }
        let mut resp = Self::fixed(status, opts)?;
        resp.headers.insert("Location", location);
        resp.detail = Detail::Redirect {
            location: location.to_string(),
        };
        Ok(resp)
    }

    pub fn found(location: &str) -> ResponseResult<Self> {
        Self::redirect(Status::Found, location, ResponseOptions::default())
    }

    /// `405` with `Allow` set to the upper-cased, sorted allowed methods.
    pub fn method_not_allowed<S: AsRef<str>>(
        method: &str,
        allowed_methods: &[S],
        opts: ResponseOptions,
    ) -> ResponseResult<Self> {
        let mut allowed: Vec<String> = allowed_methods
            .iter()
            .map(|m| m.as_ref().to_ascii_uppercase())
            .collect();
        allowed.sort();

        let mut resp = Self::fixed(Status::MethodNotAllowed, opts)?;
        resp.headers.insert("Allow", allowed.join(","));
        resp.detail = Detail::MethodNotAllowed {
            method: method.to_ascii_uppercase(),
            allowed_methods: allowed,
        };
        Ok(resp)
    }

    pub fn unavailable_for_legal_reasons(link: &str, opts: ResponseOptions) -> ResponseResult<Self> {
        let mut resp = Self::fixed(Status::UnavailableForLegalReasons, opts)?;
        resp.headers
            .insert("Link", format!("<{link}>; rel=\"blocked-by\""));
        resp.detail = Detail::LegalBlock {
            link: link.to_string(),
        };
        Ok(resp)
    }

    /// Error body: `{"error": {"type", "message"}}` plus any caller content.
    ///
    /// A reason adds top-level `reason` and `details` fields.
    pub fn error(kind: &str, message: &str, opts: ErrorOptions) -> ResponseResult<Self> {
        let content = error_document(opts.content.unwrap_or_default(), kind, message, opts.reason);
        Self::new(ResponseOptions {
            content: Some(content),
            headers: opts.headers,
            status: Some(opts.status.unwrap_or(Status::InternalServerError.code())),
        })
    }

    /// [`error`](Self::error) for a status from the table, which cannot fail.
    pub fn error_status(status: Status, kind: &str, message: &str) -> Self {
        let content = error_document(Map::new(), kind, message, None);
        Self::build(status.code(), Some(content), None)
    }

    /// Literal-bytes response. Status defaults to 200.
    pub fn raw(
        content: impl Into<Bytes>,
        headers: Option<HeaderMap>,
        status: Option<u16>,
    ) -> ResponseResult<Self> {
        let status = match status {
            Some(code) => check_status(code)?,
            None => Status::Ok.code(),
        };
        let payload = if is_empty_body_code(status) {
            Payload::Empty
        } else {
            Payload::Raw(content.into())
        };
        Ok(Self {
            status,
            headers: headers.unwrap_or_default(),
            payload,
            detail: Detail::None,
        })
    }

    fn fixed(status: Status, opts: ResponseOptions) -> ResponseResult<Self> {
        if opts.status.is_some() {
            return Err(ResponseError::DuplicateStatusOverride(status.code()));
        }
        Ok(Self::build(status.code(), opts.content, opts.headers))
    }

    fn build(status: u16, content: Option<Value>, headers: Option<HeaderMap>) -> Self {
        let payload = if is_empty_body_code(status) {
            Payload::Empty
        } else {
            Payload::Document(content.unwrap_or_else(empty_document))
        };
        Self {
            status,
            headers: headers.unwrap_or_default(),
            payload,
            detail: Detail::None,
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// The structured document, if this response carries one.
    pub fn content(&self) -> Option<&Value> {
        match &self.payload {
            Payload::Document(value) => Some(value),
            _ => None,
        }
    }

    pub fn detail(&self) -> &Detail {
        &self.detail
    }

    pub fn location(&self) -> Option<&str> {
        match &self.detail {
            Detail::Redirect { location } => Some(location),
            _ => None,
        }
    }

    /// Encoded body bytes.
    pub fn body(&self) -> ResponseResult<Bytes> {
        match &self.payload {
            Payload::Document(value) => serde_json::to_vec(value)
                .map(Bytes::from)
                .map_err(|e| ResponseError::InvalidArgument(e.to_string())),
            Payload::Raw(bytes) => Ok(bytes.clone()),
            Payload::Empty => Ok(Bytes::new()),
        }
    }

    fn default_content_type(&self) -> Option<&'static str> {
        match self.payload {
            Payload::Document(_) => Some("application/json"),
            Payload::Raw(_) => Some("application/octet-stream"),
            Payload::Empty => None,
        }
    }

    /// Emit as one start frame followed by one final body frame.
    pub async fn send(&self, transport: &dyn Transport) -> ResponseResult<()> {
        let body = self.body()?;
        let mut headers = self.headers.clone();
        if let Some(content_type) = self.default_content_type() {
            headers.set_default("Content-Type", content_type);
            headers.set_default("Content-Length", body.len().to_string());
        }

        transport
            .send(Message::start(self.status, headers.to_wire()))
            .await?;
        transport.send(Message::body(body, false)).await
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Response {}>", self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn generic_defaults_to_200_with_empty_document() {
        let resp = Response::new(ResponseOptions::new()).unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.content(), Some(&json!({})));
        assert_eq!(resp.body().unwrap(), Bytes::from("{}"));
        assert_eq!(resp.to_string(), "<Response 200>");
    }

    #[test]
    fn generic_accepts_explicit_status() {
        let resp = Response::new(ResponseOptions::new().status(418).content(json!({"a": 1}))).unwrap();
        assert_eq!(resp.status(), 418);
        assert_eq!(resp.body().unwrap(), Bytes::from(r#"{"a":1}"#));
    }

    #[test]
    fn explicit_empty_body_status_drops_content() {
        for code in [204, 205] {
            let resp =
                Response::new(ResponseOptions::new().status(code).content(json!({"x": 1}))).unwrap();
            assert_eq!(resp.payload(), &Payload::Empty);
            assert!(resp.body().unwrap().is_empty());
        }
    }

    #[test]
    fn fixed_status_drops_content_for_empty_statuses() {
        for status in [Status::NoContent, Status::ResetContent, Status::NotModified] {
            let resp =
                Response::from_status(status, ResponseOptions::new().content(json!([1, 2]))).unwrap();
            assert_eq!(resp.content(), None);
        }
    }

    #[test]
    fn fixed_status_rejects_override() {
        let err = Response::from_status(Status::NotFound, ResponseOptions::new().status(410))
            .unwrap_err();
        assert_eq!(err, ResponseError::DuplicateStatusOverride(404));

        let err = Response::redirect(Status::Found, "/x", ResponseOptions::new().status(301))
            .unwrap_err();
        assert_eq!(err, ResponseError::DuplicateStatusOverride(302));

        let err = Response::method_not_allowed("post", &["GET"], ResponseOptions::new().status(400))
            .unwrap_err();
        assert_eq!(err, ResponseError::DuplicateStatusOverride(405));

        let err = Response::unavailable_for_legal_reasons(
            "https://example.org/notice",
            ResponseOptions::new().status(403),
        )
        .unwrap_err();
        assert_eq!(err, ResponseError::DuplicateStatusOverride(451));
    }

    #[test]
    fn redirect_requires_location() {
        assert_eq!(
            Response::found("").unwrap_err(),
            ResponseError::MissingLocation
        );
        assert_eq!(
            Response::from_status(Status::SeeOther, ResponseOptions::new()).unwrap_err(),
            ResponseError::MissingLocation
        );
    }

    #[test]
    fn redirect_sets_location() {
        let resp = Response::redirect(
            Status::TemporaryRedirect,
            "/db/new-home",
            ResponseOptions::new(),
        )
        .unwrap();
        assert_eq!(resp.status(), 307);
        assert_eq!(resp.headers().get("location"), Some("/db/new-home"));
        assert_eq!(resp.location(), Some("/db/new-home"));
    }

    #[test]
    fn redirect_rejects_non_redirect_status() {
        assert!(matches!(
            Response::redirect(Status::Ok, "/x", ResponseOptions::new()),
            Err(ResponseError::InvalidArgument(_))
        ));
    }

    #[test]
    fn method_not_allowed_normalizes_allow() {
        let resp =
            Response::method_not_allowed("patch", &["get", "post", "PUT"], ResponseOptions::new())
                .unwrap();
        assert_eq!(resp.status(), 405);
        assert_eq!(resp.headers().get("Allow"), Some("GET,POST,PUT"));
        assert_eq!(
            resp.detail(),
            &Detail::MethodNotAllowed {
                method: "PATCH".into(),
                allowed_methods: vec!["GET".into(), "POST".into(), "PUT".into()],
            }
        );
    }

    #[test]
    fn legal_block_sets_link() {
        let resp =
            Response::unavailable_for_legal_reasons("https://example.org/notice", ResponseOptions::new())
                .unwrap();
        assert_eq!(resp.status(), 451);
        assert_eq!(
            resp.headers().get("link"),
            Some("<https://example.org/notice>; rel=\"blocked-by\"")
        );
    }

    #[test]
    fn error_response_wraps_type_and_message() {
        let resp = Response::error("NotFound", "no such key", ErrorOptions::default()).unwrap();
        assert_eq!(resp.status(), 500);
        assert_eq!(
            resp.content(),
            Some(&json!({"error": {"type": "NotFound", "message": "no such key"}}))
        );
    }

    #[test]
    fn error_response_merges_reason_and_content() {
        let mut extra = Map::new();
        extra.insert("path".into(), json!("/db/x"));
        let resp = Response::error(
            "Unauthorized",
            "login required",
            ErrorOptions {
                reason: Some(ErrorReason::new("missingCredentials").with_details("no token")),
                content: Some(extra),
                status: Some(401),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(resp.status(), 401);
        let content = resp.content().unwrap();
        assert_eq!(content["path"], json!("/db/x"));
        assert_eq!(content["reason"], json!("missingCredentials"));
        assert_eq!(content["details"], json!("no token"));
        assert_eq!(content["error"]["type"], json!("Unauthorized"));
    }

    #[test]
    fn error_status_uses_table_code() {
        let resp = Response::error_status(Status::NotFound, "NotFound", "db/missing");
        assert_eq!(resp.status(), 404);
        assert_eq!(resp.content().unwrap()["error"]["message"], json!("db/missing"));
    }

    #[test]
    fn raw_response_keeps_bytes() {
        let resp = Response::raw(Bytes::from_static(b"\x00\x01binary"), None, None).unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.body().unwrap(), Bytes::from_static(b"\x00\x01binary"));

        let empty = Response::raw(Bytes::new(), None, Some(201)).unwrap();
        assert_eq!(empty.payload(), &Payload::Raw(Bytes::new()));
    }

    #[test]
    fn raw_response_empty_status_has_no_body() {
        let resp = Response::raw("ignored", None, Some(204)).unwrap();
        assert_eq!(resp.payload(), &Payload::Empty);
        assert!(resp.body().unwrap().is_empty());
    }
}
