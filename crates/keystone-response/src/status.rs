//! Well-known HTTP statuses and their response defaults.
//!
//! One row per status: code, reason phrase, class, and the shape of the
//! response it builds (plain, empty body, redirect, 405, 451).

use crate::error::{ResponseError, ResponseResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Successful,
    Redirection,
    ClientError,
    ServerError,
}

/// Construction requirements a status imposes on a [`Response`](crate::Response).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusShape {
    Plain,
    /// Body is always absent.
    EmptyBody,
    /// Needs a location; sets `Location`.
    Redirect,
    /// Needs the offending method and the allowed list; sets `Allow`.
    MethodNotAllowed,
    /// Needs a link; sets `Link`.
    LegalBlock,
}

macro_rules! status_table {
    ($( $variant:ident = $code:literal, $reason:literal, $class:ident, $shape:ident; )*) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Status {
            $( $variant, )*
        }

        impl Status {
            pub const ALL: &'static [Status] = &[ $( Status::$variant, )* ];

            pub fn code(self) -> u16 {
                match self {
                    $( Status::$variant => $code, )*
                }
            }

            pub fn reason(self) -> &'static str {
                match self {
                    $( Status::$variant => $reason, )*
                }
            }

            pub fn class(self) -> StatusClass {
                match self {
                    $( Status::$variant => StatusClass::$class, )*
                }
            }

            pub fn shape(self) -> StatusShape {
                match self {
                    $( Status::$variant => StatusShape::$shape, )*
                }
            }

            pub fn from_code(code: u16) -> Option<Status> {
                match code {
                    $( $code => Some(Status::$variant), )*
                    _ => None,
                }
            }
        }
    };
}

status_table! {
    Ok = 200, "OK", Successful, Plain;
    Created = 201, "Created", Successful, Plain;
    Accepted = 202, "Accepted", Successful, Plain;
    NonAuthoritativeInformation = 203, "Non-Authoritative Information", Successful, Plain;
    NoContent = 204, "No Content", Successful, EmptyBody;
    ResetContent = 205, "Reset Content", Successful, EmptyBody;
    PartialContent = 206, "Partial Content", Successful, Plain;

    MultipleChoices = 300, "Multiple Choices", Redirection, Redirect;
    MovedPermanently = 301, "Moved Permanently", Redirection, Redirect;
    Found = 302, "Found", Redirection, Redirect;
    SeeOther = 303, "See Other", Redirection, Redirect;
    NotModified = 304, "Not Modified", Redirection, EmptyBody;
    UseProxy = 305, "Use Proxy", Redirection, Redirect;
    TemporaryRedirect = 307, "Temporary Redirect", Redirection, Redirect;
    PermanentRedirect = 308, "Permanent Redirect", Redirection, Redirect;

    BadRequest = 400, "Bad Request", ClientError, Plain;
    Unauthorized = 401, "Unauthorized", ClientError, Plain;
    PaymentRequired = 402, "Payment Required", ClientError, Plain;
    Forbidden = 403, "Forbidden", ClientError, Plain;
    NotFound = 404, "Not Found", ClientError, Plain;
    MethodNotAllowed = 405, "Method Not Allowed", ClientError, MethodNotAllowed;
    NotAcceptable = 406, "Not Acceptable", ClientError, Plain;
    ProxyAuthenticationRequired = 407, "Proxy Authentication Required", ClientError, Plain;
    RequestTimeout = 408, "Request Timeout", ClientError, Plain;
    Conflict = 409, "Conflict", ClientError, Plain;
    Gone = 410, "Gone", ClientError, Plain;
    LengthRequired = 411, "Length Required", ClientError, Plain;
    PreconditionFailed = 412, "Precondition Failed", ClientError, Plain;
    RequestEntityTooLarge = 413, "Request Entity Too Large", ClientError, Plain;
    RequestUriTooLong = 414, "Request-URI Too Long", ClientError, Plain;
    UnsupportedMediaType = 415, "Unsupported Media Type", ClientError, Plain;
    RequestRangeNotSatisfiable = 416, "Requested Range Not Satisfiable", ClientError, Plain;
    ExpectationFailed = 417, "Expectation Failed", ClientError, Plain;
    MisdirectedRequest = 421, "Misdirected Request", ClientError, Plain;
    UnprocessableEntity = 422, "Unprocessable Entity", ClientError, Plain;
    FailedDependency = 424, "Failed Dependency", ClientError, Plain;
    UpgradeRequired = 426, "Upgrade Required", ClientError, Plain;
    PreconditionRequired = 428, "Precondition Required", ClientError, Plain;
    TooManyRequests = 429, "Too Many Requests", ClientError, Plain;
    RequestHeaderFieldsTooLarge = 431, "Request Header Fields Too Large", ClientError, Plain;
    UnavailableForLegalReasons = 451, "Unavailable For Legal Reasons", ClientError, LegalBlock;

    InternalServerError = 500, "Internal Server Error", ServerError, Plain;
    NotImplemented = 501, "Not Implemented", ServerError, Plain;
    BadGateway = 502, "Bad Gateway", ServerError, Plain;
    ServiceUnavailable = 503, "Service Unavailable", ServerError, Plain;
    GatewayTimeout = 504, "Gateway Timeout", ServerError, Plain;
    VersionNotSupported = 505, "HTTP Version Not Supported", ServerError, Plain;
    VariantAlsoNegotiates = 506, "Variant Also Negotiates", ServerError, Plain;
    InsufficientStorage = 507, "Insufficient Storage", ServerError, Plain;
    NotExtended = 510, "Not Extended", ServerError, Plain;
    NetworkAuthenticationRequired = 511, "Network Authentication Required", ServerError, Plain;
}

impl Status {
    pub fn empty_body(self) -> bool {
        self.shape() == StatusShape::EmptyBody
    }

    pub fn is_error(self) -> bool {
        matches!(self.class(), StatusClass::ClientError | StatusClass::ServerError)
    }
}

/// `true` for statuses whose body must be absent, known or not.
pub fn is_empty_body_code(code: u16) -> bool {
    Status::from_code(code).is_some_and(Status::empty_body)
}

pub(crate) fn check_status(code: u16) -> ResponseResult<u16> {
    if (100..=599).contains(&code) {
        Ok(code)
    } else {
        Err(ResponseError::InvalidArgument(format!(
            "status code {code} is outside 100..=599"
        )))
    }
}
