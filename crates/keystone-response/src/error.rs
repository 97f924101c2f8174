//! Error types for the response layer.

use thiserror::Error;

/// Result type alias for response operations.
pub type ResponseResult<T> = Result<T, ResponseError>;

/// Errors raised by the streaming core and response constructors.
///
/// None of these are retried inside this crate. State and argument
/// errors are fatal to the in-flight response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResponseError {
    /// `write`/`drain` before `prepare`, or after `write_eof`.
    #[error("protocol state error: {0}")]
    ProtocolState(&'static str),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An explicit status was given for a type that already fixes one.
    #[error("can not customize status code of {0}")]
    DuplicateStatusOverride(u16),

    #[error("HTTP redirects need a location to redirect to")]
    MissingLocation,

    #[error("not supported: {0}")]
    NotSupported(&'static str),

    /// The transport rejected a frame (peer gone, channel closed).
    #[error("transport error: {0}")]
    Transport(String),
}
