//! Error taxonomy for the framework.
//!
//! # Responsibilities
//! - Define the fatal route-compilation errors (startup only)
//! - Define per-request error kinds and their HTTP status mapping
//! - Define connection-terminating error kinds
//!
//! Every per-request kind is recovered at the pipeline boundary and turned
//! into an HTTP response; only `CompileError` and socket bind failures are
//! allowed to take the process down.

use http::StatusCode;
use thiserror::Error;

/// Fatal errors from route compilation. These prevent the server from
/// starting and are never produced once traffic is flowing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// A path pattern could not be parsed.
    #[error("invalid route pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Two declarations share a method and a normalized pattern.
    #[error("duplicate route: {method} {pattern:?} declared twice")]
    DuplicateRoute { method: String, pattern: String },

    /// Two patterns can match the same concrete paths with no precedence
    /// winner (they differ only in parameter names).
    #[error("ambiguous routes: {method} {first:?} and {second:?} match the same paths")]
    AmbiguousRoute {
        method: String,
        first: String,
        second: String,
    },
}

/// Errors while parsing a request off the wire.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The request line or a header could not be parsed. Framing is no
    /// longer trustworthy; the connection must close after responding.
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// Declared or accumulated body size exceeds the configured limit.
    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    /// Request target longer than the configured limit.
    #[error("request URI exceeds {limit} bytes")]
    UriTooLong { limit: usize },

    /// Header block larger than the configured limit.
    #[error("request headers exceed {limit} bytes")]
    HeadersTooLarge { limit: usize },
}

impl ParseError {
    pub fn status(&self) -> StatusCode {
        match self {
            ParseError::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            ParseError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ParseError::UriTooLong { .. } => StatusCode::URI_TOO_LONG,
            ParseError::HeadersTooLarge { .. } => {
                StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE
            }
        }
    }

    /// Label for the error counter.
    pub fn kind(&self) -> &'static str {
        match self {
            ParseError::MalformedRequest(_) => "malformed_request",
            ParseError::PayloadTooLarge { .. } => "payload_too_large",
            ParseError::UriTooLong { .. } => "uri_too_long",
            ParseError::HeadersTooLarge { .. } => "headers_too_large",
        }
    }
}

/// A declared parameter could not be bound to the handler's signature.
/// Always a 400; the connection stays open.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BindingError {
    #[error("missing required {origin} parameter {name:?}")]
    Missing { origin: &'static str, name: String },

    #[error("{origin} parameter {name:?} has invalid value {value:?}: {reason}")]
    Invalid {
        origin: &'static str,
        name: String,
        value: String,
        reason: String,
    },

    #[error("request body could not be decoded: {0}")]
    Body(String),

    #[error("unsupported content type {0:?} for body parameter")]
    UnsupportedContentType(String),
}

impl BindingError {
    pub fn status(&self) -> StatusCode {
        match self {
            BindingError::UnsupportedContentType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

/// A fault inside a handler invocation, isolated to one exchange.
#[derive(Debug, Error)]
pub enum HandlerFault {
    /// The handler panicked; the panic is caught at the task boundary.
    #[error("handler panicked")]
    Panicked,

    /// The handler returned an error with no declared mapping.
    #[error("handler failed: {0}")]
    Failed(String),

    /// Cooperative timeout expired; the eventual result is discarded.
    #[error("handler timed out after {0} seconds")]
    Timeout(u64),

    /// The return value could not be encoded by the codec.
    #[error("response encoding failed: {0}")]
    EncodeFailed(String),
}

impl HandlerFault {
    pub fn status(&self) -> StatusCode {
        match self {
            HandlerFault::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            HandlerFault::Panicked => "handler_panic",
            HandlerFault::Failed(_) => "handler_error",
            HandlerFault::Timeout(_) => "handler_timeout",
            HandlerFault::EncodeFailed(_) => "encode_failed",
        }
    }
}

/// Errors that terminate a connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// No bytes and no in-flight exchange within the idle window.
    #[error("idle timeout")]
    IdleTimeout,

    /// The peer (or shutdown) closed the connection; pending exchanges not
    /// yet past invocation are aborted.
    #[error("connection closed")]
    Closed,
}

impl ConnectionError {
    pub fn kind(&self) -> &'static str {
        match self {
            ConnectionError::Io(_) => "io",
            ConnectionError::IdleTimeout => "idle_timeout",
            ConnectionError::Closed => "connection_closed",
        }
    }
}

/// Fatal startup errors for the process boundary.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Compile(#[from] CompileError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_statuses() {
        assert_eq!(
            ParseError::MalformedRequest("bad".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ParseError::PayloadTooLarge { limit: 1 }.status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            ParseError::UriTooLong { limit: 1 }.status(),
            StatusCode::URI_TOO_LONG
        );
    }

    #[test]
    fn handler_fault_statuses() {
        assert_eq!(HandlerFault::Panicked.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(HandlerFault::Timeout(5).status(), StatusCode::GATEWAY_TIMEOUT);
    }
}
