//! Unified error type.
//!
//! A middleware fails by returning `Err(Error)`. Most application failures
//! are [`HttpError`]s: they carry the status the client should see and
//! whether their message is safe to show. Everything else is an
//! infrastructure failure (I/O, hyper, a broken middleware chain).

use std::error::Error as StdError;
use std::net::AddrParseError;

use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};

/// The error type returned by strata's fallible operations and by middleware.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// An error with an HTTP status attached.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// A middleware invoked its continuation a second time.
    #[error("next() called multiple times")]
    NextCalledMultipleTimes,

    /// The response stream ended before the whole body was delivered.
    #[error("response aborted before it finished")]
    Aborted,

    #[error("invalid socket address: {0}")]
    AddrParse(#[from] AddrParseError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("hyper: {0}")]
    Hyper(#[from] hyper::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(Box<dyn StdError + Send + Sync>),
}

impl Error {
    /// Shorthand for an [`HttpError`] with a custom message.
    pub fn http(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Http(HttpError::new(status).with_message(message))
    }

    /// Wraps any error without an HTTP status.
    pub fn other(err: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self::Other(err.into())
    }

    /// The status carried by the error, if any.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Http(e) => Some(e.status()),
            _ => None,
        }
    }

    /// Whether the message is safe to send to the client.
    pub fn expose(&self) -> bool {
        matches!(self, Self::Http(e) if e.exposed())
    }

    /// Headers the error wants on the error response.
    pub(crate) fn headers(&self) -> Option<&HeaderMap> {
        match self {
            Self::Http(e) => Some(e.headers()),
            _ => None,
        }
    }
}

// ── HttpError ─────────────────────────────────────────────────────────────────

/// An error that maps onto an HTTP status.
///
/// ```rust
/// use http::StatusCode;
/// use strata::HttpError;
///
/// let err = HttpError::new(StatusCode::BAD_REQUEST).with_message("missing name");
/// assert!(err.exposed());
///
/// let err = HttpError::new(StatusCode::BAD_GATEWAY);
/// assert_eq!(err.message(), "Bad Gateway");
/// assert!(!err.exposed());
/// ```
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct HttpError {
    status: StatusCode,
    message: String,
    expose: bool,
    headers: HeaderMap,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl HttpError {
    /// Client errors (4xx) are exposed by default, everything else is not.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            message: status.canonical_reason().unwrap_or(status.as_str()).to_owned(),
            expose: status.is_client_error(),
            headers: HeaderMap::new(),
            source: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_expose(mut self, expose: bool) -> Self {
        self.expose = expose;
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_source(mut self, source: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn status(&self) -> StatusCode { self.status }
    pub fn message(&self) -> &str { &self.message }
    pub fn exposed(&self) -> bool { self.expose }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
}
