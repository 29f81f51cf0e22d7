//! The raw request/response pair a context is built on.
//!
//! [`ServerRequest`] and [`ServerResponse`] are the transport objects: they
//! know nothing about middleware. A response is written exactly once, via
//! [`ServerResponse::end`] or [`ServerResponse::pipe`], and then handed to
//! hyper as a [`ResponseBody`] that reports when it finished.

use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};

use bytes::Bytes;
use futures::Stream;
use http::{HeaderMap, Method, StatusCode, Version};
use http_body_util::BodyExt;
use http_body_util::combinators::UnsyncBoxBody;
use hyper::body::{Body as HttpBody, Frame, SizeHint};
use hyper::ext::ReasonPhrase;
use tracing::{debug, warn};

use crate::body::BodyStream;
use crate::error::Error;

/// Type-erased incoming request body.
pub type RequestBody = UnsyncBoxBody<Bytes, Error>;

/// One-shot callback fired when the response stream ends.
///
/// Receives `None` on a clean finish and the failure otherwise.
pub type FinishListener = Box<dyn FnOnce(Option<Error>) + Send + 'static>;

// ── ServerRequest ─────────────────────────────────────────────────────────────

/// An incoming request as the transport delivered it.
pub struct ServerRequest {
    pub(crate) method: Method,
    pub(crate) url: String,
    pub(crate) authority: Option<String>,
    pub(crate) version: Version,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Option<RequestBody>,
    pub(crate) remote_addr: Option<SocketAddr>,
}

impl ServerRequest {
    /// Adapts any `http::Request` whose body yields [`Bytes`].
    ///
    /// ```rust
    /// use strata::ServerRequest;
    ///
    /// let req = ServerRequest::from_http(
    ///     http::Request::get("/users?page=2").body(http_body_util::Empty::<bytes::Bytes>::new()).unwrap(),
    /// );
    /// assert_eq!(req.url(), "/users?page=2");
    /// ```
    pub fn from_http<B>(req: http::Request<B>) -> Self
    where
        B: HttpBody<Data = Bytes> + Send + 'static,
        B::Error: Into<Box<dyn StdError + Send + Sync>>,
    {
        let (parts, body) = req.into_parts();
        let url = parts
            .uri
            .path_and_query()
            .map_or_else(|| "/".to_owned(), |pq| pq.as_str().to_owned());
        let authority = parts.uri.authority().map(|a| a.as_str().to_owned());

        Self {
            method: parts.method,
            url,
            authority,
            version: parts.version,
            headers: parts.headers,
            body: Some(body.map_err(|e| Error::Other(e.into())).boxed_unsync()),
            remote_addr: None,
        }
    }

    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn url(&self) -> &str { &self.url }
    pub fn version(&self) -> Version { self.version }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn remote_addr(&self) -> Option<SocketAddr> { self.remote_addr }

    /// Takes the body; `None` once it has been taken.
    pub fn take_body(&mut self) -> Option<RequestBody> {
        self.body.take()
    }
}

impl fmt::Debug for ServerRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("version", &self.version)
            .field("remote_addr", &self.remote_addr)
            .finish_non_exhaustive()
    }
}

// ── ServerResponse ────────────────────────────────────────────────────────────

/// What has been written to a response.
pub enum Outgoing {
    Empty,
    Full(Bytes),
    Stream(BodyStream),
}

/// The transport response: status line, headers and, once ended, the body.
pub struct ServerResponse {
    status: StatusCode,
    message: Option<String>,
    headers: HeaderMap,
    flushed: bool,
    outgoing: Option<Outgoing>,
    listeners: Vec<FinishListener>,
}

impl ServerResponse {
    /// A fresh `200 OK` response with no headers.
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            message: None,
            headers: HeaderMap::new(),
            flushed: false,
            outgoing: None,
            listeners: Vec::new(),
        }
    }

    pub fn status(&self) -> StatusCode { self.status }
    pub fn set_status(&mut self, status: StatusCode) { self.status = status; }

    /// Custom status message, if one was set.
    pub fn message(&self) -> Option<&str> { self.message.as_deref() }
    pub fn set_message(&mut self, message: Option<String>) { self.message = message; }

    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn headers_mut(&mut self) -> &mut HeaderMap { &mut self.headers }

    /// Marks the status line and headers as sent.
    pub fn flush_headers(&mut self) {
        self.flushed = true;
    }

    pub fn headers_sent(&self) -> bool {
        self.flushed || self.outgoing.is_some()
    }

    pub fn is_ended(&self) -> bool {
        self.outgoing.is_some()
    }

    pub fn is_writable(&self) -> bool {
        !self.is_ended()
    }

    /// Ends the response with a complete body. Ignored once ended.
    pub fn end(&mut self, chunk: impl Into<Bytes>) {
        self.finish_with(Outgoing::Full(chunk.into()));
    }

    /// Ends the response without body bytes. Ignored once ended.
    pub fn end_empty(&mut self) {
        self.finish_with(Outgoing::Empty);
    }

    /// Streams `stream` to the client as it produces chunks.
    pub fn pipe(&mut self, stream: BodyStream) {
        self.finish_with(Outgoing::Stream(stream));
    }

    /// What was written, once the response has ended.
    pub fn outgoing(&self) -> Option<&Outgoing> {
        self.outgoing.as_ref()
    }

    /// Registers a one-shot listener for the end of the response stream.
    pub fn on_finished(&mut self, listener: impl FnOnce(Option<Error>) + Send + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Converts into an `http::Response` ready for hyper.
    pub fn into_http(self) -> http::Response<ResponseBody> {
        let outgoing = self.outgoing.unwrap_or_else(|| {
            warn!(status = %self.status, "response was never ended, sending it without a body");
            Outgoing::Empty
        });

        let mut res = http::Response::new(ResponseBody {
            inner: match outgoing {
                Outgoing::Empty => Inner::Empty,
                Outgoing::Full(b) => Inner::Full(Some(b)),
                Outgoing::Stream(s) => Inner::Stream(s),
            },
            listeners: self.listeners,
        });
        *res.status_mut() = self.status;
        *res.headers_mut() = self.headers;
        // HTTP/1 only; HTTP/2 has no reason phrase.
        if let Some(message) = self.message {
            match ReasonPhrase::try_from(message) {
                Ok(phrase) => {
                    res.extensions_mut().insert(phrase);
                }
                Err(e) => debug!("status message not sent: {e}"),
            }
        }
        res
    }

    fn finish_with(&mut self, outgoing: Outgoing) {
        if self.outgoing.is_some() {
            debug!("write after end ignored");
            return;
        }
        self.outgoing = Some(outgoing);
    }
}

impl Default for ServerResponse {
    fn default() -> Self { Self::new() }
}

impl fmt::Debug for ServerResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("ended", &self.is_ended())
            .finish_non_exhaustive()
    }
}

// ── ResponseBody ──────────────────────────────────────────────────────────────

enum Inner {
    Empty,
    Full(Option<Bytes>),
    Stream(BodyStream),
}

/// The body hyper polls. Notifies the finish listeners exactly once.
pub struct ResponseBody {
    inner: Inner,
    listeners: Vec<FinishListener>,
}

/// How the response stream ended.
enum Ending {
    Clean,
    Aborted,
    Failed(io::ErrorKind, String),
}

impl Ending {
    fn to_error(&self) -> Option<Error> {
        match self {
            Self::Clean => None,
            Self::Aborted => Some(Error::Aborted),
            Self::Failed(kind, msg) => Some(Error::Io(io::Error::new(*kind, msg.clone()))),
        }
    }
}

impl ResponseBody {
    fn finish(&mut self, ending: &Ending) {
        for listener in std::mem::take(&mut self.listeners) {
            listener(ending.to_error());
        }
    }

    fn has_remaining(&self) -> bool {
        match &self.inner {
            Inner::Empty | Inner::Full(None) => false,
            Inner::Full(Some(_)) | Inner::Stream(_) => true,
        }
    }
}

impl HttpBody for ResponseBody {
    type Data = Bytes;
    type Error = io::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut TaskContext<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, io::Error>>> {
        let this = self.get_mut();
        let polled = match &mut this.inner {
            Inner::Empty => Poll::Ready(None),
            Inner::Full(chunk) => Poll::Ready(chunk.take().map(|b| Ok(Frame::data(b)))),
            Inner::Stream(s) => s.as_mut().poll_next(cx).map(|item| item.map(|r| r.map(Frame::data))),
        };

        match &polled {
            Poll::Ready(None) => {
                this.inner = Inner::Empty;
                this.finish(&Ending::Clean);
            }
            Poll::Ready(Some(Err(e))) => {
                this.inner = Inner::Empty;
                this.finish(&Ending::Failed(e.kind(), e.to_string()));
            }
            _ => {}
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        !self.has_remaining()
    }

    fn size_hint(&self) -> SizeHint {
        match &self.inner {
            Inner::Empty | Inner::Full(None) => SizeHint::with_exact(0),
            Inner::Full(Some(b)) => SizeHint::with_exact(b.len() as u64),
            Inner::Stream(s) => {
                let mut hint = SizeHint::new();
                hint.set_lower(s.size_hint().0 as u64);
                hint
            }
        }
    }
}

impl Drop for ResponseBody {
    fn drop(&mut self) {
        let ending = if self.has_remaining() { Ending::Aborted } else { Ending::Clean };
        self.finish(&ending);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use http_body_util::{BodyExt, Full};

    fn outcomes() -> (Arc<Mutex<Vec<Option<String>>>>, impl FnOnce(Option<Error>) + Send + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |err: Option<Error>| sink.lock().unwrap().push(err.map(|e| e.to_string())))
    }

    #[test]
    fn request_url_is_path_and_query() {
        let req = ServerRequest::from_http(
            http::Request::post("http://example.com/a/b?x=1")
                .body(Full::new(Bytes::from_static(b"hi")))
                .unwrap(),
        );
        assert_eq!(req.method(), Method::POST);
        assert_eq!(req.url(), "/a/b?x=1");
        assert_eq!(req.authority.as_deref(), Some("example.com"));
    }

    #[test]
    fn second_end_is_ignored() {
        let mut res = ServerResponse::new();
        assert!(res.is_writable());
        res.end("first");
        res.end("second");
        assert!(!res.is_writable());
        assert!(matches!(res.outgoing(), Some(Outgoing::Full(b)) if b == "first"));
    }

    #[test]
    fn flushing_marks_headers_sent_without_ending() {
        let mut res = ServerResponse::new();
        res.flush_headers();
        assert!(res.headers_sent());
        assert!(res.is_writable());
    }

    #[test]
    fn custom_message_becomes_reason_phrase() {
        let mut res = ServerResponse::new();
        res.set_status(StatusCode::IM_A_TEAPOT);
        res.set_message(Some("Short And Stout".to_owned()));
        res.end_empty();

        let http = res.into_http();
        let phrase = http.extensions().get::<ReasonPhrase>().unwrap();
        assert_eq!(phrase.as_bytes(), b"Short And Stout");
    }

    #[test]
    fn invalid_message_is_not_sent() {
        let mut res = ServerResponse::new();
        res.set_message(Some("line\nbreak".to_owned()));
        res.end_empty();
        assert!(res.into_http().extensions().get::<ReasonPhrase>().is_none());
    }

    #[test]
    fn default_message_adds_no_reason_phrase() {
        let mut res = ServerResponse::new();
        res.end_empty();
        assert!(res.into_http().extensions().get::<ReasonPhrase>().is_none());
    }

    #[tokio::test]
    async fn delivered_body_reports_clean_finish() {
        let (seen, listener) = outcomes();
        let mut res = ServerResponse::new();
        res.on_finished(listener);
        res.end("done");

        let body = res.into_http().into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, "done");
        assert_eq!(*seen.lock().unwrap(), vec![None]);
    }

    #[test]
    fn dropped_body_reports_abort() {
        let (seen, listener) = outcomes();
        let mut res = ServerResponse::new();
        res.on_finished(listener);
        res.end("never read");

        drop(res.into_http());
        assert_eq!(
            *seen.lock().unwrap(),
            vec![Some("response aborted before it finished".to_owned())]
        );
    }

    #[test]
    fn empty_body_finishes_cleanly_even_if_never_polled() {
        let (seen, listener) = outcomes();
        let mut res = ServerResponse::new();
        res.on_finished(listener);
        res.end_empty();

        drop(res.into_http());
        assert_eq!(*seen.lock().unwrap(), vec![None]);
    }

    #[tokio::test]
    async fn stream_error_is_reported_once() {
        let (seen, listener) = outcomes();
        let mut res = ServerResponse::new();
        res.on_finished(listener);
        res.pipe(Box::pin(futures::stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "reset")),
        ])));

        let collected = res.into_http().into_body().collect().await;
        assert!(matches!(collected, Err(e) if e.kind() == io::ErrorKind::BrokenPipe));
        assert_eq!(*seen.lock().unwrap(), vec![Some("io: reset".to_owned())]);
    }
}
