//! Per-request context.
//!
//! A [`Context`] owns the transport pair, the response body and a typed
//! `state` map middleware use to talk to each other. The request and
//! response facets are borrowed views ([`Context::request`],
//! [`Context::response`]); everything that mutates goes through the
//! context itself.

use std::sync::Arc;

use bytes::Bytes;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, IntoHeaderName, TRANSFER_ENCODING};
use http::{Extensions, HeaderValue, Method, StatusCode};
use http_body_util::BodyExt;
use serde::Serialize;

use crate::body::Body;
use crate::config::Config;
use crate::error::Error;
use crate::request::{Request, split_url};
use crate::response::{ContentType, Response};
use crate::status;
use crate::transport::{ServerRequest, ServerResponse};

/// Everything one request's middleware chain works on.
pub struct Context {
    pub(crate) app: Arc<Config>,
    pub(crate) req: ServerRequest,
    pub(crate) res: ServerResponse,
    pub(crate) body: Body,
    pub(crate) explicit_status: bool,
    pub(crate) explicit_null_body: bool,
    pub(crate) respond: bool,
    original_url: String,
    state: Extensions,
}

impl Context {
    pub(crate) fn new(app: Arc<Config>, req: ServerRequest, res: ServerResponse) -> Self {
        let original_url = req.url.clone();
        Self {
            app,
            req,
            res,
            body: Body::Empty,
            explicit_status: false,
            explicit_null_body: false,
            respond: true,
            original_url,
            state: Extensions::new(),
        }
    }

    pub fn app(&self) -> &Config { &self.app }

    /// Read-only view of the request.
    pub fn request(&self) -> Request<'_> { Request::new(self) }

    /// Read-only view of the response.
    pub fn response(&self) -> Response<'_> { Response::new(self) }

    pub fn req(&self) -> &ServerRequest { &self.req }
    pub fn req_mut(&mut self) -> &mut ServerRequest { &mut self.req }
    pub fn res(&self) -> &ServerResponse { &self.res }
    pub fn res_mut(&mut self) -> &mut ServerResponse { &mut self.res }

    /// Scratch space shared by the middleware of this request.
    pub fn state(&self) -> &Extensions { &self.state }
    pub fn state_mut(&mut self) -> &mut Extensions { &mut self.state }

    /// The URL as received, unaffected by later rewrites.
    pub fn original_url(&self) -> &str { &self.original_url }

    // ── Request side ──────────────────────────────────────────────────────────

    pub fn method(&self) -> &Method { &self.req.method }

    pub fn set_method(&mut self, method: Method) {
        self.req.method = method;
    }

    pub fn url(&self) -> &str { &self.req.url }

    pub fn set_url(&mut self, url: impl Into<String>) {
        self.req.url = url.into();
    }

    pub fn path(&self) -> &str { split_url(&self.req.url).1 }

    /// Rewrites the path, keeping any query string.
    pub fn set_path(&mut self, path: &str) {
        let (prefix, current, query) = split_url(&self.req.url);
        if current == path {
            return;
        }
        let url = match query {
            Some(q) => format!("{prefix}{path}?{q}"),
            None => format!("{prefix}{path}"),
        };
        self.req.url = url;
    }

    /// Collects the request body. Empty once it has been read.
    pub async fn read_body(&mut self) -> Result<Bytes, Error> {
        match self.req.take_body() {
            Some(body) => Ok(body.collect().await?.to_bytes()),
            None => Ok(Bytes::new()),
        }
    }

    // ── Response side ─────────────────────────────────────────────────────────

    pub fn status(&self) -> StatusCode { self.res.status() }

    /// Sets the status. Ignored once headers are sent.
    ///
    /// A body set earlier is dropped if `code` never carries one.
    pub fn set_status(&mut self, code: StatusCode) {
        if self.res.headers_sent() {
            return;
        }
        self.explicit_status = true;
        self.res.set_status(code);
        self.res.set_message(None);
        if !self.body.is_null() && status::is_empty(code) {
            self.set_body(Body::Empty);
        }
    }

    /// The custom status message, else the canonical reason phrase.
    pub fn message(&self) -> Option<&str> {
        self.res.message().or_else(|| status::message(self.res.status()))
    }

    pub fn set_message(&mut self, message: impl Into<String>) {
        self.res.set_message(Some(message.into()));
    }

    pub fn body(&self) -> &Body { &self.body }

    /// Sets the body and derives status, Content-Type and Content-Length from it.
    ///
    /// ```rust
    /// # use strata::{App, ServerRequest, ServerResponse};
    /// # let app = App::new();
    /// # let req = ServerRequest::from_http(http::Request::new(http_body_util::Empty::<bytes::Bytes>::new()));
    /// # let mut ctx = app.create_context(req, ServerResponse::new());
    /// ctx.set_body("<p>hi</p>");
    /// assert_eq!(ctx.status(), http::StatusCode::OK);
    /// assert_eq!(ctx.response().content_type(), Some("text/html"));
    /// assert_eq!(ctx.response().length(), Some(9));
    /// ```
    pub fn set_body(&mut self, body: impl Into<Body>) {
        self.body = body.into();

        if self.body.is_null() {
            if !status::is_empty(self.res.status()) {
                self.set_status(StatusCode::NO_CONTENT);
            }
            self.explicit_null_body = true;
            self.remove_header(CONTENT_TYPE);
            self.remove_header(CONTENT_LENGTH);
            self.remove_header(TRANSFER_ENCODING);
            return;
        }

        if !self.explicit_status {
            self.set_status(StatusCode::OK);
        }

        // Structured bodies always claim their type; the others only fill a gap.
        let forced = matches!(self.body, Body::Json(_));
        let (default_type, length) = match &self.body {
            Body::Text(text) => {
                let html = text.trim_start().starts_with('<');
                (if html { ContentType::Html } else { ContentType::Text }, Some(text.len() as u64))
            }
            Body::Bytes(bytes) => (ContentType::OctetStream, Some(bytes.len() as u64)),
            Body::Stream(_) | Body::Json(_) | Body::Empty => (ContentType::OctetStream, None),
        };
        let default_type = if forced { ContentType::Json } else { default_type };

        if forced || !self.res.headers().contains_key(CONTENT_TYPE) {
            self.set_type(default_type);
        }
        match length {
            Some(len) => self.set_length(len),
            None => self.remove_header(CONTENT_LENGTH),
        }
    }

    /// Serializes `value` into a structured body.
    pub fn set_json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Error> {
        self.set_body(Body::json(value)?);
        Ok(())
    }

    pub fn set_type(&mut self, content_type: ContentType) {
        self.set_header(CONTENT_TYPE, HeaderValue::from_static(content_type.as_str()));
    }

    pub fn set_length(&mut self, len: u64) {
        self.set_header(CONTENT_LENGTH, HeaderValue::from(len));
    }

    /// Sets a header, replacing previous values. Ignored once headers are sent.
    pub fn set_header<K: IntoHeaderName>(&mut self, name: K, value: HeaderValue) {
        if self.res.headers_sent() {
            return;
        }
        self.res.headers_mut().insert(name, value);
    }

    pub fn append_header<K: IntoHeaderName>(&mut self, name: K, value: HeaderValue) {
        if self.res.headers_sent() {
            return;
        }
        self.res.headers_mut().append(name, value);
    }

    pub fn remove_header<K: http::header::AsHeaderName>(&mut self, name: K) {
        if self.res.headers_sent() {
            return;
        }
        self.res.headers_mut().remove(name);
    }

    /// Whether the finalizer will write the response.
    pub fn respond(&self) -> bool { self.respond }

    /// Pass `false` when a middleware writes the transport response itself.
    pub fn set_respond(&mut self, respond: bool) {
        self.respond = respond;
    }

    pub fn writable(&self) -> bool { self.res.is_writable() }

    pub(crate) fn into_response(self) -> ServerResponse {
        self.res
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("req", &self.req)
            .field("res", &self.res)
            .field("body", &self.body)
            .field("original_url", &self.original_url)
            .finish_non_exhaustive()
    }
}
