//! Response facet and the content types strata sets on its own.
//!
//! You should not need to think about this module much. Set a body on the
//! [`Context`] and the right headers follow; read them back here.

use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderMap, StatusCode};

use crate::body::Body;
use crate::config::Config;
use crate::context::Context;
use crate::request::Request;

// ── ContentType ───────────────────────────────────────────────────────────────

/// Common content-type values for use with [`Context::set_type`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ContentType {
    Html,         // text/html; charset=utf-8
    Json,         // application/json; charset=utf-8
    OctetStream,  // application/octet-stream  (binary / file download)
    Text,         // text/plain; charset=utf-8
    Xml,          // application/xml
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Html        => "text/html; charset=utf-8",
            Self::Json        => "application/json; charset=utf-8",
            Self::OctetStream => "application/octet-stream",
            Self::Text        => "text/plain; charset=utf-8",
            Self::Xml         => "application/xml",
        }
    }
}

// ── Response facet ────────────────────────────────────────────────────────────

/// The response side of a context.
///
/// Obtained with [`Context::response`]. Mutations live on [`Context`].
#[derive(Clone, Copy)]
pub struct Response<'a> {
    ctx: &'a Context,
}

impl<'a> Response<'a> {
    pub(crate) fn new(ctx: &'a Context) -> Self {
        Self { ctx }
    }

    pub fn ctx(&self) -> &'a Context { self.ctx }
    pub fn app(&self) -> &'a Config { self.ctx.app() }
    pub fn request(&self) -> Request<'a> { Request::new(self.ctx) }

    pub fn status(&self) -> StatusCode { self.ctx.res.status() }
    pub fn message(&self) -> Option<&'a str> { self.ctx.message() }
    pub fn body(&self) -> &'a Body { &self.ctx.body }
    pub fn headers(&self) -> &'a HeaderMap { self.ctx.res.headers() }

    pub fn header(&self, name: &str) -> Option<&'a str> {
        self.headers().get(name).and_then(|v| v.to_str().ok())
    }

    pub fn has(&self, name: &str) -> bool {
        self.headers().contains_key(name)
    }

    /// The media type without parameters, e.g. `text/plain`.
    pub fn content_type(&self) -> Option<&'a str> {
        self.headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(str::trim)
    }

    /// Content-Length if set, else the length the body will have.
    pub fn length(&self) -> Option<u64> {
        match self.headers().get(CONTENT_LENGTH) {
            Some(v) => v.to_str().ok().and_then(|s| s.trim().parse().ok()),
            None => self.ctx.body.byte_len(),
        }
    }

    pub fn headers_sent(&self) -> bool { self.ctx.res.headers_sent() }
    pub fn writable(&self) -> bool { self.ctx.writable() }
}

#[cfg(test)]
mod tests {
    use http::{HeaderValue, Method};

    use super::*;
    use crate::context::tests::context;

    #[test]
    fn explicit_length_wins_over_body() {
        let mut ctx = context(Method::GET, "/");
        ctx.set_body("four");
        ctx.set_length(10);
        assert_eq!(ctx.response().length(), Some(10));
    }

    #[test]
    fn garbage_length_reads_as_unknown() {
        let mut ctx = context(Method::GET, "/");
        ctx.set_header(CONTENT_LENGTH, HeaderValue::from_static("lots"));
        assert_eq!(ctx.response().length(), None);
    }

    #[test]
    fn null_body_has_no_length() {
        let ctx = context(Method::GET, "/");
        assert_eq!(ctx.response().length(), None);
        assert!(ctx.response().body().is_null());
        assert!(ctx.response().writable());
        assert!(!ctx.response().headers_sent());
    }

    #[test]
    fn content_type_strips_parameters() {
        let mut ctx = context(Method::GET, "/");
        ctx.set_type(ContentType::Text);
        assert_eq!(ctx.response().content_type(), Some("text/plain"));
        assert_eq!(ctx.response().header("content-type"), Some("text/plain; charset=utf-8"));
    }
}
