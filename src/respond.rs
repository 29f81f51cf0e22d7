//! Response finalization.
//!
//! Turns a finished [`Context`] into bytes on the transport response. The
//! rules are checked in order and the first match wins; status and method
//! come before the body because they can veto it entirely.

use http::header::{CONTENT_TYPE, TRANSFER_ENCODING};
use http::{Method, StatusCode, Version};

use crate::body::Body;
use crate::context::Context;
use crate::response::ContentType;
use crate::status;

/// Writes whatever the middleware chain left on `ctx`.
pub(crate) fn respond(ctx: &mut Context) {
    if !ctx.respond || !ctx.res.is_writable() {
        return;
    }

    let code = ctx.res.status();
    if status::is_empty(code) {
        ctx.body = Body::Empty;
        ctx.res.end_empty();
        return;
    }

    if ctx.req.method == Method::HEAD {
        if !ctx.res.headers_sent() && !ctx.response().has("content-length") {
            if let Some(len) = ctx.response().length() {
                ctx.set_length(len);
            }
        }
        ctx.res.end_empty();
        return;
    }

    match std::mem::take(&mut ctx.body) {
        Body::Empty if ctx.explicit_null_body => {
            ctx.remove_header(CONTENT_TYPE);
            ctx.remove_header(TRANSFER_ENCODING);
            ctx.res.end_empty();
        }
        Body::Empty => {
            let text = fallback_text(ctx, code);
            if !ctx.res.headers_sent() {
                ctx.set_type(ContentType::Text);
                ctx.set_length(text.len() as u64);
            }
            ctx.res.end(text);
        }
        Body::Bytes(bytes) => ctx.res.end(bytes),
        Body::Text(text) => ctx.res.end(text),
        Body::Stream(stream) => ctx.res.pipe(stream),
        Body::Json(value) => {
            let text = value.to_string();
            if !ctx.res.headers_sent() {
                ctx.set_length(text.len() as u64);
            }
            ctx.res.end(text);
        }
    }
}

// HTTP/2 carries no reason phrase, so only the code is meaningful there.
fn fallback_text(ctx: &Context, code: StatusCode) -> String {
    if ctx.req.version >= Version::HTTP_2 {
        return code.as_str().to_owned();
    }
    ctx.message().unwrap_or(code.as_str()).to_owned()
}
