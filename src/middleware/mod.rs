//! Middleware layer.
//!
//! A middleware receives the request's [`Context`] and a [`Next`]
//! continuation. Code before `next.run(ctx).await` runs top-down in
//! registration order; code after it runs bottom-up once the inner
//! middleware have finished. That nesting is what makes timing, logging
//! and error-catching wrappers work:
//!
//! ```rust
//! use std::time::Instant;
//! use strata::middleware::{BoxFuture, Next};
//! use strata::{Context, Error};
//!
//! fn response_time<'a>(ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, Result<(), Error>> {
//!     Box::pin(async move {
//!         let start = Instant::now();
//!         next.run(ctx).await?;
//!         let ms = start.elapsed().as_millis().to_string();
//!         ctx.set_header("x-response-time", ms.parse().map_err(Error::other)?);
//!         Ok(())
//!     })
//! }
//! ```
//!
//! # How middleware are stored
//!
//! Middleware of different concrete types live in one sequence, so they are
//! stored as trait objects behind an `Arc`:
//!
//! ```text
//! fn timing(ctx, next) -> BoxFuture { … }        ← user writes this
//!        ↓ app.with(timing)
//! Arc::new(timing) as BoxedMiddleware            ← Middleware blanket impl
//!        ↓ app.callback()
//! compose(&middleware)                           ← frozen Arc<[BoxedMiddleware]>
//!        ↓ per request
//! dispatch(0) → mw.call(ctx, Next(1)) → …        ← one vtable call per layer
//! ```

mod compose;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::Context;
use crate::error::Error;

pub use compose::{Composed, Next, compose};

/// A heap-allocated, type-erased future borrowing from the request.
///
/// `Send` lets the runtime move a request's future between worker threads.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A unit of request-processing logic.
///
/// Implemented automatically for functions and closures with the signature
/// `for<'a> Fn(&'a mut Context, Next<'a>) -> BoxFuture<'a, Result<(), Error>>`.
/// Implement it by hand for middleware that carry configuration.
pub trait Middleware: Send + Sync + 'static {
    fn call<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, Result<(), Error>>;

    /// Shown in debug logs when the middleware is registered.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// A shared, type-erased middleware.
pub type BoxedMiddleware = Arc<dyn Middleware>;

impl<F> Middleware for F
where
    F: for<'a> Fn(&'a mut Context, Next<'a>) -> BoxFuture<'a, Result<(), Error>>
        + Send
        + Sync
        + 'static,
{
    fn call<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, Result<(), Error>> {
        (self)(ctx, next)
    }
}

/// Boxes a function or closure as a middleware.
///
/// Taking the `Fn` bound directly lets closures infer their argument types.
pub fn from_fn<F>(f: F) -> BoxedMiddleware
where
    F: for<'a> Fn(&'a mut Context, Next<'a>) -> BoxFuture<'a, Result<(), Error>>
        + Send
        + Sync
        + 'static,
{
    Arc::new(f)
}
