//! # strata
//!
//! A minimal HTTP middleware framework built on the onion model.
//!
//! An [`App`] is an ordered list of middleware. Each request gets a fresh
//! [`Context`] that flows down through the middleware and back up again;
//! once the chain resolves, whatever body and headers it left behind are
//! written to the client. Routing, body parsing, sessions and the like are
//! left to middleware.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use strata::App;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), strata::Error> {
//!     tracing_subscriber::fmt::init();
//!
//!     App::new()
//!         .with(|ctx, next| Box::pin(async move {
//!             let started = std::time::Instant::now();
//!             next.run(ctx).await?;
//!             tracing::info!(path = ctx.path(), status = %ctx.status(), elapsed = ?started.elapsed());
//!             Ok(())
//!         }))
//!         .with(|ctx, _next| Box::pin(async move {
//!             ctx.set_body("Hello World");
//!             Ok(())
//!         }))
//!         .listen("0.0.0.0:3000")
//!         .await
//! }
//! ```
//!
//! ## Errors
//!
//! A middleware that returns `Err` stops the chain. Upstream middleware may
//! catch it by inspecting the result of `next.run(ctx).await`; otherwise the
//! application's error handler sees it and the client gets a plain-text
//! error response. [`HttpError`] carries the status, the client-facing
//! message and whether that message is safe to expose.

mod application;
mod body;
mod config;
mod context;
mod error;
mod on_error;
mod request;
mod respond;
mod response;
mod server;
mod transport;

pub mod middleware;
pub mod status;

pub use application::{App, RequestHandler};
pub use body::{Body, BodyStream};
pub use config::Config;
pub use context::Context;
pub use error::{Error, HttpError};
pub use on_error::{DefaultErrorHandler, ErrorHandler, Failure};
pub use request::Request;
pub use response::{ContentType, Response};
pub use server::{Server, serve_listener};
pub use transport::{Outgoing, ResponseBody, ServerRequest, ServerResponse};
