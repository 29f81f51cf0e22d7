//! The application: middleware registration, context creation and the
//! per-request dispatcher.

use std::fmt;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use hyper::body::Body as HttpBody;
use http::StatusCode;
use serde_json::{Value, json};
use tracing::debug;

use crate::body::Body;
use crate::config::Config;
use crate::context::Context;
use crate::error::Error;
use crate::middleware::{BoxFuture, BoxedMiddleware, Composed, Middleware, Next, compose};
use crate::on_error::{DefaultErrorHandler, ErrorHandler, Failure};
use crate::respond::respond;
use crate::response::ContentType;
use crate::server::Server;
use crate::status;
use crate::transport::{ResponseBody, ServerRequest, ServerResponse};

/// An application: an ordered list of middleware plus shared settings.
///
/// Each builder call returns `self` so registrations chain naturally.
///
/// ```rust,no_run
/// use strata::App;
///
/// #[tokio::main]
/// async fn main() {
///     App::new()
///         .with(|ctx, next| Box::pin(async move {
///             next.run(ctx).await?;
///             ctx.set_header("x-powered-by", "strata".parse().unwrap());
///             Ok(())
///         }))
///         .with(|ctx, _next| Box::pin(async move {
///             ctx.set_body("Hello World");
///             Ok(())
///         }))
///         .listen("0.0.0.0:3000")
///         .await
///         .unwrap();
/// }
/// ```
pub struct App {
    config: Arc<Config>,
    middleware: Vec<BoxedMiddleware>,
    on_error: Arc<dyn ErrorHandler>,
}

impl App {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            middleware: Vec::new(),
            on_error: Arc::new(DefaultErrorHandler),
        }
    }

    pub fn config(&self) -> &Config { &self.config }

    /// Appends a function middleware. Returns `self` for chaining.
    pub fn with<F>(self, f: F) -> Self
    where
        F: for<'a> Fn(&'a mut Context, Next<'a>) -> BoxFuture<'a, Result<(), Error>>
            + Send
            + Sync
            + 'static,
    {
        self.with_middleware(f)
    }

    /// Appends any [`Middleware`]. Returns `self` for chaining.
    pub fn with_middleware(mut self, middleware: impl Middleware) -> Self {
        debug!(name = middleware.name(), "use");
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Replaces the default error handler.
    pub fn on_error<F>(self, f: F) -> Self
    where
        F: Fn(&Failure, &Config) + Send + Sync + 'static,
    {
        self.on_error_handler(f)
    }

    pub fn on_error_handler(mut self, handler: impl ErrorHandler) -> Self {
        self.on_error = Arc::new(handler);
        self
    }

    /// Builds the request handler from the middleware registered so far.
    pub fn callback(&self) -> RequestHandler {
        RequestHandler {
            shared: Arc::new(Shared {
                config: Arc::clone(&self.config),
                on_error: Arc::clone(&self.on_error),
            }),
            chain: compose(&self.middleware),
        }
    }

    /// Builds a fresh context around a transport pair.
    pub fn create_context(&self, req: ServerRequest, res: ServerResponse) -> Context {
        Context::new(Arc::clone(&self.config), req, res)
    }

    /// Serves the application on `addr` until a shutdown signal arrives.
    pub async fn listen(self, addr: &str) -> Result<(), Error> {
        debug!(addr, "listen");
        Server::bind(addr)?.serve(self.callback()).await
    }

    /// The public settings summary.
    pub fn to_json(&self) -> Value {
        json!({
            "subdomainOffset": self.config.subdomain_offset,
            "proxy": self.config.proxy,
            "env": self.config.env,
        })
    }
}

impl Default for App {
    fn default() -> Self { Self::new() }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "App {}", self.to_json())
    }
}

// ── RequestHandler ────────────────────────────────────────────────────────────

struct Shared {
    config: Arc<Config>,
    on_error: Arc<dyn ErrorHandler>,
}

/// A frozen application, ready to serve requests. Cheap to clone.
#[derive(Clone)]
pub struct RequestHandler {
    shared: Arc<Shared>,
    chain: Composed,
}

impl RequestHandler {
    /// Runs one request through the chain and returns the written response.
    pub async fn handle(&self, req: ServerRequest, res: ServerResponse) -> ServerResponse {
        let ctx = Context::new(Arc::clone(&self.shared.config), req, res);
        self.handle_request(ctx).await.into_response()
    }

    /// [`handle`](Self::handle) for `http` types, as the server uses it.
    pub async fn serve_http<B>(
        &self,
        req: http::Request<B>,
        remote_addr: Option<SocketAddr>,
    ) -> http::Response<ResponseBody>
    where
        B: HttpBody<Data = bytes::Bytes> + Send + 'static,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let mut req = ServerRequest::from_http(req);
        if let Some(addr) = remote_addr {
            req = req.with_remote_addr(addr);
        }
        self.handle(req, ServerResponse::new()).await.into_http()
    }

    /// Dispatches one context: default 404, run the chain, then either
    /// finalize the response or report the failure. Never both.
    async fn handle_request(&self, mut ctx: Context) -> Context {
        ctx.res.set_status(StatusCode::NOT_FOUND);

        let shared = Arc::clone(&self.shared);
        ctx.res.on_finished(move |err| {
            if let Some(err) = err {
                shared.on_error.on_error(&Failure::Error(err), &shared.config);
            }
        });

        let outcome = AssertUnwindSafe(self.chain.run(&mut ctx)).catch_unwind().await;
        match outcome {
            Ok(Ok(())) => respond(&mut ctx),
            Ok(Err(err)) => self.fail(&mut ctx, Failure::Error(err)),
            Err(payload) => self.fail(&mut ctx, Failure::from_panic(payload)),
        }
        ctx
    }

    fn fail(&self, ctx: &mut Context, failure: Failure) {
        self.shared.on_error.on_error(&failure, &self.shared.config);
        respond_error(ctx, &failure);
    }
}

impl fmt::Debug for RequestHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestHandler")
            .field("middleware", &self.chain.len())
            .finish_non_exhaustive()
    }
}

/// Writes the error response for a failed chain, unless the client
/// already has headers or the response was taken over.
fn respond_error(ctx: &mut Context, failure: &Failure) {
    if ctx.res.headers_sent() || !ctx.res.is_writable() {
        return;
    }

    let (code, message) = match failure {
        Failure::Error(err) => {
            let code = match err {
                Error::Io(io) if io.kind() == std::io::ErrorKind::NotFound => StatusCode::NOT_FOUND,
                _ => err
                    .status()
                    .filter(|code| status::message(*code).is_some())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            };
            let message = if err.expose() { Some(err.to_string()) } else { None };
            (code, message)
        }
        Failure::NonError(_) => (StatusCode::INTERNAL_SERVER_ERROR, None),
    };
    let message = message
        .unwrap_or_else(|| status::message(code).unwrap_or(code.as_str()).to_owned());

    let headers = ctx.res.headers_mut();
    headers.clear();
    if let Failure::Error(err) = failure {
        if let Some(extra) = err.headers() {
            headers.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
    }

    ctx.body = Body::Empty;
    ctx.set_status(code);
    ctx.set_type(ContentType::Text);
    ctx.set_length(message.len() as u64);
    ctx.res.end(message);
}
