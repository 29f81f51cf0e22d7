//! Minimal strata example: logging, error catching and a tiny hand-rolled router.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl -i http://localhost:3000/
//!   curl -i http://localhost:3000/users/42
//!   curl -i http://localhost:3000/users/abc
//!   curl -I http://localhost:3000/users/42

use std::time::Instant;

use http::StatusCode;
use serde::Serialize;
use strata::middleware::{BoxFuture, Next};
use strata::{App, Context, Error};
use tracing::info;

#[derive(Serialize)]
struct User {
    id: u64,
    name: String,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let app = App::new().with(logger).with(errors_as_json).with(routes);

    if let Err(e) = app.listen("0.0.0.0:3000").await {
        tracing::error!("server error: {e}");
    }
}

fn logger<'a>(ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, Result<(), Error>> {
    Box::pin(async move {
        let started = Instant::now();
        let result = next.run(ctx).await;
        info!(
            method = %ctx.method(),
            url = ctx.original_url(),
            status = ctx.status().as_u16(),
            elapsed = ?started.elapsed(),
        );
        result
    })
}

// Turns client errors into JSON; everything else keeps flowing to the
// application's error handler.
fn errors_as_json<'a>(ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, Result<(), Error>> {
    Box::pin(async move {
        match next.run(ctx).await {
            Err(Error::Http(err)) if err.exposed() => {
                ctx.set_status(err.status());
                ctx.set_json(&serde_json::json!({ "error": err.message() }))
            }
            other => other,
        }
    })
}

fn routes<'a>(ctx: &'a mut Context, _next: Next<'a>) -> BoxFuture<'a, Result<(), Error>> {
    Box::pin(async move {
        let path = ctx.path().to_owned();
        if path == "/" {
            ctx.set_body("Hello World");
        } else if let Some(id) = path.strip_prefix("/users/") {
            let id: u64 = id
                .parse()
                .map_err(|_| Error::http(StatusCode::BAD_REQUEST, "user id must be a number"))?;
            ctx.set_json(&User { id, name: format!("user-{id}") })?;
        }
        Ok(())
    })
}
