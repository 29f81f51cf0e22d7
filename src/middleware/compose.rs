//! Onion-model composition of a middleware sequence.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{BoxFuture, BoxedMiddleware};
use crate::context::Context;
use crate::error::Error;

/// A frozen middleware chain, cheap to clone.
///
/// Built by [`compose`] from a snapshot: middleware registered afterwards
/// are not part of it.
#[derive(Clone)]
pub struct Composed {
    chain: Arc<[BoxedMiddleware]>,
}

/// Freezes `middleware` into a single callable chain.
pub fn compose(middleware: &[BoxedMiddleware]) -> Composed {
    Composed { chain: Arc::from(middleware) }
}

impl Composed {
    /// Runs the chain against `ctx`.
    ///
    /// Fails with the first error a middleware returns and not otherwise
    /// caught upstream, or with [`Error::NextCalledMultipleTimes`].
    pub async fn run(&self, ctx: &mut Context) -> Result<(), Error> {
        let cursor = AtomicUsize::new(0);
        dispatch(&self.chain, &cursor, 0, ctx).await
    }

    pub fn len(&self) -> usize { self.chain.len() }
    pub fn is_empty(&self) -> bool { self.chain.is_empty() }
}

/// The continuation handed to each middleware.
///
/// Runs the rest of the chain. Calling it a second time fails with
/// [`Error::NextCalledMultipleTimes`].
pub struct Next<'a> {
    chain: &'a [BoxedMiddleware],
    cursor: &'a AtomicUsize,
    index: usize,
}

impl Next<'_> {
    pub fn run<'b>(&'b self, ctx: &'b mut Context) -> BoxFuture<'b, Result<(), Error>> {
        dispatch(self.chain, self.cursor, self.index, ctx)
    }
}

// `cursor` holds one past the highest index entered so far.
fn dispatch<'a>(
    chain: &'a [BoxedMiddleware],
    cursor: &'a AtomicUsize,
    index: usize,
    ctx: &'a mut Context,
) -> BoxFuture<'a, Result<(), Error>> {
    if index < cursor.load(Ordering::Acquire) {
        return Box::pin(async { Err(Error::NextCalledMultipleTimes) });
    }
    cursor.store(index + 1, Ordering::Release);

    match chain.get(index) {
        Some(middleware) => middleware.call(ctx, Next { chain, cursor, index: index + 1 }),
        None => Box::pin(async { Ok(()) }),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use http::{Method, StatusCode};

    use super::*;
    use crate::context::tests::context;
    use crate::middleware::{Middleware, Next, from_fn};

    type Trail = Arc<Mutex<Vec<String>>>;

    fn tracer(name: &'static str, trail: &Trail) -> BoxedMiddleware {
        let trail = Arc::clone(trail);
        from_fn(move |ctx, next| {
            let trail = Arc::clone(&trail);
            Box::pin(async move {
                trail.lock().unwrap().push(format!("{name} in"));
                next.run(ctx).await?;
                trail.lock().unwrap().push(format!("{name} out"));
                Ok(())
            })
        })
    }

    fn entries(trail: &Trail) -> Vec<String> {
        trail.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn runs_in_onion_order() {
        let trail = Trail::default();
        let chain = compose(&[tracer("a", &trail), tracer("b", &trail), tracer("c", &trail)]);

        let mut ctx = context(Method::GET, "/");
        chain.run(&mut ctx).await.unwrap();

        assert_eq!(
            entries(&trail),
            ["a in", "b in", "c in", "c out", "b out", "a out"]
        );
    }

    #[tokio::test]
    async fn empty_chain_resolves_without_effect() {
        let chain = compose(&[]);
        assert!(chain.is_empty());

        let mut ctx = context(Method::GET, "/");
        chain.run(&mut ctx).await.unwrap();
        assert!(ctx.body().is_null());
        assert!(ctx.writable());
    }

    #[tokio::test]
    async fn second_next_call_fails_at_any_position() {
        let twice = from_fn(|ctx, next| {
            Box::pin(async move {
                next.run(ctx).await?;
                next.run(ctx).await
            })
        });

        for position in 0..3 {
            let trail = Trail::default();
            let mut middleware = vec![tracer("x", &trail), tracer("y", &trail)];
            middleware.insert(position, Arc::clone(&twice));

            let mut ctx = context(Method::GET, "/");
            let err = compose(&middleware).run(&mut ctx).await.unwrap_err();
            assert!(matches!(err, Error::NextCalledMultipleTimes), "position {position}");
            assert_eq!(err.to_string(), "next() called multiple times");
        }
    }

    #[tokio::test]
    async fn error_skips_downstream_and_unwinds_upstream() {
        let trail = Trail::default();
        let fail = from_fn(|_ctx, _next| {
            Box::pin(async { Err(Error::http(StatusCode::BAD_REQUEST, "bad input")) })
        });
        let chain = compose(&[tracer("outer", &trail), fail, tracer("never", &trail)]);

        let mut ctx = context(Method::GET, "/");
        let err = chain.run(&mut ctx).await.unwrap_err();

        assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
        assert_eq!(entries(&trail), ["outer in"]);
    }

    #[tokio::test]
    async fn upstream_can_catch_downstream_errors() {
        let catcher = from_fn(|ctx, next| {
            Box::pin(async move {
                if let Err(err) = next.run(ctx).await {
                    ctx.set_status(err.status().unwrap_or(StatusCode::INTERNAL_SERVER_ERROR));
                    ctx.set_body(err.to_string());
                }
                Ok(())
            })
        });
        let fail = from_fn(|_ctx, _next| {
            Box::pin(async { Err(Error::http(StatusCode::CONFLICT, "taken")) })
        });

        let mut ctx = context(Method::GET, "/");
        compose(&[catcher, fail]).run(&mut ctx).await.unwrap();

        assert_eq!(ctx.status(), StatusCode::CONFLICT);
        assert!(matches!(ctx.body(), crate::Body::Text(t) if t == "taken"));
    }

    #[tokio::test]
    async fn middleware_may_skip_next() {
        let trail = Trail::default();
        let stop = from_fn(|ctx, _next| {
            Box::pin(async move {
                ctx.set_body("short-circuit");
                Ok(())
            })
        });
        let chain = compose(&[tracer("outer", &trail), stop, tracer("inner", &trail)]);

        let mut ctx = context(Method::GET, "/");
        chain.run(&mut ctx).await.unwrap();
        assert_eq!(entries(&trail), ["outer in", "outer out"]);
    }

    #[tokio::test]
    async fn struct_middleware_carry_configuration() {
        struct Stamp(&'static str);

        impl Middleware for Stamp {
            fn call<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, Result<(), Error>> {
                Box::pin(async move {
                    ctx.state_mut().insert(self.0);
                    next.run(ctx).await
                })
            }
        }

        let stamp: BoxedMiddleware = Arc::new(Stamp("v1"));
        let mut ctx = context(Method::GET, "/");
        compose(&[stamp]).run(&mut ctx).await.unwrap();
        assert_eq!(ctx.state().get::<&str>(), Some(&"v1"));
    }

    #[tokio::test]
    async fn composition_is_a_snapshot() {
        let trail = Trail::default();
        let mut middleware = vec![tracer("first", &trail)];
        let chain = compose(&middleware);
        middleware.push(tracer("late", &trail));

        let mut ctx = context(Method::GET, "/");
        chain.run(&mut ctx).await.unwrap();
        assert_eq!(chain.len(), 1);
        assert_eq!(entries(&trail), ["first in", "first out"]);
    }
}
