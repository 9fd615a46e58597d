//! Middleware: composable before/after request handler logic.
//!
//! A middleware wraps a handler and produces a new handler. A
//! [`MiddlewareChain`] holds an ordered list of them and composes the list
//! around a terminal handler with [`MiddlewareChain::then`]:
//!
//! ```text
//! MiddlewareChain::new([m1, m2, m3]).then(h)   ==   m1(m2(m3(h)))
//! ```
//!
//! A request reaches `m1` first, then `m2`, then `m3`, then `h`; the response
//! travels back out through `m3`, `m2`, `m1`. Each middleware may inspect the
//! request, short-circuit with its own response, or decorate the response it
//! gets back from [`Next::run`].
//!
//! Chains are values: [`MiddlewareChain::append`] returns a new chain and never
//! touches the one it was called on, so routers that fork into subrouters can
//! keep extending their own chains without affecting each other.

use std::{future::Future, sync::Arc};
use tokio::time::Instant;

use crate::router::{BoxFuture, Handler, IntoHandler};
use crate::{Response, context::Context};

/// The handler wrapped by a middleware.
///
/// Passed to every [`Middleware::handle`] call; calling [`Next::run`] forwards
/// the request to the rest of the chain. `Next` is consumed by `run`, so a
/// middleware can forward a request at most once.
pub struct Next {
    inner: Handler,
}

impl Next {
    pub fn new(inner: Handler) -> Self {
        Self { inner }
    }

    /// Invokes the wrapped handler and returns its response.
    pub async fn run(self, ctx: Context) -> Response {
        (self.inner)(ctx).await
    }
}

/// A type-erased, reference-counted middleware function.
///
/// Build one from a [`Middleware`] value with [`from_middleware`], or from an
/// async closure with [`from_fn`].
pub type MiddlewareHandler = Arc<dyn Fn(Context, Next) -> BoxFuture + Send + Sync + 'static>;

/// The core trait for stateful middleware.
///
/// Implementations must be `Send + Sync`: one instance is shared by every
/// request the route serves.
pub trait Middleware: Send + Sync {
    /// Handles the request, optionally delegating to `next`.
    fn handle(&self, ctx: Context, next: Next) -> BoxFuture;
}

/// Converts a [`Middleware`] implementation into a [`MiddlewareHandler`].
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use restkit::middleware::{LoggerMiddleware, from_middleware};
///
/// let handler = from_middleware(Arc::new(LoggerMiddleware));
/// ```
pub fn from_middleware<M>(middleware: Arc<M>) -> MiddlewareHandler
where
    M: Middleware + 'static,
{
    Arc::new(move |ctx: Context, next: Next| middleware.handle(ctx, next))
}

/// Converts an async closure into a [`MiddlewareHandler`].
///
/// ```rust,no_run
/// use restkit::middleware::from_fn;
///
/// let stamp = from_fn(|ctx, next| async move {
///     let mut res = next.run(ctx).await;
///     res.add_header("X-Served-By", "restkit");
///     res
/// });
/// ```
pub fn from_fn<F, Fut>(f: F) -> MiddlewareHandler
where
    F: Fn(Context, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    Arc::new(move |ctx: Context, next: Next| -> BoxFuture { Box::pin(f(ctx, next)) })
}

/// An immutable, ordered list of middleware.
#[derive(Clone)]
pub struct MiddlewareChain {
    middleware: Arc<[MiddlewareHandler]>,
}

impl Default for MiddlewareChain {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl MiddlewareChain {
    pub fn new(middleware: impl IntoIterator<Item = MiddlewareHandler>) -> Self {
        let middleware: Vec<MiddlewareHandler> = middleware.into_iter().collect();
        Self {
            middleware: middleware.into(),
        }
    }

    /// Returns a new chain with `middleware` added after the existing entries.
    /// `self` is left unchanged.
    #[must_use]
    pub fn append(&self, middleware: impl IntoIterator<Item = MiddlewareHandler>) -> Self {
        let combined: Vec<MiddlewareHandler> = self
            .middleware
            .iter()
            .cloned()
            .chain(middleware)
            .collect();
        Self {
            middleware: combined.into(),
        }
    }

    /// Composes the chain around `terminal`.
    ///
    /// The terminal handler is taken by value, so a chain can never be
    /// finished without one.
    pub fn then(&self, terminal: Handler) -> Handler {
        self.middleware.iter().rev().fold(terminal, |inner, m| {
            let m = Arc::clone(m);
            let wrapped: Handler = Arc::new(move |ctx: Context| m(ctx, Next::new(Arc::clone(&inner))));
            wrapped
        })
    }

    /// Like [`then`](Self::then), for a bare async function.
    pub fn then_fn(&self, terminal: impl IntoHandler) -> Handler {
        self.then(terminal.into_handler())
    }

    pub fn len(&self) -> usize {
        self.middleware.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middleware.is_empty()
    }
}

/// Built-in middleware that logs each request's method, path, status and duration.
///
/// Emits one `tracing::info!` record after the downstream handler completes.
/// Never short-circuits.
pub struct LoggerMiddleware;

impl Middleware for LoggerMiddleware {
    fn handle(&self, ctx: Context, next: Next) -> BoxFuture {
        Box::pin(async move {
            let start = Instant::now();
            let method = ctx.request().method().to_string();
            let path = ctx.request().path().to_string();

            let response = next.run(ctx).await;

            tracing::info!(
                method = %method,
                path = %path,
                status = response.status().as_u16(),
                elapsed = ?start.elapsed(),
                "request served"
            );

            response
        })
    }
}
