//! Request routing: map URL patterns and HTTP methods to handler functions.
//!
//! Routes are registered through the [`Mux`] trait, implemented by the
//! top-level [`Router`] and by the [`Subrouter`] scopes it hands out. A scope
//! has a path prefix and a working middleware chain; every route registered on
//! it is composed with a snapshot of that chain at registration time.
//!
//! Registration is format-aware. A route whose path does not end in a named
//! parameter is registered four times:
//!
//! | Physical route   | Output format |
//! |------------------|---------------|
//! | `/notes`         | JSON          |
//! | `/notes.json`    | JSON          |
//! | `/notes.xml`     | XML           |
//! | `/notes.yml`     | YAML          |
//!
//! A route ending in a parameter (`/notes/:id`) is registered once; its format
//! is picked per request from the captured value (`42.xml` → XML, id `42`).
//!
//! Routes are matched in registration order; the first route whose method and
//! pattern both match the incoming request wins.

mod endpoint;
mod pattern;
mod static_files;
mod table;

use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::context::{Context, Parameters};
use crate::error::{Error, ErrorMap, Sentinel};
use crate::middleware::{MiddlewareChain, MiddlewareHandler};
use crate::render::Format;
use crate::resource::Resourcer;
use crate::{Method, Request, Response, StatusCode};

pub use endpoint::Endpoint;
use pattern::{ends_in_param, ends_in_wildcard, join_path};
use table::{FormatRule, Route, RouteTable};

/// A boxed, sendable future resolving to a [`Response`].
pub type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

/// Type-erased, heap-allocated async handler that processes a [`Context`] and returns a
/// [`Response`].
///
/// Handlers are stored behind `Arc<dyn Fn(…)>` so they can be cloned and shared across
/// threads without copying the underlying closure. In practice you never construct this
/// type directly. Use [`Mux::get`], [`Mux::post`], and the other method-specific
/// helpers instead.
pub type Handler = Arc<dyn Fn(Context) -> BoxFuture + Send + Sync + 'static>;

/// Conversion trait for async handler functions.
///
/// Any `Fn(Context) -> impl Future<Output = Response> + Send` that is also
/// `Send + Sync + 'static` implements this trait automatically via the blanket impl
/// below.
pub trait IntoHandler: Send + Sync + 'static {
    /// Call the handler with the given context, boxing the returned future.
    fn call(&self, ctx: Context) -> BoxFuture;

    /// Erases the concrete handler type.
    fn into_handler(self) -> Handler
    where
        Self: Sized,
    {
        Arc::new(move |ctx: Context| self.call(ctx))
    }
}

impl<T, F> IntoHandler for T
where
    T: Fn(Context) -> F + Send + Sync + 'static,
    F: Future<Output = Response> + Send + 'static,
{
    fn call(&self, ctx: Context) -> BoxFuture {
        Box::pin((self)(ctx))
    }
}

/// Errors raised while registering routes.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("static directory `{}` not found (also tried `{}`)", dir.display(), fallback.display())]
    StaticDir { dir: PathBuf, fallback: PathBuf },

    #[error("cannot locate the running executable: {0}")]
    Executable(#[source] std::io::Error),
}

mod private {
    use super::{MiddlewareChain, RouteTable};

    pub struct Scope<'a> {
        pub table: &'a mut RouteTable,
        pub chain: &'a mut MiddlewareChain,
        pub prefix: &'a str,
    }

    pub trait Sealed {
        fn scope(&mut self) -> Scope<'_>;
    }
}

use private::Scope;

/// The route registration surface shared by [`Router`] and [`Subrouter`].
///
/// # Examples
///
/// ```rust,no_run
/// use restkit::{Mux, Router, Response, StatusCode};
/// use restkit::middleware::{LoggerMiddleware, from_middleware};
/// use std::sync::Arc;
///
/// let mut router = Router::new();
/// router.middleware(from_middleware(Arc::new(LoggerMiddleware)));
///
/// let mut api = router.subrouter("/api/v1");
/// api.get("/ping", |ctx: restkit::Context| async move { ctx.ok("pong") }, &[]);
/// ```
pub trait Mux: private::Sealed {
    /// Registers `handler` for `method` under this scope's prefix.
    ///
    /// The handler is wrapped by the scope's current chain followed by
    /// `middleware`, and one [`Endpoint`] is recorded however many physical
    /// routes the path expands to.
    fn handle(&mut self, method: Method, uri: &str, handler: Handler, middleware: &[MiddlewareHandler]) {
        let Scope {
            table,
            chain,
            prefix,
        } = self.scope();
        let url = join_path(prefix, uri);

        let composed = if middleware.is_empty() {
            chain.then(handler)
        } else {
            chain.append(middleware.iter().cloned()).then(handler)
        };

        if ends_in_param(&url) {
            table.push(Route::new(method.clone(), &url, composed, FormatRule::TrailingParam));
        } else if ends_in_wildcard(&url) {
            table.push(Route::new(method.clone(), &url, composed, FormatRule::Fixed(Format::Json)));
        } else {
            table.push(Route::new(
                method.clone(),
                &url,
                Arc::clone(&composed),
                FormatRule::Fixed(Format::Json),
            ));
            for format in Format::SUFFIXED {
                let suffixed = format!("{url}{}", format.extension());
                table.push(Route::new(
                    method.clone(),
                    &suffixed,
                    Arc::clone(&composed),
                    FormatRule::Fixed(format),
                ));
            }
        }

        debug!(method = %method, path = %url, "route registered");
        table.endpoints.push(Endpoint::new(method, url));
    }

    /// Register a handler for `GET` requests matching `uri`.
    fn get(&mut self, uri: &str, handler: impl IntoHandler, middleware: &[MiddlewareHandler]) {
        self.handle(Method::Get, uri, handler.into_handler(), middleware);
    }

    /// Register a handler for `POST` requests matching `uri`.
    fn post(&mut self, uri: &str, handler: impl IntoHandler, middleware: &[MiddlewareHandler]) {
        self.handle(Method::Post, uri, handler.into_handler(), middleware);
    }

    /// Register a handler for `PUT` requests matching `uri`.
    fn put(&mut self, uri: &str, handler: impl IntoHandler, middleware: &[MiddlewareHandler]) {
        self.handle(Method::Put, uri, handler.into_handler(), middleware);
    }

    /// Register a handler for `PATCH` requests matching `uri`.
    fn patch(&mut self, uri: &str, handler: impl IntoHandler, middleware: &[MiddlewareHandler]) {
        self.handle(Method::Patch, uri, handler.into_handler(), middleware);
    }

    /// Register a handler for `DELETE` requests matching `uri`.
    fn delete(&mut self, uri: &str, handler: impl IntoHandler, middleware: &[MiddlewareHandler]) {
        self.handle(Method::Delete, uri, handler.into_handler(), middleware);
    }

    /// Appends `middleware` to this scope's chain. Routes registered earlier
    /// are not affected.
    fn middleware(&mut self, middleware: MiddlewareHandler) -> &mut Self
    where
        Self: Sized,
    {
        let chain = self.scope().chain;
        *chain = chain.append([middleware]);
        self
    }

    /// A scope under `prefix + path` that inherits the current chain.
    fn subrouter(&mut self, path: &str) -> Subrouter<'_> {
        let Scope {
            table,
            chain,
            prefix,
        } = self.scope();
        Subrouter {
            prefix: join_path(prefix, path),
            chain: chain.clone(),
            table,
        }
    }

    /// A scope under `prefix + path` that starts with an empty chain.
    fn flush_middleware(&mut self, path: &str) -> Subrouter<'_> {
        let Scope { table, prefix, .. } = self.scope();
        Subrouter {
            prefix: join_path(prefix, path),
            chain: MiddlewareChain::default(),
            table,
        }
    }

    /// Registers the six CRUD routes of `controller`:
    ///
    /// | Method   | Path        | Action    |
    /// |----------|-------------|-----------|
    /// | `GET`    | `path`      | `index`   |
    /// | `POST`   | `path`      | `store`   |
    /// | `GET`    | `path/:id`  | `show`    |
    /// | `PUT`    | `path/:id`  | `update`  |
    /// | `PATCH`  | `path/:id`  | `apply`   |
    /// | `DELETE` | `path/:id`  | `destroy` |
    fn resource<R>(&mut self, path: &str, id: &str, controller: R, middleware: &[MiddlewareHandler])
    where
        R: Resourcer,
        Self: Sized,
    {
        let controller = Arc::new(controller);
        let item = join_path(path, &format!(":{id}"));

        self.get(path, action(&controller, |c, ctx| async move { c.index(ctx).await }), middleware);
        self.post(path, action(&controller, |c, ctx| async move { c.store(ctx).await }), middleware);
        self.get(&item, action(&controller, |c, ctx| async move { c.show(ctx).await }), middleware);
        self.put(&item, action(&controller, |c, ctx| async move { c.update(ctx).await }), middleware);
        self.patch(&item, action(&controller, |c, ctx| async move { c.apply(ctx).await }), middleware);
        self.delete(&item, action(&controller, |c, ctx| async move { c.destroy(ctx).await }), middleware);
    }

    /// Serves the files below `dir` for `GET uri/*`.
    ///
    /// `dir` is used as given when it exists, otherwise it is looked up next
    /// to the running executable. Static routes bypass the middleware chain.
    fn static_files(&mut self, uri: &str, dir: impl AsRef<Path>) -> Result<(), RouterError>
    where
        Self: Sized,
    {
        let root = static_files::resolve_dir(dir.as_ref())?;
        let Scope { table, prefix, .. } = self.scope();
        let url = join_path(prefix, uri);
        let pattern = if url == "/" {
            "/*".to_string()
        } else {
            format!("{url}/*")
        };

        debug!(path = %pattern, dir = %root.display(), "static directory registered");
        table.push(Route::new(
            Method::Get,
            &pattern,
            static_files::handler(root),
            FormatRule::Fixed(Format::Json),
        ));
        table.endpoints.push(Endpoint::new(Method::Get, pattern));
        Ok(())
    }

    /// Maps `sentinel` to `status` unless it is already mapped.
    ///
    /// Returns `false` and leaves the map untouched when a mapping exists.
    fn apply_error_code(&mut self, sentinel: Sentinel, status: StatusCode) -> bool {
        let table = self.scope().table;
        Arc::make_mut(&mut table.errors).apply_error_code(sentinel, status)
    }
}

fn action<R, F, Fut>(controller: &Arc<R>, f: F) -> impl IntoHandler
where
    R: Send + Sync + 'static,
    F: Fn(Arc<R>, Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    let controller = Arc::clone(controller);
    move |ctx: Context| f(Arc::clone(&controller), ctx)
}

/// HTTP request router that dispatches requests to registered handler functions.
///
/// Routes are evaluated in registration order; the first route whose HTTP method and path
/// pattern both match the incoming request is used. When no route matches, the `not found`
/// error is rendered with status `404`.
///
/// # Examples
///
/// ```rust,no_run
/// use restkit::{Context, Mux, Router};
///
/// let mut router = Router::new();
///
/// router.get("/ping", |ctx: Context| async move { ctx.ok("pong") }, &[]);
///
/// router.get("/users/:id", |ctx: Context| async move {
///     let id = ctx.param("id").unwrap_or("unknown").to_owned();
///     ctx.ok(&id)
/// }, &[]);
/// ```
pub struct Router {
    table: RouteTable,
    chain: MiddlewareChain,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    /// Create a new, empty `Router` with no registered routes and the default error map.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use restkit::Router;
    ///
    /// let router = Router::new();
    /// assert!(router.is_empty());
    /// ```
    pub fn new() -> Self {
        Self {
            table: RouteTable::new(),
            chain: MiddlewareChain::default(),
        }
    }

    /// Pretty-print rendered payloads.
    pub fn set_pretty(&mut self, pretty: bool) {
        self.table.pretty = pretty;
    }

    /// One record per registration call, in registration order.
    pub fn endpoints(&self) -> &[Endpoint] {
        &self.table.endpoints
    }

    /// The sentinel-to-status table handed to every dispatched request.
    pub fn error_map(&self) -> &ErrorMap {
        &self.table.errors
    }

    /// Return the number of physical routes, including format variants.
    pub fn len(&self) -> usize {
        self.table.routes.len()
    }

    /// Return `true` if no routes have been registered.
    pub fn is_empty(&self) -> bool {
        self.table.routes.is_empty()
    }

    /// Dispatch `request` to the first matching route and return its response.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use restkit::{Context, Mux, Router, StatusCode};
    ///
    /// # async fn example(request: restkit::Request) {
    /// let mut router = Router::new();
    /// router.get("/ping", |ctx: Context| async move { ctx.ok("pong") }, &[]);
    ///
    /// let response = router.route(request).await;
    /// assert_eq!(response.status(), StatusCode::Ok);
    /// # }
    /// ```
    pub async fn route(&self, request: Request) -> Response {
        let matched = self
            .table
            .routes
            .iter()
            .find_map(|route| route.matches(request.method(), request.path()).map(|hit| (route, hit)));

        match matched {
            Some((route, (params, format))) => {
                let ctx = self.context(request, params, format);
                (route.handler)(ctx).await
            }
            None => {
                let format = Format::from_trailing_param(request.path());
                let ctx = self.context(request, Parameters::new(), format);
                ctx.write_error(&Error::from(Sentinel::NOT_FOUND))
            }
        }
    }

    fn context(&self, request: Request, params: Parameters, format: Format) -> Context {
        Context::dispatched(
            request,
            params,
            format,
            self.table.pretty,
            Arc::clone(&self.table.errors),
        )
    }
}

impl private::Sealed for Router {
    fn scope(&mut self) -> Scope<'_> {
        Scope {
            table: &mut self.table,
            chain: &mut self.chain,
            prefix: "",
        }
    }
}

impl Mux for Router {}

/// A registration scope borrowed from a [`Router`].
///
/// Created by [`Mux::subrouter`] and [`Mux::flush_middleware`]. Routes
/// registered through it land in the parent router's table under the
/// scope's prefix.
pub struct Subrouter<'r> {
    table: &'r mut RouteTable,
    chain: MiddlewareChain,
    prefix: String,
}

impl Subrouter<'_> {
    /// The cleaned path prefix every route in this scope is registered under.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl private::Sealed for Subrouter<'_> {
    fn scope(&mut self) -> Scope<'_> {
        Scope {
            table: &mut *self.table,
            chain: &mut self.chain,
            prefix: &self.prefix,
        }
    }
}

impl Mux for Subrouter<'_> {}
