//! # restkit
//!
//! A toolkit for RESTful HTTP/1.1 API services: format-aware routing,
//! immutable middleware chains, generic CRUD controllers over a [`Model`],
//! and JSON / JSONP / XML / YAML rendering with sentinel-to-status error
//! translation.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use restkit::{Context, Mux, Router, Server};
//! use restkit::middleware::{LoggerMiddleware, from_middleware};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut router = Router::new();
//!     router.middleware(from_middleware(Arc::new(LoggerMiddleware)));
//!
//!     // GET /hello, /hello.json, /hello.xml and /hello.yml
//!     router.get("/hello", |ctx: Context| async move { ctx.ok("Hello, World!") }, &[]);
//!
//!     let server = Server::bind("127.0.0.1:8080").await?;
//!     server.serve(router).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod http;
pub mod middleware;
pub mod model;
pub mod render;
pub mod resource;
pub mod router;
pub mod security;
pub mod server;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use config::{Config, ConfigError};
pub use context::Context;
pub use error::{Error, ErrorMap, Sentinel};
pub use http::{Headers, Method, Request, Response, StatusCode};
pub use model::Model;
pub use render::Format;
pub use resource::{Resource, Resourcer};
pub use router::{Mux, Router, RouterError, Subrouter};
pub use server::{Server, ServerError};
