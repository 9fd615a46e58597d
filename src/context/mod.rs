//! Per-request context: path parameters, negotiated format and rendering.
//!
//! The router builds one [`Context`] per matched request. Besides the parsed
//! [`Request`] it carries everything a handler needs to answer in the format
//! the client asked for:
//!
//! - the path parameters captured by the route pattern,
//! - the output [`Format`] chosen for the route (or from the trailing parameter),
//! - the router's pretty-print setting,
//! - the frozen [`ErrorMap`] used to turn errors into status codes,
//! - a type-keyed [`Extensions`] map middleware can use to hand state downstream.

use std::{
    any::{Any, TypeId},
    collections::HashMap,
    sync::Arc,
};

use serde::Serialize;

use crate::error::{Error, ErrorMap};
use crate::http::{Request, Response, StatusCode};
use crate::render::{self, Format};

/// Type-erased request extensions map.
#[derive(Default)]
pub struct Extensions {
    map: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value`, replacing any previous value of the same type.
    pub fn insert<T>(&mut self, value: T)
    where
        T: Send + Sync + 'static,
    {
        self.map.insert(TypeId::of::<T>(), Box::new(value));
    }

    pub fn get<T>(&self) -> Option<&T>
    where
        T: Send + Sync + 'static,
    {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }

    pub fn remove<T>(&mut self) -> Option<T>
    where
        T: Send + Sync + 'static,
    {
        self.map
            .remove(&TypeId::of::<T>())
            .and_then(|value| value.downcast::<T>().ok())
            .map(|value| *value)
    }
}

/// Path parameters extracted from the matched route, in pattern order.
#[derive(Default, Debug, Clone)]
pub struct Parameters {
    entries: Vec<(String, String)>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces `key`.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// The last captured parameter, the one a dynamic route ends with.
    pub fn last(&self) -> Option<(&str, &str)> {
        self.entries.last().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub(crate) fn last_mut(&mut self) -> Option<&mut String> {
        self.entries.last_mut().map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Error body written by [`Context::write_error`].
#[derive(Debug, Serialize)]
#[serde(rename = "Errors")]
struct ErrorBody {
    errors: Vec<String>,
}

/// Per-request state handed to handlers and middleware.
pub struct Context {
    request: Request,
    params: Parameters,
    extensions: Extensions,
    format: Format,
    pretty: bool,
    errors: Arc<ErrorMap>,
}

impl Context {
    /// A context with no parameters, JSON output and the default error map.
    pub fn new(request: Request) -> Self {
        Self {
            request,
            params: Parameters::new(),
            extensions: Extensions::new(),
            format: Format::Json,
            pretty: false,
            errors: Arc::new(ErrorMap::new()),
        }
    }

    pub(crate) fn dispatched(
        request: Request,
        params: Parameters,
        format: Format,
        pretty: bool,
        errors: Arc<ErrorMap>,
    ) -> Self {
        Self {
            request,
            params,
            extensions: Extensions::new(),
            format,
            pretty,
            errors,
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    /// Shorthand for `ctx.params().get(name)`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    /// Output format negotiated for this request.
    pub fn format(&self) -> Format {
        self.format
    }

    pub fn pretty(&self) -> bool {
        self.pretty
    }

    pub fn error_map(&self) -> &ErrorMap {
        &self.errors
    }

    /// Renders `value` in the request's format.
    ///
    /// Serialization failures are logged and answered with the renderer's
    /// plain-text fallback.
    pub fn write_format<T>(&self, status: StatusCode, value: &T) -> Response
    where
        T: Serialize + ?Sized,
    {
        match render::format(self.format, status, self.pretty, value) {
            Ok(response) => response,
            Err(err) => {
                tracing::error!(
                    path = %self.request.path(),
                    format = ?self.format,
                    error = %err,
                    "failed to render response"
                );
                err.into_response()
            }
        }
    }

    /// Renders `value` as JSONP using the `callback` query parameter.
    ///
    /// A missing or malformed callback is answered with the `invalid jsonp`
    /// error.
    pub fn write_jsonp<T>(&self, status: StatusCode, value: &T) -> Response
    where
        T: Serialize + ?Sized,
    {
        let callback = self.request.query_param("callback").unwrap_or_default();
        match render::jsonp(status, self.pretty, callback, value) {
            Ok(response) => response,
            Err(render::RenderError::Callback(_)) => {
                self.write_error(&Error::from(crate::error::Sentinel::INVALID_JSONP))
            }
            Err(err) => {
                tracing::error!(path = %self.request.path(), error = %err, "failed to render jsonp");
                err.into_response()
            }
        }
    }

    /// Renders `err` with the status its sentinel maps to (500 if unmapped).
    pub fn write_error(&self, err: &Error) -> Response {
        let status = self.errors.status_of(err);
        if status.is_server_error() {
            tracing::error!(path = %self.request.path(), error = %err, "request failed");
        } else {
            tracing::debug!(path = %self.request.path(), error = %err, status = status.as_u16(), "request rejected");
        }

        let body = ErrorBody {
            errors: vec![err.to_string()],
        };
        self.write_format(status, &body)
    }

    /// Shorthand for `write_format(StatusCode::Ok, value)`.
    pub fn ok<T>(&self, value: &T) -> Response
    where
        T: Serialize + ?Sized,
    {
        self.write_format(StatusCode::Ok, value)
    }
}
