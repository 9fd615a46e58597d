use std::collections::BTreeMap;
use std::sync::Arc;

use crate::{
    StatusCode,
    context::Context,
    error::{Error, Sentinel},
    http::Request,
    middleware::{Middleware, Next, from_middleware},
    router::{BoxFuture, Mux},
};

/// Raised when a request carries no API key, an unknown key, or a key used
/// from a host it is not registered for.
pub const INVALID_KEY: Sentinel = Sentinel::new("invalid key");

/// Header carrying the API key.
pub const KEY_HEADER: &str = "X-API-Key";

/// Query parameter carrying the API key when the header is absent.
pub const KEY_PARAM: &str = "key";

/// API-key middleware.
///
/// Every request must present a known key, in the `X-API-Key` header or the
/// `key` query parameter. A key registered with a non-empty host list is
/// only accepted when the request's `Host` header (port ignored) is one of
/// them.
///
/// # Examples
///
/// ```rust,no_run
/// use std::collections::BTreeMap;
/// use restkit::Router;
/// use restkit::security::KeysMiddleware;
///
/// let mut keys = BTreeMap::new();
/// keys.insert("k-123".to_string(), vec![]);
/// keys.insert("k-456".to_string(), vec!["api.example.com".to_string()]);
///
/// let mut router = Router::new();
/// KeysMiddleware::new(keys).install(&mut router);
/// ```
pub struct KeysMiddleware {
    keys: Arc<BTreeMap<String, Vec<String>>>,
}

impl KeysMiddleware {
    pub fn new(keys: BTreeMap<String, Vec<String>>) -> Self {
        Self {
            keys: Arc::new(keys),
        }
    }

    /// Maps [`INVALID_KEY`] to `401 Unauthorized` (unless already mapped) and
    /// appends this middleware to `mux`'s chain.
    pub fn install<M: Mux>(self, mux: &mut M) {
        mux.apply_error_code(INVALID_KEY, StatusCode::Unauthorized);
        mux.middleware(from_middleware(Arc::new(self)));
    }

    fn authorize(&self, request: &Request) -> Result<(), Error> {
        let key = request
            .headers()
            .get(KEY_HEADER)
            .or_else(|| request.query_param(KEY_PARAM))
            .filter(|key| !key.is_empty())
            .ok_or(INVALID_KEY)?;

        let hosts = self.keys.get(key).ok_or(INVALID_KEY)?;
        if hosts.is_empty() {
            return Ok(());
        }

        let host = request
            .headers()
            .get("host")
            .map(strip_port)
            .unwrap_or_default();
        if hosts.iter().any(|allowed| allowed.eq_ignore_ascii_case(host)) {
            Ok(())
        } else {
            Err(INVALID_KEY.into())
        }
    }
}

fn strip_port(host: &str) -> &str {
    match host.rsplit_once(':') {
        Some((name, port)) if port.bytes().all(|b| b.is_ascii_digit()) => name,
        _ => host,
    }
}

impl Middleware for KeysMiddleware {
    fn handle(&self, ctx: Context, next: Next) -> BoxFuture {
        let verdict = self.authorize(ctx.request());

        Box::pin(async move {
            match verdict {
                Ok(()) => next.run(ctx).await,
                Err(err) => {
                    tracing::debug!(path = %ctx.request().path(), "api key rejected");
                    ctx.write_error(&err)
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Response, Router};

    fn router() -> Router {
        let mut keys = BTreeMap::new();
        keys.insert("open".to_string(), vec![]);
        keys.insert("locked".to_string(), vec!["api.example.com".to_string()]);

        let mut router = Router::new();
        KeysMiddleware::new(keys).install(&mut router);
        router.get("/notes", |_ctx: Context| async { Response::new(StatusCode::Ok) }, &[]);
        router
    }

    async fn status(router: &Router, path: &str, headers: &str) -> StatusCode {
        let raw = format!("GET {path} HTTP/1.1\r\n{headers}\r\n");
        let (req, _) = Request::parse(raw.as_bytes()).unwrap();
        router.route(req).await.status()
    }

    #[tokio::test]
    async fn missing_or_unknown_key_is_unauthorized() {
        let router = router();
        assert_eq!(status(&router, "/notes", "Host: x\r\n").await, StatusCode::Unauthorized);
        assert_eq!(
            status(&router, "/notes", "X-API-Key: nope\r\n").await,
            StatusCode::Unauthorized
        );
    }

    #[tokio::test]
    async fn key_from_header_or_query() {
        let router = router();
        assert_eq!(status(&router, "/notes", "X-API-Key: open\r\n").await, StatusCode::Ok);
        assert_eq!(status(&router, "/notes.json?key=open", "").await, StatusCode::Ok);
        assert_eq!(status(&router, "/notes?key=%6Fpen", "").await, StatusCode::Ok);
    }

    #[tokio::test]
    async fn host_list_restricts_key() {
        let router = router();
        assert_eq!(
            status(&router, "/notes", "Host: api.example.com:8080\r\nX-API-Key: locked\r\n").await,
            StatusCode::Ok
        );
        assert_eq!(
            status(&router, "/notes", "Host: evil.example.com\r\nX-API-Key: locked\r\n").await,
            StatusCode::Unauthorized
        );
    }

    #[test]
    fn install_keeps_existing_mapping() {
        let mut router = Router::new();
        router.apply_error_code(INVALID_KEY, StatusCode::Forbidden);
        KeysMiddleware::new(BTreeMap::new()).install(&mut router);
        assert_eq!(router.error_map().get(INVALID_KEY), Some(StatusCode::Forbidden));
    }
}
