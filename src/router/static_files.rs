//! Directory serving for [`Mux::static_files`](super::Mux::static_files).
//!
//! - Path traversal prevention (rejects `..` in paths)
//! - Hidden files (names starting with `.`) are never served
//! - Directories answer with their `index.html`
//! - MIME type detection from the file extension

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use super::pattern::WILDCARD_PARAM;
use super::{Handler, IntoHandler, RouterError};
use crate::context::Context;
use crate::http::{Response, StatusCode};

const INDEX_FILE: &str = "index.html";

#[derive(Debug, Error)]
enum StaticFileError {
    #[error("404 page not found")]
    NotFound,

    #[error("403 forbidden: {0}")]
    Forbidden(&'static str),
}

impl StaticFileError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::NotFound => StatusCode::NotFound,
            Self::Forbidden(_) => StatusCode::Forbidden,
        };
        Response::new(status)
            .content_type("text/plain; charset=utf-8")
            .body(self.to_string())
    }
}

/// Resolves the directory a static route serves from.
///
/// `dir` is used as given when it exists; otherwise it is looked up next to
/// the running executable.
pub(crate) fn resolve_dir(dir: &Path) -> Result<PathBuf, RouterError> {
    if dir.is_dir() {
        return Ok(dir.to_path_buf());
    }
    let exe = std::env::current_exe().map_err(RouterError::Executable)?;
    let base = exe.parent().unwrap_or_else(|| Path::new("."));
    resolve_against(dir, base)
}

// A rooted `dir` is still taken relative to `base`, so `/public` resolves to
// `<base>/public`.
fn resolve_against(dir: &Path, base: &Path) -> Result<PathBuf, RouterError> {
    let relative: PathBuf = dir
        .components()
        .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
        .collect();
    let candidate = base.join(relative);
    if candidate.is_dir() {
        Ok(candidate)
    } else {
        Err(RouterError::StaticDir {
            dir: dir.to_path_buf(),
            fallback: candidate,
        })
    }
}

/// A handler serving files below `root` from the route's wildcard parameter.
pub(crate) fn handler(root: PathBuf) -> Handler {
    let root = Arc::new(root);
    (move |ctx: Context| {
        let root = Arc::clone(&root);
        async move {
            let requested = ctx.param(WILDCARD_PARAM).unwrap_or_default();
            match serve(&root, requested).await {
                Ok(response) => response,
                Err(err) => {
                    tracing::debug!(path = %ctx.request().path(), error = %err, "static file rejected");
                    err.into_response()
                }
            }
        }
    })
    .into_handler()
}

async fn serve(root: &Path, requested: &str) -> Result<Response, StaticFileError> {
    let mut path = root.join(sanitize(requested)?);

    let metadata = tokio::fs::metadata(&path)
        .await
        .map_err(|_| StaticFileError::NotFound)?;
    if metadata.is_dir() {
        path.push(INDEX_FILE);
    }

    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|_| StaticFileError::NotFound)?;
    Ok(Response::new(StatusCode::Ok)
        .content_type(detect_mime_type(&path))
        .body_bytes(bytes))
}

fn sanitize(requested: &str) -> Result<PathBuf, StaticFileError> {
    let mut relative = PathBuf::new();
    for segment in requested.split('/') {
        match segment {
            "" | "." => {}
            ".." => return Err(StaticFileError::Forbidden("directory traversal")),
            s if s.starts_with('.') => return Err(StaticFileError::Forbidden("hidden file")),
            s => relative.push(s),
        }
    }
    Ok(relative)
}

fn detect_mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match ext.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "json" | "map" => "application/json",
        "xml" => "application/xml",
        "yml" | "yaml" => "text/x-yaml",
        "txt" => "text/plain; charset=utf-8",
        "csv" => "text/csv; charset=utf-8",
        "md" => "text/markdown; charset=utf-8",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "wasm" => "application/wasm",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("index.html"), "<h1>home</h1>").unwrap();
        fs::write(dir.path().join(".env"), "SECRET=1").unwrap();
        fs::create_dir(dir.path().join("css")).unwrap();
        fs::write(dir.path().join("css/site.css"), "body{}").unwrap();
        dir
    }

    #[tokio::test]
    async fn serves_file_with_mime_type() {
        let dir = create_test_dir();
        let res = serve(dir.path(), "/css/site.css").await.unwrap();
        assert_eq!(res.status(), StatusCode::Ok);
        assert_eq!(res.headers().get("content-type"), Some("text/css; charset=utf-8"));
        assert_eq!(res.content(), b"body{}");
    }

    #[tokio::test]
    async fn directory_serves_index() {
        let dir = create_test_dir();
        let res = serve(dir.path(), "").await.unwrap();
        assert_eq!(res.content(), b"<h1>home</h1>");
    }

    #[tokio::test]
    async fn rejects_traversal_and_hidden_files() {
        let dir = create_test_dir();
        assert!(matches!(
            serve(dir.path(), "/../etc/passwd").await,
            Err(StaticFileError::Forbidden(_))
        ));
        assert!(matches!(
            serve(dir.path(), "/.env").await,
            Err(StaticFileError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let dir = create_test_dir();
        let err = serve(dir.path(), "/nope.txt").await.unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::NotFound);
    }

    #[test]
    fn resolve_against_falls_back_to_base() {
        let base = TempDir::new().unwrap();
        fs::create_dir(base.path().join("public")).unwrap();

        assert_eq!(
            resolve_against(Path::new("public"), base.path()).unwrap(),
            base.path().join("public")
        );
        assert_eq!(
            resolve_against(Path::new("/public"), base.path()).unwrap(),
            base.path().join("public")
        );
        assert!(matches!(
            resolve_against(Path::new("missing"), base.path()),
            Err(RouterError::StaticDir { .. })
        ));
    }

    #[test]
    fn resolve_dir_prefers_existing_path() {
        let dir = TempDir::new().unwrap();
        assert_eq!(resolve_dir(dir.path()).unwrap(), dir.path());
    }
}
