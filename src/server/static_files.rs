//! Static file serving with path-traversal protection and reload-client
//! injection.

use std::path::{Component, Path, PathBuf};

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderValue, Method, Request, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use percent_encoding::percent_decode_str;
use tracing::{debug, error, warn};

use super::AppState;
use crate::reload::inject_into_html;

/// File served for directory requests.
pub const INDEX_FILE: &str = "index.html";

/// Per-request failure. Never escapes the server.
#[derive(Debug)]
pub enum ServeError {
    /// Nothing at the requested path.
    NotFound,
    /// The request tried to leave the served root.
    Forbidden,
    /// The file exists but could not be read.
    InternalError(std::io::Error),
}

impl std::fmt::Display for ServeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "not found"),
            Self::Forbidden => write!(f, "forbidden"),
            Self::InternalError(e) => write!(f, "internal error: {}", e),
        }
    }
}

impl std::error::Error for ServeError {}

impl ServeError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServeError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match status {
            StatusCode::NOT_FOUND => "404 Not Found",
            StatusCode::FORBIDDEN => "403 Forbidden",
            _ => "500 Internal Server Error",
        };
        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            body,
        )
            .into_response()
    }
}

/// Resolve a URI path against `root` without touching the filesystem.
///
/// Percent-decodes the path and normalises `.`/`..` segments lexically.
/// Anything that would climb above `root`, or that smuggles a NUL byte,
/// backslash or drive prefix, is `Forbidden`.
pub fn resolve_request_path(root: &Path, uri_path: &str) -> Result<PathBuf, ServeError> {
    let decoded = percent_decode_str(uri_path)
        .decode_utf8()
        .map_err(|_| ServeError::NotFound)?;

    if decoded.contains('\0') || decoded.contains('\\') {
        return Err(ServeError::Forbidden);
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(ServeError::Forbidden);
                }
            }
            s => {
                // A segment must stay a single plain component (no `C:`).
                let mut components = Path::new(s).components();
                match (components.next(), components.next()) {
                    (Some(Component::Normal(_)), None) => segments.push(s),
                    _ => return Err(ServeError::Forbidden),
                }
            }
        }
    }

    let mut resolved = root.to_path_buf();
    resolved.extend(segments);
    Ok(resolved)
}

/// Make sure an existing path still lives under the (canonical) root once
/// symlinks are followed.
async fn ensure_within_root(root: &Path, path: &Path) -> Result<PathBuf, ServeError> {
    let canonical = match tokio::fs::canonicalize(path).await {
        Ok(p) => p,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(ServeError::NotFound),
        Err(e) => return Err(ServeError::InternalError(e)),
    };

    if canonical.starts_with(root) {
        Ok(canonical)
    } else {
        Err(ServeError::Forbidden)
    }
}

/// What a request resolved to.
enum Resolved {
    File(PathBuf),
    /// Directory requested without a trailing slash.
    Redirect(String),
}

async fn locate(state: &AppState, uri_path: &str) -> Result<Resolved, ServeError> {
    let candidate = resolve_request_path(&state.root, uri_path)?;
    let path = ensure_within_root(&state.root, &candidate).await?;

    let metadata = tokio::fs::metadata(&path)
        .await
        .map_err(ServeError::InternalError)?;

    if !metadata.is_dir() {
        return Ok(Resolved::File(path));
    }

    if !uri_path.ends_with('/') {
        return Ok(Resolved::Redirect(format!("{uri_path}/")));
    }

    let index = ensure_within_root(&state.root, &path.join(INDEX_FILE)).await?;
    Ok(Resolved::File(index))
}

fn is_html(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("html") || e.eq_ignore_ascii_case("htm"))
}

fn mime_for(path: &Path) -> HeaderValue {
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    let essence = mime.essence_str();
    let value = if mime.type_() == mime_guess::mime::TEXT || essence == "application/javascript" {
        format!("{essence}; charset=utf-8")
    } else {
        essence.to_string()
    };
    HeaderValue::from_str(&value).unwrap_or(HeaderValue::from_static("application/octet-stream"))
}

async fn serve(state: &AppState, uri: &Uri, head_only: bool) -> Result<Response, ServeError> {
    let path = match locate(state, uri.path()).await? {
        Resolved::File(path) => path,
        Resolved::Redirect(location) => {
            let location = match uri.query() {
                Some(query) => format!("{location}?{query}"),
                None => location,
            };
            return Ok((
                StatusCode::MOVED_PERMANENTLY,
                [(header::LOCATION, location)],
            )
                .into_response());
        }
    };

    let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ServeError::NotFound,
        _ => ServeError::InternalError(e),
    })?;

    let body = if state.inject_script && is_html(&path) {
        inject_into_html(&bytes)
    } else {
        bytes
    };

    let builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, mime_for(&path))
        .header(header::CONTENT_LENGTH, body.len())
        .header(header::CACHE_CONTROL, "no-cache");

    if head_only {
        return builder
            .body(Body::empty())
            .map_err(|e| ServeError::InternalError(std::io::Error::other(e)));
    }

    builder
        .body(Body::from(body))
        .map_err(|e| ServeError::InternalError(std::io::Error::other(e)))
}

/// Fallback handler: serve a file from the session root.
pub async fn serve_file(State(state): State<AppState>, req: Request<Body>) -> Response {
    let head_only = match *req.method() {
        Method::GET => false,
        Method::HEAD => true,
        _ => {
            return (
                StatusCode::METHOD_NOT_ALLOWED,
                [(header::ALLOW, "GET, HEAD")],
            )
                .into_response()
        }
    };

    let uri_path = req.uri().path();
    match serve(&state, req.uri(), head_only).await {
        Ok(response) => response,
        Err(err) => {
            match &err {
                ServeError::NotFound => debug!(path = %uri_path, "File not found"),
                ServeError::Forbidden => warn!(path = %uri_path, "Rejected path outside root"),
                ServeError::InternalError(e) => {
                    error!(path = %uri_path, error = %e, "Failed to read file")
                }
            }
            err.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> PathBuf {
        PathBuf::from("/srv/site")
    }

    #[test]
    fn test_resolve_simple() {
        let p = resolve_request_path(&root(), "/css/style.css").unwrap();
        assert_eq!(p, PathBuf::from("/srv/site/css/style.css"));
    }

    #[test]
    fn test_resolve_root() {
        assert_eq!(resolve_request_path(&root(), "/").unwrap(), root());
    }

    #[test]
    fn test_resolve_dot_segments_inside_root() {
        let p = resolve_request_path(&root(), "/a/./b/../c.html").unwrap();
        assert_eq!(p, PathBuf::from("/srv/site/a/c.html"));
    }

    #[test]
    fn test_resolve_traversal_forbidden() {
        assert!(matches!(
            resolve_request_path(&root(), "/../../etc/passwd"),
            Err(ServeError::Forbidden)
        ));
        assert!(matches!(
            resolve_request_path(&root(), "/a/../../secret"),
            Err(ServeError::Forbidden)
        ));
    }

    #[test]
    fn test_resolve_encoded_traversal_forbidden() {
        assert!(matches!(
            resolve_request_path(&root(), "/%2e%2e/%2e%2e/etc/passwd"),
            Err(ServeError::Forbidden)
        ));
        assert!(matches!(
            resolve_request_path(&root(), "/..%2f..%2fetc/passwd"),
            Err(ServeError::Forbidden)
        ));
        assert!(matches!(
            resolve_request_path(&root(), "/..%5c..%5cwindows"),
            Err(ServeError::Forbidden)
        ));
    }

    #[test]
    fn test_resolve_nul_forbidden() {
        assert!(matches!(
            resolve_request_path(&root(), "/index.html%00.png"),
            Err(ServeError::Forbidden)
        ));
    }

    #[test]
    fn test_resolve_decodes_spaces() {
        let p = resolve_request_path(&root(), "/my%20page.html").unwrap();
        assert_eq!(p, PathBuf::from("/srv/site/my page.html"));
    }

    #[test]
    fn test_mime_types() {
        assert_eq!(
            mime_for(Path::new("a.html")).to_str().unwrap(),
            "text/html; charset=utf-8"
        );
        assert_eq!(
            mime_for(Path::new("a.css")).to_str().unwrap(),
            "text/css; charset=utf-8"
        );
        assert_eq!(mime_for(Path::new("a.png")).to_str().unwrap(), "image/png");
        assert_eq!(
            mime_for(Path::new("blob")).to_str().unwrap(),
            "application/octet-stream"
        );
    }

    #[test]
    fn test_is_html() {
        assert!(is_html(Path::new("index.HTML")));
        assert!(is_html(Path::new("old.htm")));
        assert!(!is_html(Path::new("style.css")));
    }

    #[test]
    fn test_serve_error_status() {
        assert_eq!(ServeError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(ServeError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            ServeError::InternalError(std::io::Error::other("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
