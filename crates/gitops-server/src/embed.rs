//! Dashboard assets compiled into the binary, and the router's fallback.

use axum::http::{header, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use rust_embed::Embed;

#[derive(Embed)]
#[folder = "$CARGO_MANIFEST_DIR/assets/"]
struct Dashboard;

const INDEX: &str = "index.html";

/// Handles every request the API routes did not claim.
///
/// `GET`/`HEAD` outside `/api` serve the named asset, or the dashboard page
/// for anything else. Unknown `/api` paths and other methods get a JSON 404.
pub async fn fallback(method: Method, uri: Uri) -> Response {
    let path = uri.path();
    let is_read = method == Method::GET || method == Method::HEAD;
    if !is_read || is_api_path(path) {
        return not_found(&method, path);
    }

    let name = match path.trim_start_matches('/') {
        "" => INDEX,
        other => other,
    };
    asset(name)
        .or_else(|| asset(INDEX))
        .unwrap_or_else(|| (StatusCode::NOT_FOUND, "dashboard not bundled").into_response())
}

fn is_api_path(path: &str) -> bool {
    path == "/api" || path.starts_with("/api/")
}

fn asset(name: &str) -> Option<Response> {
    let file = Dashboard::get(name)?;
    let mime = mime_guess::from_path(name).first_or_octet_stream();
    Some(([(header::CONTENT_TYPE, mime.as_ref())], file.data).into_response())
}

fn not_found(method: &Method, path: &str) -> Response {
    let body = serde_json::json!({
        "error": "NotFound",
        "message": format!("no route for {method} {path}"),
    });
    (StatusCode::NOT_FOUND, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content_type(resp: &Response) -> String {
        resp.headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    }

    #[tokio::test]
    async fn root_serves_dashboard() {
        let resp = fallback(Method::GET, Uri::from_static("/")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(content_type(&resp).starts_with("text/html"));
    }

    #[tokio::test]
    async fn unknown_page_falls_back_to_dashboard() {
        let resp = fallback(Method::GET, Uri::from_static("/deployments/latest")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(content_type(&resp).starts_with("text/html"));
    }

    #[tokio::test]
    async fn unknown_api_path_is_json_404() {
        let resp = fallback(Method::GET, Uri::from_static("/api/nonexistent")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert!(content_type(&resp).contains("application/json"));
    }

    #[tokio::test]
    async fn writes_outside_api_are_json_404() {
        let resp = fallback(Method::POST, Uri::from_static("/index.html")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert!(content_type(&resp).contains("application/json"));
    }

    #[test]
    fn api_prefix_matches_whole_segment() {
        assert!(is_api_path("/api"));
        assert!(is_api_path("/api/status"));
        assert!(!is_api_path("/apidocs"));
    }
}
