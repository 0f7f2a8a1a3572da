//! Report UI assets, embedded and served by the panel.
//!
//! `rust-embed` bakes the `ui/` directory into the binary (the
//! `debug-embed` feature keeps that true for debug builds too), so the
//! panel stays a single self-contained executable.

use axum::{
    Router,
    extract::Path,
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use rust_embed::Embed;

#[derive(Embed)]
#[folder = "ui/"]
struct UiAssets;

/// Router serving the embedded report UI.
///
/// Merge this **after** `/ws` and `/health` so those routes win over the
/// catch-all.
pub fn ui_router() -> Router {
    Router::new()
        .route("/", get(|| async { asset_response("index.html") }))
        .route("/{*path}", get(asset_handler))
}

async fn asset_handler(Path(path): Path<String>) -> Response {
    if UiAssets::get(&path).is_some() {
        asset_response(&path)
    } else {
        // Unknown paths fall back to the page shell
        asset_response("index.html")
    }
}

fn asset_response(path: &str) -> Response {
    match UiAssets::get(path) {
        Some(asset) => {
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, mime.as_ref())],
                asset.data.into_owned(),
            )
                .into_response()
        }
        None => (StatusCode::NOT_FOUND, Html("<h1>404</h1>")).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ui_assets_present() {
        assert!(UiAssets::get("index.html").is_some());
        assert!(UiAssets::get("app.js").is_some());
        assert!(UiAssets::get("style.css").is_some());
    }

    #[test]
    fn test_missing_asset_is_none() {
        assert!(UiAssets::get("nope.js").is_none());
    }

    #[test]
    fn test_asset_response_content_type() {
        let resp = asset_response("style.css");
        assert_eq!(resp.status(), StatusCode::OK);
        let content_type = resp.headers().get(header::CONTENT_TYPE).unwrap();
        assert_eq!(content_type, "text/css");

        let resp = asset_response("nope.js");
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
