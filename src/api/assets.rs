//! Embedded static assets for production builds
//!
//! In development, falls back to serving from filesystem.

use axum::{
    body::Body,
    extract::Path,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use rust_embed::Embed;
use std::path::PathBuf;

#[derive(Embed)]
#[folder = "ui"]
struct Assets;

const UI_DIR: &str = "ui";

fn load(path: &str) -> Option<Vec<u8>> {
    if let Some(content) = Assets::get(path) {
        return Some(content.data.into_owned());
    }
    // Asset paths come from the URL; never leave the ui directory
    if path.split('/').any(|part| part == "..") {
        return None;
    }
    std::fs::read(PathBuf::from(UI_DIR).join(path)).ok()
}

/// Serve embedded static files, with filesystem fallback for development
pub async fn serve_static(Path(path): Path<String>) -> Response {
    let path = path.trim_start_matches('/');

    match load(path) {
        Some(content) => {
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, mime.as_ref().to_string())],
                Body::from(content),
            )
                .into_response()
        }
        None => (StatusCode::NOT_FOUND, "Not found").into_response(),
    }
}

/// Get an HTML page (embedded or from filesystem)
pub fn get_page(name: &str) -> Option<String> {
    load(name).and_then(|bytes| String::from_utf8(bytes).ok())
}
