use axum::{
    Json,
    body::Body,
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::warn;

use super::super::AppState;
use crate::core::engine::{ContentKind, Lookup};

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "success": false, "error": "Content not found" })),
    )
        .into_response()
}

fn upstream_failure(error: String) -> Response {
    (
        StatusCode::BAD_GATEWAY,
        Json(json!({ "success": false, "error": error })),
    )
        .into_response()
}

/// Mime type from a file name's extension.
fn guess_mime(name: &str) -> Option<String> {
    mime_guess::from_path(name.trim_matches('"'))
        .first()
        .map(|m| m.essence_str().to_string())
}

/// Streams the content bytes through, keeping the engine's content type
/// and file name.
async fn proxy(state: &AppState, content_id: &str, inline: bool) -> Response {
    let download = match state.engine.content_data(content_id).await {
        Lookup::Found(download) => download,
        Lookup::NotFound => return not_found(),
        Lookup::Failed(e) => {
            warn!("Content {} unavailable: {}", content_id, e);
            return upstream_failure(e);
        }
    };

    let content_type = download
        .content_type
        .clone()
        .or_else(|| guess_mime(download.filename.as_deref()?))
        .unwrap_or_else(|| "application/octet-stream".to_string());
    let disposition = download.disposition(inline);
    let mut response = Body::from_stream(download.response.bytes_stream()).into_response();
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&content_type) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    response
}

pub async fn download_content(
    State(state): State<AppState>,
    Path(content_id): Path<String>,
) -> Response {
    proxy(&state, &content_id, false).await
}

pub async fn stream_content(
    State(state): State<AppState>,
    Path(content_id): Path<String>,
) -> Response {
    proxy(&state, &content_id, true).await
}

/// What the viewer needs to decide how to render an item.
pub async fn view_content(
    State(state): State<AppState>,
    Path(content_id): Path<String>,
) -> Response {
    let meta = match state.engine.content_metadata(&content_id).await {
        Lookup::Found(meta) => meta,
        Lookup::NotFound => return not_found(),
        Lookup::Failed(e) => return upstream_failure(e),
    };
    let mime_type = meta
        .mime_type
        .clone()
        .filter(|m| !m.trim().is_empty())
        .or_else(|| guess_mime(meta.name.as_deref()?))
        .unwrap_or_default();
    let kind = ContentKind::classify(&mime_type);
    Json(json!({
        "success": true,
        "content_id": content_id,
        "name": meta.name,
        "mime_type": mime_type,
        "kind": kind,
        "viewable": kind.is_viewable(),
        "stream_url": format!("/api/content/{}/stream", urlencoding::encode(&content_id)),
        "download_url": format!("/api/content/{}", urlencoding::encode(&content_id)),
    }))
    .into_response()
}
