use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};

use crate::web::AppState;

/// Serve a channel playlist directly; 404 until the encoder has produced
/// its first one. Segment requests fall through to the static file tree.
pub async fn serve_playlist(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
) -> Response {
    if channel_id.contains("..") || channel_id.contains('/') {
        return (StatusCode::BAD_REQUEST, "invalid channel id").into_response();
    }

    let playlist = state
        .storage
        .hls_path
        .join(&channel_id)
        .join("index.m3u8");

    match tokio::fs::read(&playlist).await {
        Ok(contents) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/vnd.apple.mpegurl")],
            contents,
        )
            .into_response(),
        Err(_) => (StatusCode::NOT_FOUND, "Stream not available").into_response(),
    }
}
