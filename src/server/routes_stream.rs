//! Playback routes.
//!
//! - `GET /play/{media_id}?quality=` - prepare, then redirect to the manifest
//! - `GET /play/{media_id}/{quality}/index.m3u8` - prepare and serve the manifest
//! - `GET /play/{media_id}/{quality}/{segment}` - serve a segment
//! - `GET /streams` - running transcodes
//! - `DELETE /streams/{media_id}` - stop transcodes and drop their segments

use std::path::Path as FsPath;

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tokio_util::io::ReaderStream;

use cactustv_av::{DEFAULT_QUALITY, MANIFEST_NAME};
use cactustv_common::paths::{is_stream_file, stream_content_type};
use cactustv_common::MediaId;

use crate::server::error::AppError;
use crate::server::AppContext;

pub fn stream_routes() -> Router<AppContext> {
    Router::new()
        .route("/play/:media_id", get(play))
        .route("/play/:media_id/:quality/:file", get(stream_file))
        .route("/streams", get(list_streams))
        .route("/streams/:media_id", axum::routing::delete(kill_stream))
}

#[derive(Debug, Deserialize)]
struct PlayQuery {
    quality: Option<String>,
}

/// Media ids may be requested as `<id>.m3u8`.
fn parse_media_id(raw: &str) -> Result<MediaId, AppError> {
    let raw = raw.strip_suffix(".m3u8").unwrap_or(raw);
    Ok(MediaId::parse(raw)?)
}

async fn play(
    State(ctx): State<AppContext>,
    Path(media_id): Path<String>,
    Query(query): Query<PlayQuery>,
) -> Result<Redirect, AppError> {
    let media_id = parse_media_id(&media_id)?;
    let quality = query.quality.as_deref().unwrap_or(DEFAULT_QUALITY);

    let stream_path = ctx.streaming.prepare_stream(&media_id, quality).await?;
    Ok(Redirect::temporary(&stream_path))
}

async fn stream_file(
    State(ctx): State<AppContext>,
    Path((media_id, quality, file)): Path<(String, String, String)>,
) -> Result<Response, AppError> {
    if file == MANIFEST_NAME {
        let media_id = MediaId::parse(media_id)?;
        ctx.streaming.prepare_stream(&media_id, &quality).await?;
        let path = ctx.streaming.segment_path(&media_id, &quality, MANIFEST_NAME)?;
        return Ok(serve_file(&path, "no-cache").await);
    }

    let Ok(media_id) = MediaId::parse(media_id) else {
        return Ok(segment_not_found());
    };
    match ctx.streaming.segment_path(&media_id, &quality, &file) {
        Ok(path) if is_stream_file(&path) => Ok(serve_file(&path, "max-age=3600").await),
        _ => Ok(segment_not_found()),
    }
}

/// Stream a file from the segment store, or a plain 404 if it is missing.
async fn serve_file(path: &FsPath, cache_control: &'static str) -> Response {
    let file = match tokio::fs::File::open(path).await {
        Ok(f) => f,
        Err(_) => return segment_not_found(),
    };
    let len = match file.metadata().await {
        Ok(m) if m.is_file() => m.len(),
        _ => return segment_not_found(),
    };

    let body = Body::from_stream(ReaderStream::new(file));
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, stream_content_type(path))
        .header(header::CONTENT_LENGTH, len.to_string())
        .header(header::CACHE_CONTROL, cache_control)
        .body(body)
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

fn segment_not_found() -> Response {
    (StatusCode::NOT_FOUND, "Segment not found").into_response()
}

async fn list_streams(State(ctx): State<AppContext>) -> impl IntoResponse {
    Json(ctx.streaming.active_sessions())
}

async fn kill_stream(
    State(ctx): State<AppContext>,
    Path(media_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let media_id = parse_media_id(&media_id)?;
    // Reclaim finishes in the background.
    drop(ctx.streaming.kill_stream(&media_id));
    Ok(StatusCode::NO_CONTENT)
}
