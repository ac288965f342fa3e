//! Library browsing routes.
//!
//! - `GET /media` - every playable item
//! - `GET /media/{media_id}` - one item

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use cactustv_av::DEFAULT_QUALITY;
use cactustv_common::{Error, MediaId, MediaItem};

use crate::server::error::AppError;
use crate::server::AppContext;
use crate::streaming::StreamingService;

pub fn media_routes() -> Router<AppContext> {
    Router::new()
        .route("/media", get(list_media))
        .route("/media/:media_id", get(get_media))
}

/// A catalog entry as exposed to clients. The source path stays private.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MediaResponse {
    id: MediaId,
    title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration: Option<f64>,
    /// Manifest URL at the default quality.
    stream_url: String,
}

impl MediaResponse {
    fn new(ctx: &AppContext, item: MediaItem) -> Self {
        let key = StreamingService::stream_key(&item.id, DEFAULT_QUALITY);
        Self {
            stream_url: ctx.streaming.stream_path(&key),
            id: item.id,
            title: item.title,
            duration: item.duration,
        }
    }
}

async fn list_media(State(ctx): State<AppContext>) -> Result<Json<Vec<MediaResponse>>, AppError> {
    let items = ctx.catalog.list().await?;
    Ok(Json(
        items
            .into_iter()
            .map(|item| MediaResponse::new(&ctx, item))
            .collect(),
    ))
}

async fn get_media(
    State(ctx): State<AppContext>,
    Path(media_id): Path<String>,
) -> Result<Json<MediaResponse>, AppError> {
    let media_id = MediaId::parse(media_id)?;
    let item = ctx
        .catalog
        .lookup(&media_id)
        .await?
        .ok_or_else(|| Error::not_found("media", &media_id))?;
    Ok(Json(MediaResponse::new(&ctx, item)))
}
