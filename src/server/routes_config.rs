//! Playback settings API routes.

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;

use cactustv_av::profiles;
use cactustv_common::{AccelerationMode, PlaybackSettings, PlaybackSettingsPatch};

use crate::server::AppContext;

pub fn config_routes() -> Router<AppContext> {
    Router::new().route("/config/playback", get(get_playback).put(update_playback))
}

/// Settings plus the effective encoder choice they lead to.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PlaybackResponse {
    #[serde(flatten)]
    settings: PlaybackSettings,
    configured_mode: AccelerationMode,
    effective_mode: AccelerationMode,
    qualities: Vec<&'static str>,
}

impl PlaybackResponse {
    fn new(ctx: &AppContext, settings: PlaybackSettings) -> Self {
        let configured = ctx.config.streaming.hwaccel;
        Self {
            settings,
            configured_mode: configured,
            effective_mode: AccelerationMode::effective(configured, &settings),
            qualities: profiles::labels().collect(),
        }
    }
}

async fn get_playback(State(ctx): State<AppContext>) -> impl IntoResponse {
    let settings = ctx.settings.get();
    Json(PlaybackResponse::new(&ctx, settings))
}

async fn update_playback(
    State(ctx): State<AppContext>,
    Json(patch): Json<PlaybackSettingsPatch>,
) -> impl IntoResponse {
    let settings = ctx.settings.update(patch);
    Json(PlaybackResponse::new(&ctx, settings))
}
