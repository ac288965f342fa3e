use crate::catalog::{Catalog, JsonCatalog};
use crate::config::Config;
use crate::settings::SettingsStore;
use crate::streaming::{FfmpegSupervisor, StreamingService};
use anyhow::{Context, Result};
use axum::{
    http::{header, Method},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

pub mod error;
pub mod routes_config;
pub mod routes_media;
pub mod routes_stream;

pub use error::AppError;

/// Shared application context
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    /// The transcoding engine
    pub streaming: Arc<StreamingService>,
    /// Library lookups for the browsing routes
    pub catalog: Arc<dyn Catalog>,
    /// User playback toggles (editable via API)
    pub settings: Arc<SettingsStore>,
}

impl AppContext {
    /// Wire up the production collaborators from configuration.
    pub fn from_config(config: Config) -> Result<Self> {
        let ffmpeg = match cactustv_av::get_tool_path("ffmpeg", config.tools.ffmpeg_path.as_deref())
        {
            Ok(path) => {
                tracing::info!("Using ffmpeg at {}", path.display());
                path
            }
            Err(e) => {
                // Play requests will fail until ffmpeg is installed.
                tracing::warn!("{e}; transcoding is unavailable");
                PathBuf::from("ffmpeg")
            }
        };

        let settings = Arc::new(match &config.library.settings_path {
            Some(path) => SettingsStore::load(path),
            None => SettingsStore::default(),
        });
        let catalog: Arc<dyn Catalog> = Arc::new(JsonCatalog::new(&config.library.catalog_path));
        let supervisor = Arc::new(
            FfmpegSupervisor::new(ffmpeg, config.streaming.poll_interval())
                .with_hls_output(config.streaming.hls_output()),
        );

        let streaming = StreamingService::from_config(
            &config.streaming,
            supervisor,
            catalog.clone(),
            settings.clone(),
        );

        Ok(Self {
            config: Arc::new(config),
            streaming: Arc::new(streaming),
            catalog,
            settings,
        })
    }
}

/// Create the Axum router with all routes
pub fn create_router(ctx: AppContext, static_dir: Option<PathBuf>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::RANGE]);

    let mut app = Router::new()
        // Health check
        .route("/health", get(health_check))
        .nest("/api", api_routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx);

    // Serve static files if directory is provided
    // Uses SPA fallback: serves index.html for any route that doesn't match a file
    if let Some(dir) = static_dir {
        if dir.exists() {
            tracing::info!("Serving static files from {:?}", dir);
            let index_path = dir.join("index.html");
            app = app.fallback_service(
                ServeDir::new(&dir)
                    .append_index_html_on_directories(true)
                    .not_found_service(ServeFile::new(index_path)),
            );
        }
    }

    app
}

fn api_routes() -> Router<AppContext> {
    Router::new()
        .route("/health", get(health_check))
        .merge(routes_media::media_routes())
        .merge(routes_stream::stream_routes())
        .merge(routes_config::config_routes())
}

async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Start the HTTP server
///
/// Empties the segment store first; output from a previous run is never
/// trusted.
pub async fn start_server(config: Config) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let static_dir = config.server.static_dir.clone();
    let ctx = AppContext::from_config(config)?;

    ctx.streaming
        .store()
        .reset_all()
        .await
        .with_context(|| {
            format!(
                "Failed to reset segment directory {}",
                ctx.streaming.store().root().display()
            )
        })?;

    let streaming = ctx.streaming.clone();
    let app = create_router(ctx, static_dir);

    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    streaming.shutdown().await;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
