use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    http::{header, Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

use crate::config::Config;
use crate::copernicus::Copernicus;
use crate::imagery::ImageStore;
use crate::state::AppState;
use crate::vlm::VlmClient;

pub mod routes_analyze;
pub mod routes_api;
pub mod routes_imagery;
pub mod routes_video;

/// Shared application context
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub state: Arc<AppState>,
    pub store: Arc<ImageStore>,
    pub copernicus: Arc<Copernicus>,
    pub vlm: Arc<VlmClient>,
}

impl AppContext {
    /// Build a context from configuration alone. Clients point at whatever
    /// endpoints the config names, which is also how tests swap in mocks.
    pub fn from_config(config: Config) -> Self {
        let store = ImageStore::new(config.storage.satellite_dir());
        let copernicus = Copernicus::new(&config.copernicus);
        let vlm = VlmClient::new(&config.vlm);

        Self {
            state: AppState::new(),
            store: Arc::new(store),
            copernicus: Arc::new(copernicus),
            vlm: Arc::new(vlm),
            config: Arc::new(config),
        }
    }
}

/// Create the Axum router with all routes
pub fn create_router(ctx: AppContext, static_dir: Option<PathBuf>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let mut app = Router::new()
        // Health check
        .route("/health", get(health_check))
        // API routes
        .nest("/api", api_routes(&ctx))
        // Cached satellite imagery, served straight from the data directory
        .nest_service("/data", ServeDir::new(ctx.store.dir()));

    // Serve the frontend bundle if a directory is provided.
    // Uses SPA fallback: serves index.html for any route that doesn't match a file.
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

    app.layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

fn api_routes(ctx: &AppContext) -> Router<AppContext> {
    routes_api::status_routes()
        .merge(routes_imagery::imagery_routes())
        .merge(routes_analyze::analyze_routes())
        .merge(routes_video::video_routes(ctx))
}

async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

/// Start the HTTP server
pub async fn start_server(config: Config) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let static_dir = config.server.static_dir.clone();
    let ctx = AppContext::from_config(config);

    // The imagery cache and upload directories must exist before the first
    // request hits them.
    ctx.store
        .ensure()
        .context("Failed to create satellite data directory")?;
    std::fs::create_dir_all(ctx.config.storage.uploads_dir())
        .context("Failed to create uploads directory")?;
    std::fs::create_dir_all(ctx.config.storage.frames_dir())
        .context("Failed to create frames directory")?;

    if !ctx.vlm.has_api_key() {
        tracing::warn!("VLM API key not configured; analysis endpoints will fail");
    }
    if !ctx.copernicus.has_credentials() {
        tracing::warn!("Copernicus credentials not configured; imagery fetching will fail");
    }

    let app = create_router(ctx, static_dir);

    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

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
