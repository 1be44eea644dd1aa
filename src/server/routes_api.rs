//! Status and tooling routes.

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};

use super::AppContext;
use crate::error::{Error, Result};
use crate::video::{check_tools, ToolInfo};

pub fn status_routes() -> Router<AppContext> {
    Router::new()
        .route("/status", get(status))
        .route("/tools", get(get_tools))
}

async fn status(State(ctx): State<AppContext>) -> impl IntoResponse {
    let stats = ctx.state.snapshot();
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "vlm_api_configured": ctx.vlm.has_api_key(),
        "copernicus_configured": ctx.copernicus.has_credentials(),
        "images_available": ctx.store.count(),
        "stats": stats,
    }))
}

async fn get_tools() -> Result<Json<Vec<ToolInfo>>> {
    // Spawned off the async path; tool probing execs subprocesses. A failed
    // join is a real error, not an empty tool list.
    let tools = tokio::task::spawn_blocking(check_tools)
        .await
        .map_err(|e| Error::internal(format!("tool probe task failed: {e}")))?;
    Ok(Json(tools))
}
