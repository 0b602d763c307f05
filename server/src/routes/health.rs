//! Health check endpoint.

use axum::{routing::get, Json, Router};
use serde::Serialize;
use stocksync_engine::EntityType;

use crate::AppState;

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    /// Entity paths this server accepts
    pub entities: Vec<&'static str>,
}

/// Create health routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/", get(root))
}

/// Liveness only; the database is not probed.
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        entities: EntityType::SYNC_ORDER.iter().map(|e| e.path()).collect(),
    })
}

async fn root() -> &'static str {
    "stocksync API"
}
