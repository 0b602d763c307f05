//! stocksync server - reference sync API for stocksync clients.
//!
//! Serves one REST collection per entity type (`/categories`, `/inventory`,
//! `/customers`, `/orders`) backed by a single PostgreSQL `records` table.
//! Payloads are validated against the same schema the clients use.

mod auth;
pub mod config;
pub mod db;
pub mod error;
mod handlers;
mod routes;

use crate::config::Config;
use crate::db::Pool;
use axum::Router;
use std::sync::Arc;
use stocksync_engine::Schema;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub pool: Pool,
    pub config: Arc<Config>,
    pub schema: Arc<Schema>,
}

impl AppState {
    /// State using the built-in inventory schema.
    pub fn new(pool: Pool, config: Config) -> Self {
        Self {
            pool,
            config: Arc::new(config),
            schema: Arc::new(Schema::inventory()),
        }
    }
}

/// Build the application router with tracing and CORS layers.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::create_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
