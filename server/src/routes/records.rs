//! Entity record routes.
//!
//! `/{entity}` maps to one of the known entity paths (`categories`,
//! `inventory`, `customers`, `orders`); anything else is a 404.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde_json::Value;
use stocksync_engine::EntityType;

use crate::auth::AuthUser;
use crate::error::{AppError, Result};
use crate::handlers::{handle_create, handle_list, handle_update, parse_body, ListQuery};
use crate::AppState;

/// Create record routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/{entity}", get(list_handler).post(create_handler))
        .route("/{entity}/{id}", put(update_handler))
}

fn entity_from_path(path: &str) -> Result<EntityType> {
    EntityType::from_path(path).ok_or_else(|| AppError::NotFound(format!("unknown entity: {path}")))
}

/// GET /{entity}?since= - Records changed since a point in time.
async fn list_handler(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(entity): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Value>>> {
    let entity = entity_from_path(&entity)?;
    let records = handle_list(&state.pool, entity, query).await?;
    Ok(Json(records))
}

/// POST /{entity} - Create a record.
async fn create_handler(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(entity): Path<String>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>)> {
    let entity = entity_from_path(&entity)?;
    let body = parse_body(&state.schema, entity, body)?;
    let created = handle_create(&state.pool, entity, body).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// PUT /{entity}/{id} - Update a record.
async fn update_handler(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path((entity, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<Json<Value>> {
    let entity = entity_from_path(&entity)?;
    let body = parse_body(&state.schema, entity, body)?;
    let updated = handle_update(&state.pool, entity, &id, body).await?;
    Ok(Json(updated))
}
