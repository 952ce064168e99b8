//! Raw document store access
//!
//! The REST face of the realtime store: what a staff client's `RemoteStore`
//! calls. Paths map one-to-one onto tree paths under `/api/v1/db/`.

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{Map, Value};

use crate::{error::Result, models::PushResponse, AppState};

use super::AuthUser;

/// Whole tree
pub async fn export_tree(State(state): State<AppState>, _auth: AuthUser) -> Result<Json<Value>> {
    Ok(Json(state.db.value_at("").await?))
}

pub async fn get_value(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(path): Path<String>,
) -> Result<Json<Value>> {
    Ok(Json(state.db.value_at(&path).await?))
}

pub async fn put_value(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(path): Path<String>,
    Json(value): Json<Value>,
) -> Result<Json<Value>> {
    state.db.set_value(&path, value).await?;
    tracing::debug!("{} set {}", auth.email, path);
    Ok(Json(serde_json::json!({ "success": true })))
}

pub async fn patch_value(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(path): Path<String>,
    Json(fields): Json<Map<String, Value>>,
) -> Result<Json<Value>> {
    state.db.update_fields(&path, fields).await?;
    tracing::debug!("{} updated {}", auth.email, path);
    Ok(Json(serde_json::json!({ "success": true })))
}

/// Append under `path` with a generated, time-ordered id
pub async fn push_value(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(path): Path<String>,
    Json(value): Json<Value>,
) -> Result<Json<PushResponse>> {
    let id = state.db.push_value(&path, value).await?;
    tracing::debug!("{} pushed {}/{}", auth.email, path, id);
    Ok(Json(PushResponse { id }))
}

pub async fn delete_value(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(path): Path<String>,
) -> Result<Json<Value>> {
    state.db.remove_value(&path).await?;
    tracing::debug!("{} removed {}", auth.email, path);
    Ok(Json(serde_json::json!({ "success": true })))
}

/// Atomic multi-path update: `{ "a/b": 1, "c/d": null }`
pub async fn update_many(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(updates): Json<Map<String, Value>>,
) -> Result<Json<Value>> {
    let count = updates.len();
    state.db.update_paths(updates).await?;
    tracing::debug!("{} applied {} path updates", auth.email, count);
    Ok(Json(serde_json::json!({ "success": true })))
}
