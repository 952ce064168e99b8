//! Employee and official roster handlers

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};

use barangay_core::rating::{create_entity, delete_entity, rated_entities, update_entity};
use barangay_core::{RatedEntity, RatedKind};

use crate::{
    error::{AppError, Result},
    models::*,
    AppState,
};

use super::AuthUser;

fn parse_kind(raw: &str) -> Result<RatedKind> {
    RatedKind::parse(raw).ok_or_else(|| AppError::NotFound(format!("no roster named {}", raw)))
}

pub async fn list_entities(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(kind): Path<String>,
) -> Result<Json<Vec<RatedEntity>>> {
    let kind = parse_kind(&kind)?;
    let subtree = state.db.value_at(kind.root()).await?;

    Ok(Json(rated_entities(kind, &subtree)))
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(kind): Path<String>,
    Json(req): Json<RatedEntityRequest>,
) -> Result<Json<PushResponse>> {
    let kind = parse_kind(&kind)?;
    let id = create_entity(
        &*state.db,
        kind,
        &req.name,
        &req.position,
        req.contact.as_deref(),
    )
    .await?;

    tracing::info!("{} added {}/{}", auth.email, kind.root(), id);

    Ok(Json(PushResponse { id }))
}

pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((kind, id)): Path<(String, String)>,
    Json(req): Json<RatedEntityRequest>,
) -> Result<Json<Value>> {
    let kind = parse_kind(&kind)?;
    update_entity(
        &*state.db,
        kind,
        &id,
        &req.name,
        &req.position,
        req.contact.as_deref(),
    )
    .await?;

    tracing::info!("{} updated {}/{}", auth.email, kind.root(), id);

    Ok(Json(json!({ "success": true })))
}

pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((kind, id)): Path<(String, String)>,
) -> Result<Json<Value>> {
    let kind = parse_kind(&kind)?;
    delete_entity(&*state.db, kind, &id).await?;

    tracing::info!("{} removed {}/{}", auth.email, kind.root(), id);

    Ok(Json(json!({ "success": true })))
}
