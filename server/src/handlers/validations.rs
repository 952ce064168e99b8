//! Resident ID validation handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};

use barangay_core::validation::{apply_decision, filter_records, validation_records};
use barangay_core::{UserValidationRecord, USERS_ROOT};

use crate::{error::Result, models::*, AppState};

use super::AuthUser;

pub async fn list_validations(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<ValidationQuery>,
) -> Result<Json<Vec<UserValidationRecord>>> {
    let users = state.db.value_at(USERS_ROOT).await?;
    let rows = filter_records(
        validation_records(&users),
        query.status,
        query.search.as_deref(),
    );

    Ok(Json(rows))
}

pub async fn decide(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<String>,
    Json(req): Json<DecisionRequest>,
) -> Result<Json<DecisionResponse>> {
    let idstatus = apply_decision(&*state.db, &user_id, req.decision).await?;

    tracing::info!("{} marked resident {} {}", auth.email, user_id, idstatus);

    Ok(Json(DecisionResponse { user_id, idstatus }))
}
