//! Complaint table handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};

use barangay_core::complaints::{self, flatten_complaints, sort_complaints, ComplaintFilter};
use barangay_core::{Complaint, ComplaintStatus, USERS_ROOT};

use crate::{
    error::{AppError, Result},
    models::*,
    AppState,
};

use super::AuthUser;

/// Stored statuses are read leniently; requested ones are not.
fn parse_status(raw: &str) -> Result<ComplaintStatus> {
    let status = ComplaintStatus::from(raw.to_string());
    if status.as_str() != raw.trim().to_ascii_lowercase() {
        return Err(AppError::BadRequest(format!("unknown complaint status: {}", raw)));
    }
    Ok(status)
}

pub async fn list_complaints(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(filter): Query<ComplaintFilter>,
) -> Result<Json<Vec<Complaint>>> {
    let users = state.db.value_at(USERS_ROOT).await?;

    let mut rows = filter.apply(flatten_complaints(&users));
    sort_complaints(&mut rows);

    Ok(Json(rows))
}

pub async fn update_complaint_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((user_id, complaint_id)): Path<(String, String)>,
    Json(req): Json<StatusUpdateRequest>,
) -> Result<Json<StatusUpdateResponse>> {
    let status = parse_status(&req.status)?;
    let changed = complaints::update_status(&*state.db, &user_id, &complaint_id, status).await?;

    if changed {
        tracing::info!(
            "{} moved complaint {}/{} to {}",
            auth.email,
            user_id,
            complaint_id,
            status
        );
    }

    Ok(Json(StatusUpdateResponse { status, changed }))
}
