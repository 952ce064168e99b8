//! Complaint analytics handlers

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Local;

use barangay_core::analytics::{
    report, status_breakdown, type_breakdown, AnalyticsQuery, BucketReport, ReportView,
};
use barangay_core::complaints::flatten_complaints;
use barangay_core::{Complaint, USERS_ROOT};

use crate::{error::Result, models::*, AppState};

use super::AuthUser;

async fn all_complaints(state: &AppState) -> Result<Vec<Complaint>> {
    let users = state.db.value_at(USERS_ROOT).await?;
    Ok(flatten_complaints(&users))
}

/// Twelve month buckets for `year`, or this year when neither a year nor a
/// range is given. An inverted range still answers 200, with every bucket at
/// zero and the reason in `error`.
pub async fn monthly(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<MonthlyQuery>,
) -> Result<Json<BucketReport>> {
    let complaints = all_complaints(&state).await?;
    let query = AnalyticsQuery {
        year: query.year,
        start: query.start,
        end: query.end,
        reference: None,
    };

    Ok(Json(report(
        ReportView::Monthly,
        &complaints,
        &query,
        Local::now().date_naive(),
    )))
}

/// Four week buckets for the month of `reference` (default: this month).
pub async fn weekly(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<WeeklyQuery>,
) -> Result<Json<BucketReport>> {
    let complaints = all_complaints(&state).await?;
    let query = AnalyticsQuery {
        reference: query.reference,
        ..Default::default()
    };

    Ok(Json(report(
        ReportView::Weekly,
        &complaints,
        &query,
        Local::now().date_naive(),
    )))
}

pub async fn breakdown(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> Result<Json<BreakdownResponse>> {
    let complaints = all_complaints(&state).await?;

    Ok(Json(BreakdownResponse {
        status: status_breakdown(&complaints),
        types: type_breakdown(&complaints),
    }))
}
