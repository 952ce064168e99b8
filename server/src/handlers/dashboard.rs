//! Dashboard home and purok overview

use std::collections::HashSet;

use axum::{
    extract::{Query, State},
    Json,
};

use barangay_core::dashboard::Subtrees;
use barangay_core::purok::{purok_overview, PurokSummary};
use barangay_core::{
    DashboardSnapshot, COMPLAINT_FEEDBACK_ROOT, EMPLOYEES_ROOT, OFFICIALS_ROOT, USERS_ROOT,
};

use crate::{error::Result, models::*, AppState};

use super::AuthUser;

/// Feedback keys from `?dismissed=a,b`.
fn dismissed_keys(raw: Option<&str>) -> HashSet<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

pub async fn summary(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<DashboardSnapshot>> {
    let mut trees = Subtrees::default();
    for root in [USERS_ROOT, EMPLOYEES_ROOT, OFFICIALS_ROOT, COMPLAINT_FEEDBACK_ROOT] {
        trees.replace(root, state.db.value_at(root).await?);
    }

    let dismissed = dismissed_keys(query.dismissed.as_deref());
    Ok(Json(DashboardSnapshot::build(&trees, &dismissed)))
}

pub async fn puroks(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> Result<Json<Vec<PurokSummary>>> {
    let users = state.db.value_at(USERS_ROOT).await?;
    Ok(Json(purok_overview(&users)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dismissed_keys() {
        let keys = dismissed_keys(Some("k1, k2,,"));
        assert_eq!(keys.len(), 2);
        assert!(keys.contains("k2"));
        assert!(dismissed_keys(None).is_empty());
    }
}
