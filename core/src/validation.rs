//! Resident ID validation workflow
//!
//! pending -> approved | declined. Both decisions are final; nothing moves a
//! record back to pending.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{Error, Result};
use crate::models::*;
use crate::store::RemoteStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Decline,
}

impl Decision {
    pub fn target(&self) -> IdStatus {
        match self {
            Decision::Approve => IdStatus::Approved,
            Decision::Decline => IdStatus::Declined,
        }
    }
}

pub fn decide(current: IdStatus, decision: Decision) -> Result<IdStatus> {
    match current {
        IdStatus::Pending => Ok(decision.target()),
        done => Err(Error::InvalidTransition {
            from: done.to_string(),
            to: decision.target().to_string(),
        }),
    }
}

pub fn validation_records(users: &Value) -> Vec<UserValidationRecord> {
    let mut rows: Vec<UserValidationRecord> = keyed_entries::<UserRecord>(users)
        .into_iter()
        .map(|(id, user)| {
            let has_id_image = user
                .id_verification_image
                .as_deref()
                .is_some_and(|s| !s.trim().is_empty());
            UserValidationRecord {
                id,
                name: user.name,
                contact: user.contact,
                purok: user.purok,
                address: user.address,
                id_verification_image: user.id_verification_image,
                idstatus: user.idstatus,
                has_id_image,
            }
        })
        .collect();

    // Pending reviews on top.
    rows.sort_by_key(|r| r.idstatus != IdStatus::Pending);
    rows
}

pub fn filter_records(
    records: Vec<UserValidationRecord>,
    status: Option<IdStatus>,
    search: Option<&str>,
) -> Vec<UserValidationRecord> {
    let term = search.map(|s| s.trim().to_lowercase()).unwrap_or_default();
    records
        .into_iter()
        .filter(|r| status.map_or(true, |s| r.idstatus == s))
        .filter(|r| {
            term.is_empty()
                || r.name.to_lowercase().contains(&term)
                || r.purok.to_lowercase().contains(&term)
                || r.contact.contains(&term)
        })
        .collect()
}

/// Record a decision for a resident and return the new status.
pub async fn apply_decision<S: RemoteStore>(
    store: &S,
    user_id: &str,
    decision: Decision,
) -> Result<IdStatus> {
    let path = user_path(user_id);
    let current = store
        .get(&format!("{}/idstatus", path))
        .await?
        .map(|v| IdStatus::from(v.as_str().unwrap_or_default().to_string()));

    let current = match current {
        Some(status) => status,
        None => {
            // No idstatus yet: a fresh sign-up is pending review.
            if store.get(&path).await?.is_none() {
                return Err(Error::NotFound(format!("user {}", user_id)));
            }
            IdStatus::Pending
        }
    };

    let next = decide(current, decision)?;

    let mut fields = Map::new();
    fields.insert("idstatus".to_string(), json!(next));
    store.update(&path, fields).await?;
    Ok(next)
}
