//! Complaint rows: flattening, filtering, ordering and status changes

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{Error, Result};
use crate::models::*;
use crate::store::RemoteStore;
use crate::timestamp::parse_timestamp;

/// One row per (user, complaint), carrying the owner's name and purok.
pub fn flatten_complaints(users: &Value) -> Vec<Complaint> {
    let mut rows = Vec::new();
    for (user_id, user) in keyed_entries::<UserRecord>(users) {
        for (complaint_id, record) in
            keyed_entries::<ComplaintRecord>(&Value::Object(user.user_complaints))
        {
            rows.push(Complaint {
                id: complaint_id,
                owner_user_id: user_id.clone(),
                complainant_name: user.name.clone(),
                purok: user.purok.clone(),
                complaint_type: record.complaint_type,
                message: record.message,
                status: record.status,
                urgency: record.label,
                timestamp: record.timestamp,
                evidence_photo: record.evidence_photo,
                chat: chat_messages(&record.chat),
            });
        }
    }
    rows
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComplaintFilter {
    pub status: Option<ComplaintStatus>,
    pub urgency: Option<Urgency>,
    pub complaint_type: Option<String>,
    pub purok: Option<String>,
    pub search: Option<String>,
}

impl ComplaintFilter {
    pub fn matches(&self, complaint: &Complaint) -> bool {
        if self.status.is_some_and(|s| s != complaint.status) {
            return false;
        }
        if self.urgency.is_some_and(|u| u != complaint.urgency) {
            return false;
        }
        if let Some(t) = non_blank(&self.complaint_type) {
            if !complaint.complaint_type.eq_ignore_ascii_case(t) {
                return false;
            }
        }
        if let Some(p) = non_blank(&self.purok) {
            if !complaint.purok.eq_ignore_ascii_case(p) {
                return false;
            }
        }
        if let Some(term) = non_blank(&self.search) {
            let term = term.to_lowercase();
            let hit = [
                &complaint.complainant_name,
                &complaint.complaint_type,
                &complaint.message,
            ]
            .iter()
            .any(|field| field.to_lowercase().contains(&term));
            if !hit {
                return false;
            }
        }
        true
    }

    pub fn apply(&self, complaints: Vec<Complaint>) -> Vec<Complaint> {
        complaints.into_iter().filter(|c| self.matches(c)).collect()
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Pending first, then urgent before non-urgent, then newest first.
/// Complaints with unparseable timestamps sink within their group.
pub fn compare_complaints(a: &Complaint, b: &Complaint) -> Ordering {
    let urgency_rank = |c: &Complaint| match c.urgency {
        Urgency::Urgent => 0,
        Urgency::NonUrgent => 1,
    };

    a.status
        .rank()
        .cmp(&b.status.rank())
        .then_with(|| urgency_rank(a).cmp(&urgency_rank(b)))
        .then_with(|| {
            match (parse_timestamp(&a.timestamp), parse_timestamp(&b.timestamp)) {
                (Some(x), Some(y)) => y.cmp(&x),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
        })
}

pub fn sort_complaints(complaints: &mut [Complaint]) {
    complaints.sort_by(compare_complaints);
}

/// Staff move complaints forward only: pending -> in-progress -> resolved,
/// with pending -> resolved allowed directly.
pub fn check_transition(from: ComplaintStatus, to: ComplaintStatus) -> Result<()> {
    if to.rank() >= from.rank() {
        Ok(())
    } else {
        Err(Error::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

/// Change a complaint's status in the store. Same-status requests are a
/// no-op and report `false`.
pub async fn update_status<S: RemoteStore>(
    store: &S,
    user_id: &str,
    complaint_id: &str,
    to: ComplaintStatus,
) -> Result<bool> {
    let path = complaint_path(user_id, complaint_id);
    let current = store
        .get(&path)
        .await?
        .ok_or_else(|| Error::NotFound(format!("complaint {}/{}", user_id, complaint_id)))?;
    let record: ComplaintRecord = serde_json::from_value(current)?;

    if record.status == to {
        return Ok(false);
    }
    check_transition(record.status, to)?;

    let mut fields = Map::new();
    fields.insert("status".to_string(), json!(to));
    store.update(&path, fields).await?;
    Ok(true)
}
