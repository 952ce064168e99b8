//! Purok overview: residents and complaints per neighborhood unit

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::*;

const UNASSIGNED: &str = "Unassigned";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurokSummary {
    pub purok: String,
    pub residents: usize,
    pub complaints: usize,
    pub pending: usize,
    pub urgent: usize,
}

fn purok_label(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        UNASSIGNED.to_string()
    } else {
        trimmed.to_string()
    }
}

/// One summary per purok, ordered by purok name.
pub fn purok_overview(users: &Value) -> Vec<PurokSummary> {
    let mut by_purok: BTreeMap<String, PurokSummary> = BTreeMap::new();

    for (_, user) in keyed_entries::<UserRecord>(users) {
        let label = purok_label(&user.purok);
        let summary = by_purok.entry(label.clone()).or_insert_with(|| PurokSummary {
            purok: label,
            ..Default::default()
        });
        summary.residents += 1;

        for (_, complaint) in keyed_entries::<ComplaintRecord>(&Value::Object(user.user_complaints)) {
            summary.complaints += 1;
            if complaint.status == ComplaintStatus::Pending {
                summary.pending += 1;
            }
            if complaint.label == Urgency::Urgent {
                summary.urgent += 1;
            }
        }
    }

    by_purok.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_overview_groups_by_purok() {
        let users = json!({
            "u1": { "purok": "Purok 2", "userComplaints": {
                "c1": { "status": "pending", "label": "urgent" },
                "c2": { "status": "resolved" },
            }},
            "u2": { "purok": " Purok 2 " },
            "u3": { "purok": "Purok 1", "userComplaints": {
                "c3": { "status": "in-progress" },
            }},
            "u4": {},
        });

        let overview = purok_overview(&users);
        let names: Vec<&str> = overview.iter().map(|p| p.purok.as_str()).collect();
        assert_eq!(names, vec!["Purok 1", "Purok 2", "Unassigned"]);

        let p2 = &overview[1];
        assert_eq!(p2.residents, 2);
        assert_eq!(p2.complaints, 2);
        assert_eq!(p2.pending, 1);
        assert_eq!(p2.urgent, 1);
        assert_eq!(overview[2].residents, 1);
    }
}
