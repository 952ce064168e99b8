//! Dashboard read model
//!
//! One immutable snapshot built from the four subtrees and handed to every
//! page. Rebuilt wholesale whenever any subtree changes.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::analytics::{status_breakdown, StatusBreakdown};
use crate::complaints::{flatten_complaints, sort_complaints};
use crate::conversation::{reconcile, Conversation};
use crate::error::Result;
use crate::models::*;
use crate::purok::{purok_overview, PurokSummary};
use crate::rating::{parse_rating, rated_entities};
use crate::store::{RemoteStore, Subscription};
use crate::validation::validation_records;

/// Sidebar badge counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SidebarCounts {
    pub pending_complaints: usize,
    pub unread_messages: usize,
    pub pending_validations: usize,
    pub new_feedback: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub complaints: Vec<Complaint>,
    pub conversations: Vec<Conversation>,
    pub validations: Vec<UserValidationRecord>,
    pub employees: Vec<RatedEntity>,
    pub officials: Vec<RatedEntity>,
    pub feedback: Vec<FeedbackNotification>,
    pub puroks: Vec<PurokSummary>,
    pub breakdown: StatusBreakdown,
    pub sidebar: SidebarCounts,
}

/// Raw subtree values as last delivered by the store. Missing subtrees are
/// `Value::Null`.
#[derive(Debug, Clone, Default)]
pub struct Subtrees {
    pub users: Value,
    pub employees: Value,
    pub officials: Value,
    pub complaint_feedback: Value,
}

impl Subtrees {
    /// Replace one subtree by its root name. Unknown roots are ignored.
    pub fn replace(&mut self, root: &str, value: Value) -> bool {
        let slot = match root {
            USERS_ROOT => &mut self.users,
            EMPLOYEES_ROOT => &mut self.employees,
            OFFICIALS_ROOT => &mut self.officials,
            COMPLAINT_FEEDBACK_ROOT => &mut self.complaint_feedback,
            _ => return false,
        };
        *slot = value;
        true
    }
}

pub fn feedback_notifications(subtree: &Value) -> Vec<FeedbackNotification> {
    keyed_entries::<ComplaintFeedbackRecord>(subtree)
        .into_iter()
        .map(|(key, record)| FeedbackNotification {
            key,
            user_id: record.user_id,
            complaint_id: record.complaint_id,
            rating: parse_rating(&record.rating),
            comment: record.comment,
            timestamp: record.timestamp,
        })
        .collect()
}

impl DashboardSnapshot {
    pub fn build(trees: &Subtrees, dismissed: &HashSet<String>) -> Self {
        let mut complaints = flatten_complaints(&trees.users);
        sort_complaints(&mut complaints);

        let conversations = reconcile(&trees.users);
        let validations = validation_records(&trees.users);
        let feedback: Vec<FeedbackNotification> =
            feedback_notifications(&trees.complaint_feedback)
                .into_iter()
                .filter(|f| !dismissed.contains(&f.key))
                .collect();

        let breakdown = status_breakdown(&complaints);
        let sidebar = SidebarCounts {
            pending_complaints: breakdown.pending,
            unread_messages: conversations.iter().map(|c| c.unread_count).sum(),
            pending_validations: validations
                .iter()
                .filter(|v| v.idstatus == IdStatus::Pending)
                .count(),
            new_feedback: feedback.len(),
        };

        Self {
            puroks: purok_overview(&trees.users),
            employees: rated_entities(RatedKind::Employee, &trees.employees),
            officials: rated_entities(RatedKind::Official, &trees.officials),
            complaints,
            conversations,
            validations,
            feedback,
            breakdown,
            sidebar,
        }
    }
}

// ============================================================================
// Live feed
// ============================================================================

/// Composition root for the dashboard: owns the four subtree subscriptions
/// and hands out a fresh immutable snapshot after every delivery.
pub struct DashboardFeed {
    users: Subscription,
    employees: Subscription,
    officials: Subscription,
    complaint_feedback: Subscription,
    trees: Subtrees,
    dismissed: HashSet<String>,
}

impl DashboardFeed {
    pub async fn connect<S: RemoteStore>(store: &S, dismissed: HashSet<String>) -> Result<Self> {
        Ok(Self {
            users: store.subscribe(USERS_ROOT).await?,
            employees: store.subscribe(EMPLOYEES_ROOT).await?,
            officials: store.subscribe(OFFICIALS_ROOT).await?,
            complaint_feedback: store.subscribe(COMPLAINT_FEEDBACK_ROOT).await?,
            trees: Subtrees::default(),
            dismissed,
        })
    }

    /// Wait for the next delivery on any subtree and rebuild. `None` once
    /// the store has gone away.
    pub async fn next_snapshot(&mut self) -> Option<Arc<DashboardSnapshot>> {
        let (root, value) = tokio::select! {
            v = self.users.next() => (USERS_ROOT, v?),
            v = self.employees.next() => (EMPLOYEES_ROOT, v?),
            v = self.officials.next() => (OFFICIALS_ROOT, v?),
            v = self.complaint_feedback.next() => (COMPLAINT_FEEDBACK_ROOT, v?),
        };
        self.trees.replace(root, value);

        // Fold in anything else already queued so one rebuild covers it.
        for (root, sub) in [
            (USERS_ROOT, &mut self.users),
            (EMPLOYEES_ROOT, &mut self.employees),
            (OFFICIALS_ROOT, &mut self.officials),
            (COMPLAINT_FEEDBACK_ROOT, &mut self.complaint_feedback),
        ] {
            if let Some(value) = sub.latest() {
                self.trees.replace(root, value);
            }
        }

        Some(Arc::new(self.snapshot()))
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        DashboardSnapshot::build(&self.trees, &self.dismissed)
    }

    /// Hide a feedback notification from the sidebar from now on.
    pub fn dismiss(&mut self, key: &str) -> DashboardSnapshot {
        self.dismissed.insert(key.to_string());
        self.snapshot()
    }
}
