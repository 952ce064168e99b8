//! Data models for the barangay complaint desk
//!
//! Two layers live here: the raw records exactly as the citizen app writes
//! them into the store (camelCase JSON, nested keyed maps), and the flat rows
//! the dashboard projects out of them.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Sender id used for every staff-authored chat message.
pub const ADMIN_SENDER: &str = "admin";

/// Top-level subtrees of the store.
pub const USERS_ROOT: &str = "users";
pub const EMPLOYEES_ROOT: &str = "employees";
pub const OFFICIALS_ROOT: &str = "officials";
pub const COMPLAINT_FEEDBACK_ROOT: &str = "complaintFeedback";

// ============================================================================
// Enumerations
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", from = "String")]
pub enum ComplaintStatus {
    #[default]
    Pending,
    InProgress,
    Resolved,
}

impl ComplaintStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComplaintStatus::Pending => "pending",
            ComplaintStatus::InProgress => "in-progress",
            ComplaintStatus::Resolved => "resolved",
        }
    }

    /// Position in the complaints table: pending rows first.
    pub fn rank(&self) -> u8 {
        match self {
            ComplaintStatus::Pending => 0,
            ComplaintStatus::InProgress => 1,
            ComplaintStatus::Resolved => 2,
        }
    }
}

impl From<String> for ComplaintStatus {
    fn from(s: String) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "in-progress" | "in progress" | "inprogress" => ComplaintStatus::InProgress,
            "resolved" => ComplaintStatus::Resolved,
            _ => ComplaintStatus::Pending,
        }
    }
}

impl fmt::Display for ComplaintStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", from = "String")]
pub enum Urgency {
    Urgent,
    #[default]
    NonUrgent,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Urgent => "urgent",
            Urgency::NonUrgent => "non-urgent",
        }
    }
}

impl From<String> for Urgency {
    fn from(s: String) -> Self {
        if s.trim().eq_ignore_ascii_case("urgent") {
            Urgency::Urgent
        } else {
            Urgency::NonUrgent
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum IdStatus {
    #[default]
    Pending,
    Approved,
    Declined,
}

impl IdStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdStatus::Pending => "pending",
            IdStatus::Approved => "approved",
            IdStatus::Declined => "declined",
        }
    }
}

impl From<String> for IdStatus {
    fn from(s: String) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "approved" => IdStatus::Approved,
            "declined" => IdStatus::Declined,
            _ => IdStatus::Pending,
        }
    }
}

impl fmt::Display for IdStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Raw store records
// ============================================================================

/// Field decoders for records written by the citizen app. Older builds store
/// phone numbers and timestamps as numbers, flags as strings, and sometimes
/// `null`; a mistyped field falls back to its default instead of taking the
/// whole record down with it.
mod loose {
    use serde::{Deserialize, Deserializer};
    use serde_json::{Map, Value};

    pub fn text_of(value: &Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(text_of(&Value::deserialize(d)?).unwrap_or_default())
    }

    pub fn opt_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(text_of(&Value::deserialize(d)?))
    }

    pub fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Bool(b) => b,
            Value::String(s) => s.trim().eq_ignore_ascii_case("true"),
            Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
            _ => false,
        })
    }

    pub fn tag<'de, D, T>(d: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: From<String> + Default,
    {
        Ok(text_of(&Value::deserialize(d)?)
            .map(T::from)
            .unwrap_or_default())
    }

    pub fn object<'de, D: Deserializer<'de>>(d: D) -> Result<Map<String, Value>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Object(map) => map,
            _ => Map::new(),
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserRecord {
    #[serde(deserialize_with = "loose::text")]
    pub name: String,
    #[serde(deserialize_with = "loose::text")]
    pub contact: String,
    #[serde(deserialize_with = "loose::text")]
    pub purok: String,
    #[serde(deserialize_with = "loose::text")]
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "loose::opt_text")]
    pub id_verification_image: Option<String>,
    #[serde(deserialize_with = "loose::tag")]
    pub idstatus: IdStatus,
    #[serde(deserialize_with = "loose::object")]
    pub user_complaints: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ComplaintRecord {
    #[serde(rename = "type", deserialize_with = "loose::text")]
    pub complaint_type: String,
    #[serde(deserialize_with = "loose::text")]
    pub message: String,
    #[serde(deserialize_with = "loose::tag")]
    pub status: ComplaintStatus,
    #[serde(deserialize_with = "loose::tag")]
    pub label: Urgency,
    #[serde(deserialize_with = "loose::text")]
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "loose::opt_text")]
    pub evidence_photo: Option<String>,
    #[serde(deserialize_with = "loose::object")]
    pub chat: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatMessageRecord {
    #[serde(deserialize_with = "loose::text")]
    pub sender_id: String,
    #[serde(deserialize_with = "loose::text")]
    pub body: String,
    #[serde(deserialize_with = "loose::text")]
    pub timestamp: String,
    #[serde(deserialize_with = "loose::flag")]
    pub read: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RatedEntityRecord {
    #[serde(deserialize_with = "loose::text")]
    pub name: String,
    #[serde(deserialize_with = "loose::text")]
    pub position: String,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "loose::opt_text")]
    pub contact: Option<String>,
    #[serde(deserialize_with = "loose::object")]
    pub feedback: Map<String, Value>,
}

/// Ratings arrive as numbers or strings depending on the citizen app version.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeedbackRecord {
    pub rating: Value,
    #[serde(deserialize_with = "loose::text")]
    pub comment: String,
    #[serde(deserialize_with = "loose::text")]
    pub citizen: String,
    #[serde(deserialize_with = "loose::text")]
    pub timestamp: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ComplaintFeedbackRecord {
    #[serde(deserialize_with = "loose::text")]
    pub user_id: String,
    #[serde(deserialize_with = "loose::text")]
    pub complaint_id: String,
    pub rating: Value,
    #[serde(deserialize_with = "loose::text")]
    pub comment: String,
    #[serde(deserialize_with = "loose::text")]
    pub timestamp: String,
}

/// Decode every child of a keyed object, in stored order. Children that do
/// not decode are skipped.
pub fn keyed_entries<T: DeserializeOwned>(value: &Value) -> Vec<(String, T)> {
    let Some(map) = value.as_object() else {
        return Vec::new();
    };

    map.iter()
        .filter_map(|(key, child)| match serde_json::from_value::<T>(child.clone()) {
            Ok(record) => Some((key.clone(), record)),
            Err(e) => {
                log::debug!("Skipping undecodable record {}: {}", key, e);
                None
            }
        })
        .collect()
}

// ============================================================================
// Projected rows
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub sender_id: String,
    pub body: String,
    pub timestamp: String,
    pub read: bool,
}

impl Message {
    pub fn from_record(id: String, record: ChatMessageRecord) -> Self {
        Self {
            id,
            sender_id: record.sender_id,
            body: record.body,
            timestamp: record.timestamp,
            read: record.read,
        }
    }

    pub fn is_from_citizen(&self) -> bool {
        self.sender_id != ADMIN_SENDER
    }

    /// Citizen messages count as unread until staff opens the conversation.
    /// Staff messages never do.
    pub fn is_unread(&self) -> bool {
        self.is_from_citizen() && !self.read
    }

    pub fn to_record(&self) -> ChatMessageRecord {
        ChatMessageRecord {
            sender_id: self.sender_id.clone(),
            body: self.body.clone(),
            timestamp: self.timestamp.clone(),
            read: self.read,
        }
    }
}

/// Chat messages of one complaint, in stored order.
pub fn chat_messages(chat: &Map<String, Value>) -> Vec<Message> {
    chat.iter()
        .filter_map(|(id, raw)| {
            serde_json::from_value::<ChatMessageRecord>(raw.clone())
                .ok()
                .map(|record| Message::from_record(id.clone(), record))
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Complaint {
    pub id: String,
    pub owner_user_id: String,
    pub complainant_name: String,
    pub purok: String,
    #[serde(rename = "type")]
    pub complaint_type: String,
    pub message: String,
    pub status: ComplaintStatus,
    pub urgency: Urgency,
    pub timestamp: String,
    pub evidence_photo: Option<String>,
    pub chat: Vec<Message>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub id: String,
    /// Numeric value of the rating, if it had one. Not necessarily valid.
    pub rating: Option<f64>,
    pub comment: String,
    pub citizen: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RatedKind {
    Employee,
    Official,
}

impl RatedKind {
    pub fn root(&self) -> &'static str {
        match self {
            RatedKind::Employee => EMPLOYEES_ROOT,
            RatedKind::Official => OFFICIALS_ROOT,
        }
    }

    /// Accepts both the singular and the plural (subtree) form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "employee" | "employees" => Some(RatedKind::Employee),
            "official" | "officials" => Some(RatedKind::Official),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatedEntity {
    pub id: String,
    pub kind: RatedKind,
    pub name: String,
    pub position: String,
    pub contact: Option<String>,
    pub feedback: Vec<Feedback>,
    /// `None` means "no rating yet", which the dashboard shows differently
    /// from an average of zero.
    pub average_rating: Option<f64>,
    pub rating_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserValidationRecord {
    pub id: String,
    pub name: String,
    pub contact: String,
    pub purok: String,
    pub address: String,
    pub id_verification_image: Option<String>,
    pub idstatus: IdStatus,
    pub has_id_image: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackNotification {
    pub key: String,
    pub user_id: String,
    pub complaint_id: String,
    pub rating: Option<f64>,
    pub comment: String,
    pub timestamp: String,
}

// ============================================================================
// Record paths
// ============================================================================

pub fn user_path(user_id: &str) -> String {
    format!("{}/{}", USERS_ROOT, user_id)
}

pub fn complaint_path(user_id: &str, complaint_id: &str) -> String {
    format!("{}/{}/userComplaints/{}", USERS_ROOT, user_id, complaint_id)
}

pub fn chat_path(user_id: &str, complaint_id: &str) -> String {
    format!("{}/chat", complaint_path(user_id, complaint_id))
}

pub fn message_path(user_id: &str, complaint_id: &str, message_id: &str) -> String {
    format!("{}/{}", chat_path(user_id, complaint_id), message_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unknown_enum_strings_fall_back() {
        let record: ComplaintRecord = serde_json::from_value(json!({
            "type": "Noise",
            "status": "archived",
            "label": "???",
        }))
        .unwrap();

        assert_eq!(record.status, ComplaintStatus::Pending);
        assert_eq!(record.label, Urgency::NonUrgent);
        assert_eq!(record.complaint_type, "Noise");
    }

    #[test]
    fn test_status_serializes_kebab_case() {
        let value = serde_json::to_value(ComplaintStatus::InProgress).unwrap();
        assert_eq!(value, json!("in-progress"));
        let value = serde_json::to_value(Urgency::NonUrgent).unwrap();
        assert_eq!(value, json!("non-urgent"));
    }

    #[test]
    fn test_chat_keeps_stored_order() {
        let complaint: ComplaintRecord = serde_json::from_value(json!({
            "chat": {
                "zzz": { "senderId": "u1", "body": "first", "read": false },
                "aaa": { "senderId": "admin", "body": "second", "read": false },
            }
        }))
        .unwrap();

        let messages = chat_messages(&complaint.chat);
        assert_eq!(messages[0].body, "first");
        assert_eq!(messages[1].body, "second");
        assert!(messages[0].is_unread());
        assert!(!messages[1].is_unread());
    }

    #[test]
    fn test_mistyped_fields_keep_the_record() {
        let users = json!({
            "u1": {
                "name": "Ana",
                "contact": 9171234567_u64,
                "purok": null,
                "idstatus": 3,
                "userComplaints": {
                    "c1": {
                        "type": "Noise",
                        "timestamp": 1709650000000_u64,
                        "label": "urgent",
                        "chat": {
                            "m1": { "senderId": 42, "body": 7, "read": "false" },
                            "m2": { "senderId": "u1", "body": "ok", "read": "TRUE" },
                        }
                    },
                    "c2": { "type": "Garbage", "chat": "not a map" }
                }
            }
        });

        let rows = keyed_entries::<UserRecord>(&users);
        assert_eq!(rows.len(), 1);
        let user = &rows[0].1;
        assert_eq!(user.contact, "9171234567");
        assert_eq!(user.purok, "");
        assert_eq!(user.idstatus, IdStatus::Pending);
        assert_eq!(user.user_complaints.len(), 2);

        let complaints = keyed_entries::<ComplaintRecord>(&Value::Object(user.user_complaints.clone()));
        assert_eq!(complaints.len(), 2);
        assert_eq!(complaints[0].1.timestamp, "1709650000000");
        assert_eq!(complaints[0].1.label, Urgency::Urgent);
        assert!(complaints[1].1.chat.is_empty());

        let messages = chat_messages(&complaints[0].1.chat);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].sender_id, "42");
        assert_eq!(messages[0].body, "7");
        assert!(messages[0].is_unread());
        assert!(messages[1].read);
    }

    #[test]
    fn test_message_path() {
        assert_eq!(
            message_path("u1", "c1", "m1"),
            "users/u1/userComplaints/c1/chat/m1"
        );
    }
}
