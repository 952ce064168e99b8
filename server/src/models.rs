//! Data models for the Barangay Desk server

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use barangay_core::analytics::{StatusBreakdown, TypeCount};
use barangay_core::validation::Decision;
use barangay_core::{ComplaintStatus, IdStatus};

// ============================================================================
// Session Models
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Session {
    pub token_hash: String,
    pub email: String,
    pub created_at: i64,
    pub expires_at: i64,
    pub is_valid: bool,
}

// ============================================================================
// Auth Requests/Responses
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Username or email.
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub email: String,
    pub expires_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetRequest {
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct PasswordResetResponse {
    pub email: String,
}

// ============================================================================
// Desk Requests
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    /// Checked strictly; unknown names are rejected rather than defaulted.
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct StatusUpdateResponse {
    pub status: ComplaintStatus,
    pub changed: bool,
}

#[derive(Debug, Deserialize)]
pub struct ReplyRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub decision: Decision,
}

#[derive(Debug, Serialize)]
pub struct DecisionResponse {
    pub user_id: String,
    pub idstatus: IdStatus,
}

#[derive(Debug, Deserialize)]
pub struct RatedEntityRequest {
    pub name: String,
    pub position: String,
    #[serde(default)]
    pub contact: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub search: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ValidationQuery {
    pub status: Option<IdStatus>,
    pub search: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MonthlyQuery {
    pub year: Option<i32>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WeeklyQuery {
    pub reference: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SummaryQuery {
    /// Comma-separated feedback keys hidden from the sidebar.
    pub dismissed: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BreakdownResponse {
    pub status: StatusBreakdown,
    pub types: Vec<TypeCount>,
}

#[derive(Debug, Serialize)]
pub struct PushResponse {
    pub id: String,
}

// ============================================================================
// WebSocket Messages
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum WsClientMessage {
    #[serde(rename = "authenticate")]
    Authenticate { token: String },

    #[serde(rename = "subscribe")]
    Subscribe { path: String },

    #[serde(rename = "unsubscribe")]
    Unsubscribe { path: String },

    #[serde(rename = "ping")]
    Ping,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum WsServerMessage {
    #[serde(rename = "authenticated")]
    Authenticated { email: String },

    #[serde(rename = "error")]
    Error { code: String, message: String },

    /// Full current value of a watched path; `null` when empty.
    #[serde(rename = "value")]
    Value { path: String, value: Value },

    #[serde(rename = "unsubscribed")]
    Unsubscribed { path: String },

    #[serde(rename = "pong")]
    Pong,
}
