//! Barangay Complaint Desk core library
//!
//! Read models and staff operations for the complaint desk: conversation
//! reconciliation, rating aggregation, complaint analytics, ID validation,
//! plus the realtime document store they run against.

pub mod analytics;
pub mod complaints;
pub mod conversation;
pub mod dashboard;
pub mod error;
pub mod models;
pub mod network;
pub mod prefs;
pub mod purok;
pub mod rating;
pub mod store;
pub mod timestamp;
pub mod tree;
pub mod validation;

pub use conversation::{Conversation, ConversationKey, ConversationStatus, MessagingDesk};
pub use dashboard::{DashboardFeed, DashboardSnapshot, SidebarCounts};
pub use error::*;
pub use models::*;
pub use network::{ApiClient, AuthSession};
pub use prefs::LocalPrefs;
pub use store::{MemoryStore, RemoteStore, Subscription};

/// Where the desk server lives.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub server_host: String,
    pub server_port: u16,
    pub use_tls: bool,
}

impl ClientConfig {
    pub fn new(host: &str, port: u16, use_tls: bool) -> Self {
        Self {
            server_host: host.to_string(),
            server_port: port,
            use_tls,
        }
    }

    pub fn http_url(&self) -> String {
        let scheme = if self.use_tls { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.server_host, self.server_port)
    }

    pub fn ws_url(&self) -> String {
        let scheme = if self.use_tls { "wss" } else { "ws" };
        format!("{}://{}:{}/ws", scheme, self.server_host, self.server_port)
    }
}
