//! Subscription management for live subtree delivery

use std::collections::HashSet;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::mpsc;

use barangay_core::tree;

use crate::models::WsServerMessage;

/// An open subscriber: a websocket client or an in-process watcher.
pub struct Connection {
    pub email: String,
    pub sender: mpsc::UnboundedSender<WsServerMessage>,
    pub paths: HashSet<String>,
}

/// Tracks every connection and the paths it watches.
pub struct SubscriptionManager {
    /// connection_id -> connection
    connections: DashMap<String, Connection>,
}

/// Normalized form of a watched path: `/users//` watches `users`.
pub fn normalize(path: &str) -> String {
    tree::segments(path).join("/")
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    pub fn register(
        &self,
        connection_id: &str,
        email: &str,
        sender: mpsc::UnboundedSender<WsServerMessage>,
    ) {
        self.connections.insert(
            connection_id.to_string(),
            Connection {
                email: email.to_string(),
                sender,
                paths: HashSet::new(),
            },
        );

        tracing::debug!("Connection registered: id={}, email={}", connection_id, email);
    }

    pub fn unregister(&self, connection_id: &str) {
        if let Some((_, conn)) = self.connections.remove(connection_id) {
            tracing::debug!(
                "Connection unregistered: id={}, email={}, paths={}",
                connection_id,
                conn.email,
                conn.paths.len()
            );
        }
    }

    pub fn is_registered(&self, connection_id: &str) -> bool {
        self.connections.contains_key(connection_id)
    }

    /// Start watching `path`. Returns false for an unknown connection.
    pub fn subscribe(&self, connection_id: &str, path: &str) -> bool {
        match self.connections.get_mut(connection_id) {
            Some(mut conn) => {
                conn.paths.insert(normalize(path));
                true
            }
            None => false,
        }
    }

    pub fn unsubscribe(&self, connection_id: &str, path: &str) -> bool {
        self.connections
            .get_mut(connection_id)
            .map(|mut conn| conn.paths.remove(&normalize(path)))
            .unwrap_or(false)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Every watched path affected by a change to any of `roots`. An empty
    /// root or an empty watched path means the whole tree.
    pub fn watched_paths(&self, roots: &[String]) -> Vec<String> {
        let whole = roots.iter().any(|r| r.is_empty());
        let mut paths: HashSet<String> = HashSet::new();

        for conn in self.connections.iter() {
            for path in &conn.paths {
                let affected = whole
                    || match tree::root_of(path) {
                        Some(root) => roots.iter().any(|r| r == root),
                        None => true,
                    };
                if affected {
                    paths.insert(path.clone());
                }
            }
        }

        paths.into_iter().collect()
    }

    /// Send the current value of `path` to everyone watching it. Connections
    /// whose receiver is gone are dropped.
    pub fn publish(&self, path: &str, value: &Value) {
        let mut dead = Vec::new();

        for conn in self.connections.iter() {
            if !conn.paths.contains(path) {
                continue;
            }
            let message = WsServerMessage::Value {
                path: path.to_string(),
                value: value.clone(),
            };
            if conn.sender.send(message).is_err() {
                dead.push(conn.key().clone());
            }
        }

        for connection_id in dead {
            tracing::warn!("Dropping closed subscriber {}", connection_id);
            self.unregister(&connection_id);
        }
    }

    /// Send a message to one connection.
    pub fn send_to(&self, connection_id: &str, message: WsServerMessage) {
        if let Some(conn) = self.connections.get(connection_id) {
            if let Err(e) = conn.sender.send(message) {
                tracing::warn!("Failed to send to connection {}: {}", connection_id, e);
            }
        }
    }
}

impl Default for SubscriptionManager {
    fn default() -> Self {
        Self::new()
    }
}
