//! Realtime document store backed by SQLite
//!
//! Implements the core `RemoteStore` seam on top of `Storage`, and fans each
//! committed change out to the subscribers of the roots it touched.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::{mpsc, Mutex};

use barangay_core::tree::{self, PushIdGenerator};
use barangay_core::{RemoteStore, Subscription};

use crate::error::Result;
use crate::models::WsServerMessage;
use crate::storage::Storage;
use crate::websocket::{normalize, SubscriptionManager};

pub struct Database {
    storage: Arc<Storage>,
    subscriptions: Arc<SubscriptionManager>,
    ids: PushIdGenerator,
    local_watchers: AtomicU64,
    /// Held from a write until its subscribers have been sent the result, so
    /// deliveries go out in commit order.
    commit_lock: Mutex<()>,
}

fn touched_root(path: &str) -> String {
    tree::root_of(path).unwrap_or_default().to_string()
}

impl Database {
    pub fn new(storage: Arc<Storage>, subscriptions: Arc<SubscriptionManager>) -> Self {
        Self {
            storage,
            subscriptions,
            ids: PushIdGenerator::new(),
            local_watchers: AtomicU64::new(0),
            commit_lock: Mutex::new(()),
        }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn subscriptions(&self) -> &SubscriptionManager {
        &self.subscriptions
    }

    /// Current value at `path`, `Value::Null` when empty.
    pub async fn value_at(&self, path: &str) -> Result<Value> {
        Ok(self.storage.get(path).await?.unwrap_or(Value::Null))
    }

    async fn commit<F>(&self, touched: Vec<String>, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut Value) -> barangay_core::Result<()>,
    {
        let _guard = self.commit_lock.lock().await;
        let roots = self.storage.write(&touched, mutate).await?;
        self.publish(&roots).await;
        Ok(())
    }

    /// Push the fresh value of every watched path under `roots`.
    async fn publish(&self, roots: &[String]) {
        for path in self.subscriptions.watched_paths(roots) {
            match self.value_at(&path).await {
                Ok(value) => self.subscriptions.publish(&path, &value),
                Err(e) => tracing::error!("Failed to read {} for subscribers: {}", path, e),
            }
        }
    }

    pub async fn set_value(&self, path: &str, value: Value) -> Result<()> {
        self.commit(vec![touched_root(path)], |doc| tree::set(doc, path, value))
            .await
    }

    pub async fn update_fields(&self, path: &str, fields: Map<String, Value>) -> Result<()> {
        self.commit(vec![touched_root(path)], |doc| tree::update(doc, path, &fields))
            .await
    }

    /// Multi-path update; every pair lands or none does.
    pub async fn update_paths(&self, updates: Map<String, Value>) -> Result<()> {
        let mut touched: Vec<String> = updates.keys().map(|p| touched_root(p)).collect();
        touched.sort();
        touched.dedup();
        self.commit(touched, |doc| tree::update(doc, "", &updates)).await
    }

    pub async fn push_value(&self, path: &str, value: Value) -> Result<String> {
        let id = self.ids.next_id();
        let child = tree::join(path, &id);
        self.commit(vec![touched_root(path)], |doc| tree::set(doc, &child, value))
            .await?;
        Ok(id)
    }

    pub async fn remove_value(&self, path: &str) -> Result<()> {
        self.commit(vec![touched_root(path)], |doc| tree::remove(doc, path))
            .await
    }

    /// Replace the whole tree, e.g. from an export file.
    pub async fn replace_all(&self, data: Value) -> Result<()> {
        self.commit(vec![String::new()], |doc| tree::set(doc, "", data))
            .await
    }

    /// Start delivering `path` to a registered connection, beginning with its
    /// current value. No commit can land between the replay and the first
    /// change notification.
    pub async fn attach(&self, connection_id: &str, path: &str) -> Result<()> {
        let path = normalize(path);
        let _guard = self.commit_lock.lock().await;

        let value = self.value_at(&path).await?;
        self.subscriptions.subscribe(connection_id, &path);
        self.subscriptions
            .send_to(connection_id, WsServerMessage::Value { path, value });
        Ok(())
    }

    /// Watch `path` from inside the process. The watcher is unregistered as
    /// soon as the returned `Subscription` is dropped.
    pub async fn watch(&self, path: &str) -> Result<Subscription> {
        let path = normalize(path);
        let connection_id = format!(
            "local-{}",
            self.local_watchers.fetch_add(1, Ordering::Relaxed)
        );

        let (tx, mut rx) = mpsc::unbounded_channel::<WsServerMessage>();
        self.subscriptions.register(&connection_id, "local", tx);
        if let Err(e) = self.attach(&connection_id, &path).await {
            self.subscriptions.unregister(&connection_id);
            return Err(e);
        }

        let (value_tx, value_rx) = mpsc::unbounded_channel::<Value>();
        let subscriptions = Arc::clone(&self.subscriptions);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    message = rx.recv() => match message {
                        Some(WsServerMessage::Value { value, .. }) => {
                            if value_tx.send(value).is_err() {
                                break;
                            }
                        }
                        Some(_) => {}
                        None => break,
                    },
                    _ = value_tx.closed() => break,
                }
            }
            subscriptions.unregister(&connection_id);
        });

        Ok(Subscription::new(&path, value_rx))
    }
}

impl RemoteStore for Database {
    async fn get(&self, path: &str) -> barangay_core::Result<Option<Value>> {
        Ok(self.storage.get(path).await?)
    }

    async fn set(&self, path: &str, value: Value) -> barangay_core::Result<()> {
        Ok(self.set_value(path, value).await?)
    }

    async fn update(&self, path: &str, fields: Map<String, Value>) -> barangay_core::Result<()> {
        Ok(self.update_fields(path, fields).await?)
    }

    async fn update_many(&self, updates: Map<String, Value>) -> barangay_core::Result<()> {
        Ok(self.update_paths(updates).await?)
    }

    async fn push(&self, path: &str, value: Value) -> barangay_core::Result<String> {
        Ok(self.push_value(path, value).await?)
    }

    async fn remove(&self, path: &str) -> barangay_core::Result<()> {
        Ok(self.remove_value(path).await?)
    }

    async fn subscribe(&self, root: &str) -> barangay_core::Result<Subscription> {
        Ok(self.watch(root).await?)
    }
}
