//! Realtime document store abstraction
//!
//! Every mutation is addressed by record path. Subscribers name a top-level
//! subtree and receive its full current value, first on subscribe and again
//! after every change beneath it. Readers replace their mirrored copy
//! wholesale on each delivery; there is no incremental merge.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::tree::{self, PushIdGenerator};

/// Handle to a live subtree subscription. Dropping it tears it down.
pub struct Subscription {
    path: String,
    receiver: mpsc::UnboundedReceiver<Value>,
}

impl Subscription {
    pub fn new(path: &str, receiver: mpsc::UnboundedReceiver<Value>) -> Self {
        Self {
            path: path.to_string(),
            receiver,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Wait for the next full value of the subtree. `Value::Null` means the
    /// subtree is empty. `None` once the store side has gone away.
    pub async fn next(&mut self) -> Option<Value> {
        self.receiver.recv().await
    }

    /// Drain deliveries already queued, keeping only the newest.
    pub fn latest(&mut self) -> Option<Value> {
        let mut newest = None;
        while let Ok(value) = self.receiver.try_recv() {
            newest = Some(value);
        }
        newest
    }
}

pub trait RemoteStore: Send + Sync {
    fn get(&self, path: &str) -> impl Future<Output = Result<Option<Value>>> + Send;

    fn set(&self, path: &str, value: Value) -> impl Future<Output = Result<()>> + Send;

    /// Point update of the given fields under `path`.
    fn update(&self, path: &str, fields: Map<String, Value>)
        -> impl Future<Output = Result<()>> + Send;

    /// Apply every `path -> value` pair atomically: all land or none do.
    fn update_many(&self, updates: Map<String, Value>) -> impl Future<Output = Result<()>> + Send;

    /// Append `value` under `path` with a generated, time-ordered id.
    fn push(&self, path: &str, value: Value) -> impl Future<Output = Result<String>> + Send;

    fn remove(&self, path: &str) -> impl Future<Output = Result<()>> + Send;

    fn subscribe(&self, root: &str) -> impl Future<Output = Result<Subscription>> + Send;
}

/// Shared handles are stores too, so long-lived owners such as the messaging
/// desk can hold one.
impl<T: RemoteStore> RemoteStore for Arc<T> {
    fn get(&self, path: &str) -> impl Future<Output = Result<Option<Value>>> + Send {
        (**self).get(path)
    }

    fn set(&self, path: &str, value: Value) -> impl Future<Output = Result<()>> + Send {
        (**self).set(path, value)
    }

    fn update(&self, path: &str, fields: Map<String, Value>)
        -> impl Future<Output = Result<()>> + Send {
        (**self).update(path, fields)
    }

    fn update_many(&self, updates: Map<String, Value>) -> impl Future<Output = Result<()>> + Send {
        (**self).update_many(updates)
    }

    fn push(&self, path: &str, value: Value) -> impl Future<Output = Result<String>> + Send {
        (**self).push(path, value)
    }

    fn remove(&self, path: &str) -> impl Future<Output = Result<()>> + Send {
        (**self).remove(path)
    }

    fn subscribe(&self, root: &str) -> impl Future<Output = Result<Subscription>> + Send {
        (**self).subscribe(root)
    }
}

// ============================================================================
// In-memory store
// ============================================================================

struct Subscriber {
    root: String,
    sender: mpsc::UnboundedSender<Value>,
}

/// In-process realtime store. Writes are applied under one lock, so
/// `update_many` is atomic.
pub struct MemoryStore {
    data: RwLock<Value>,
    subscribers: Mutex<Vec<Subscriber>>,
    ids: PushIdGenerator,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_data(Value::Object(Map::new()))
    }

    pub fn with_data(data: Value) -> Self {
        Self {
            data: RwLock::new(data),
            subscribers: Mutex::new(Vec::new()),
            ids: PushIdGenerator::new(),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Make every subsequent write fail, as if the connection dropped.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> Value {
        self.data.read().clone()
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Store("store unavailable".to_string()));
        }
        Ok(())
    }

    /// Apply a mutation on a scratch copy, commit it, then notify the
    /// subscribers of every root it touched.
    fn write<F>(&self, touched: Vec<String>, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut Value) -> Result<()>,
    {
        self.check_writable()?;
        {
            let mut data = self.data.write();
            let mut scratch = data.clone();
            mutate(&mut scratch)?;
            *data = scratch;
        }
        self.notify(&touched);
        Ok(())
    }

    fn notify(&self, touched: &[String]) {
        let data = self.data.read();
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|sub| {
            let whole = sub.root.is_empty();
            if !whole && !touched.iter().any(|r| r.is_empty() || *r == sub.root) {
                return !sub.sender.is_closed();
            }
            let value = tree::get(&data, &sub.root).cloned().unwrap_or(Value::Null);
            sub.sender.send(value).is_ok()
        });
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn touched_root(path: &str) -> String {
    tree::root_of(path).unwrap_or_default().to_string()
}

impl RemoteStore for MemoryStore {
    async fn get(&self, path: &str) -> Result<Option<Value>> {
        Ok(tree::get(&self.data.read(), path).cloned())
    }

    async fn set(&self, path: &str, value: Value) -> Result<()> {
        self.write(vec![touched_root(path)], |data| tree::set(data, path, value))
    }

    async fn update(&self, path: &str, fields: Map<String, Value>) -> Result<()> {
        self.write(vec![touched_root(path)], |data| {
            tree::update(data, path, &fields)
        })
    }

    async fn update_many(&self, updates: Map<String, Value>) -> Result<()> {
        let touched = updates.keys().map(|p| touched_root(p)).collect();
        self.write(touched, |data| tree::update(data, "", &updates))
    }

    async fn push(&self, path: &str, value: Value) -> Result<String> {
        let id = self.ids.next_id();
        let child = tree::join(path, &id);
        self.write(vec![touched_root(path)], |data| tree::set(data, &child, value))?;
        Ok(id)
    }

    async fn remove(&self, path: &str) -> Result<()> {
        self.write(vec![touched_root(path)], |data| tree::remove(data, path))
    }

    async fn subscribe(&self, root: &str) -> Result<Subscription> {
        let root = tree::segments(root).join("/");
        let (sender, receiver) = mpsc::unbounded_channel();

        let current = tree::get(&self.data.read(), &root).cloned().unwrap_or(Value::Null);
        // The receiver is alive, so the initial delivery cannot fail.
        let _ = sender.send(current);

        self.subscribers.lock().push(Subscriber {
            root: root.clone(),
            sender,
        });

        Ok(Subscription::new(&root, receiver))
    }
}
