//! Path operations over the JSON document tree
//!
//! The whole store is one JSON document. A path is a `/`-separated list of
//! object keys; empty segments are ignored, so `""` and `"/"` both name the
//! root. Writing `null` deletes, and objects emptied by a delete are pruned,
//! matching how realtime document stores treat empty nodes.

use parking_lot::Mutex;
use rand::Rng;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

pub fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Join a base path and a relative one.
pub fn join(base: &str, child: &str) -> String {
    let mut parts = segments(base);
    parts.extend(segments(child));
    parts.join("/")
}

/// First segment of a path; the subtree whose subscribers see a change.
pub fn root_of(path: &str) -> Option<&str> {
    path.split('/').find(|s| !s.is_empty())
}

fn check_segments(path: &str) -> Result<Vec<&str>> {
    let parts = segments(path);
    for part in &parts {
        if part.contains(['.', '#', '$', '[', ']']) {
            return Err(Error::InvalidPath(path.to_string()));
        }
    }
    Ok(parts)
}

pub fn get<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut node = root;
    for part in segments(path) {
        node = node.as_object()?.get(part)?;
    }
    if node.is_null() {
        None
    } else {
        Some(node)
    }
}

pub fn set(root: &mut Value, path: &str, value: Value) -> Result<()> {
    let parts = check_segments(path)?;
    if value.is_null() {
        remove_parts(root, &parts);
        return Ok(());
    }

    let Some((last, parents)) = parts.split_last() else {
        *root = value;
        return Ok(());
    };

    let mut node = root;
    for part in parents {
        node = child_object(node).entry(part.to_string()).or_insert(Value::Null);
    }
    child_object(node).insert(last.to_string(), value);
    Ok(())
}

/// Set each `field -> value` relative to `path`. Field keys may span several
/// segments.
pub fn update(root: &mut Value, path: &str, fields: &Map<String, Value>) -> Result<()> {
    for (field, value) in fields {
        set(root, &join(path, field), value.clone())?;
    }
    Ok(())
}

pub fn remove(root: &mut Value, path: &str) -> Result<()> {
    let parts = check_segments(path)?;
    remove_parts(root, &parts);
    Ok(())
}

/// Turn `node` into an object if it is not one already.
fn child_object(node: &mut Value) -> &mut Map<String, Value> {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => map,
        _ => unreachable!("node was just replaced with an object"),
    }
}

/// Returns true if `node` is left empty and should be pruned by its parent.
fn remove_parts(node: &mut Value, parts: &[&str]) -> bool {
    let Some((first, rest)) = parts.split_first() else {
        *node = Value::Null;
        return true;
    };

    let Some(map) = node.as_object_mut() else {
        return false;
    };

    let prune_child = match map.get_mut(*first) {
        Some(child) => remove_parts(child, rest),
        None => false,
    };
    if prune_child {
        map.shift_remove(*first);
    }
    map.is_empty()
}

// ============================================================================
// Push ids
// ============================================================================

const PUSH_CHARS: &[u8] = b"-0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";

/// Generates 20-character ids that sort lexicographically in creation order:
/// 8 characters of millisecond timestamp followed by 12 random characters.
/// Ids minted within the same millisecond increment the random tail.
pub struct PushIdGenerator {
    last: Mutex<(i64, [u8; 12])>,
}

impl PushIdGenerator {
    pub fn new() -> Self {
        Self {
            last: Mutex::new((0, [0; 12])),
        }
    }

    pub fn next_id(&self) -> String {
        self.next_id_at(chrono::Utc::now().timestamp_millis())
    }

    fn next_id_at(&self, now_ms: i64) -> String {
        let mut last = self.last.lock();

        if now_ms <= last.0 {
            // Same (or skewed) millisecond: bump the tail, carrying left.
            for digit in last.1.iter_mut().rev() {
                if *digit < 63 {
                    *digit += 1;
                    break;
                }
                *digit = 0;
            }
        } else {
            let mut rng = rand::thread_rng();
            for digit in last.1.iter_mut() {
                *digit = rng.gen_range(0..64);
            }
            last.0 = now_ms;
        }

        let mut id = Vec::with_capacity(20);
        let mut ts = last.0;
        let mut stamp = [0u8; 8];
        for slot in stamp.iter_mut().rev() {
            *slot = PUSH_CHARS[(ts % 64) as usize];
            ts /= 64;
        }
        id.extend_from_slice(&stamp);
        id.extend(last.1.iter().map(|d| PUSH_CHARS[*d as usize]));

        String::from_utf8(id).unwrap_or_default()
    }
}

impl Default for PushIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
