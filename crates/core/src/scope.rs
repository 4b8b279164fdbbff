//! Ambient logging scopes.
//!
//! A [`ScopeStack`] holds the context values active for a logger. Each
//! pushed value is classified once as a [`ScopeValue`] variant and removed
//! again when its [`ScopeGuard`] drops. [`flatten_scopes`] merges the stack
//! into a single map, renaming keys on collision.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;

use crate::template::format_template;
use crate::types::ValueMap;

/// Highest suffix tried before falling back to a random key.
const MAX_KEY_ATTEMPTS: usize = 50;

// ---------------------------------------------------------------------------
// ScopeValue
// ---------------------------------------------------------------------------

/// One ambient context value.
#[derive(Debug, Clone, PartialEq)]
pub enum ScopeValue {
    /// A collection of named values.
    Pairs(Vec<(String, Value)>),
    /// A single named value.
    Pair(String, Value),
    /// A formatted message scope such as `"The current user is {user}"`.
    Template {
        template: String,
        values: Vec<(String, Value)>,
    },
    /// Anything else, stored under a generated key.
    Value(Value),
}

impl ScopeValue {
    pub fn pair(key: impl Into<String>, value: impl Into<Value>) -> Self {
        ScopeValue::Pair(key.into(), value.into())
    }

    pub fn value(value: impl Into<Value>) -> Self {
        ScopeValue::Value(value.into())
    }

    pub fn template(
        template: impl Into<String>,
        values: impl IntoIterator<Item = (String, Value)>,
    ) -> Self {
        ScopeValue::Template {
            template: template.into(),
            values: values.into_iter().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Flattening
// ---------------------------------------------------------------------------

/// Merge scope values into one map.
///
/// Named values keep their key, or become `key_2`, `key_3`, ... on
/// collision. Unnamed values take the first free numeric key (`"0"`, `"1"`,
/// ...). A template scope stores its rendered text under an unnamed key `n`
/// and each of its values under `n_<name>`.
pub fn flatten_scopes<'a>(scopes: impl IntoIterator<Item = &'a ScopeValue>) -> ValueMap {
    let mut map = ValueMap::new();
    let mut unnamed = 0;

    for scope in scopes {
        match scope {
            ScopeValue::Pairs(pairs) => {
                for (key, value) in pairs {
                    insert_unique(&mut map, key, value.clone());
                }
            }
            ScopeValue::Pair(key, value) => insert_unique(&mut map, key, value.clone()),
            ScopeValue::Template { template, values } => {
                let key = next_unnamed_key(&map, &mut unnamed);
                let named: ValueMap = values.iter().cloned().collect();
                map.insert(key.clone(), Value::String(format_template(template, &named)));
                for (name, value) in values {
                    insert_unique(&mut map, &format!("{key}_{name}"), value.clone());
                }
            }
            ScopeValue::Value(value) => {
                let key = next_unnamed_key(&map, &mut unnamed);
                map.insert(key, value.clone());
            }
        }
    }

    map
}

/// Insert `value` under `desired`, or under a renamed key if taken.
pub fn insert_unique(map: &mut ValueMap, desired: &str, value: Value) {
    let key = unique_key(map, desired);
    map.insert(key, value);
}

fn unique_key(map: &ValueMap, desired: &str) -> String {
    if !map.contains_key(desired) {
        return desired.to_string();
    }

    (2..MAX_KEY_ATTEMPTS)
        .map(|i| format!("{desired}_{i}"))
        .find(|candidate| !map.contains_key(candidate))
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

fn next_unnamed_key(map: &ValueMap, unnamed: &mut usize) -> String {
    for i in *unnamed..MAX_KEY_ATTEMPTS {
        let key = i.to_string();
        if !map.contains_key(&key) {
            *unnamed = i + 1;
            return key;
        }
    }
    uuid::Uuid::new_v4().to_string()
}

// ---------------------------------------------------------------------------
// ScopeStack
// ---------------------------------------------------------------------------

/// Thread-safe stack of active scopes, shared by clones of one logger.
#[derive(Debug, Clone, Default)]
pub struct ScopeStack {
    inner: Arc<ScopeStackInner>,
}

#[derive(Debug, Default)]
struct ScopeStackInner {
    next_id: AtomicU64,
    entries: Mutex<Vec<(u64, ScopeValue)>>,
}

impl ScopeStackInner {
    fn entries(&self) -> MutexGuard<'_, Vec<(u64, ScopeValue)>> {
        // A panic while holding the lock cannot leave the vector half-updated.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a scope; it stays active until the returned guard drops.
    #[must_use = "the scope ends as soon as the guard is dropped"]
    pub fn push(&self, value: ScopeValue) -> ScopeGuard {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.entries().push((id, value));
        ScopeGuard {
            stack: Arc::clone(&self.inner),
            id,
        }
    }

    /// Flattened view of every active scope, or `None` when there are none.
    pub fn snapshot(&self) -> Option<ValueMap> {
        let entries = self.inner.entries();
        if entries.is_empty() {
            return None;
        }
        Some(flatten_scopes(entries.iter().map(|(_, v)| v)))
    }

    pub fn len(&self) -> usize {
        self.inner.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Keeps one scope active; removes exactly that scope when dropped.
#[derive(Debug)]
pub struct ScopeGuard {
    stack: Arc<ScopeStackInner>,
    id: u64,
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        let mut entries = self.stack.entries();
        if let Some(pos) = entries.iter().rposition(|(id, _)| *id == self.id) {
            entries.remove(pos);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
