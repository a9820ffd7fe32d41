use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::config::cursor::Cursor;
use crate::config::path::{key_has_prefix, KeyPath};
use crate::error::{Error, Result};

/// One node in a configuration chain: a flat map from dotted keys to values,
/// an optional parent consulted on lookup misses, and a lock flag separating
/// the definition phase from the queryable phase.
///
/// `Configuration` is a cheap handle; clones share the same node, and handle
/// equality is identity.
#[derive(Clone)]
pub struct Configuration {
    inner: Arc<RwLock<ConfigState>>,
}

struct ConfigState {
    parent: Option<Configuration>,
    data: HashMap<String, Value>,
    locked: bool,
    version: u64,
}

/// Point-in-time export of a configuration chain: every visible entry folded
/// into a nested object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    pub data: Value,
    pub version: u64,
    pub locked: bool,
}

impl Configuration {
    /// A parent handle must already exist to be passed here, which is what
    /// keeps the chain acyclic.
    pub fn new(parent: Option<Configuration>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(ConfigState {
                parent,
                data: HashMap::new(),
                locked: false,
                version: 0,
            })),
        }
    }

    /// Cursor positioned at the top of the namespace.
    pub fn root(&self) -> Cursor {
        Cursor::new(self.clone(), KeyPath::root())
    }

    pub fn parent(&self) -> Option<Configuration> {
        self.inner.read().parent.clone()
    }

    /// Direct lookup by full dotted key, falling back to the parent chain.
    pub fn get(&self, key: &str) -> Option<Value> {
        let state = self.inner.read();
        if let Some(value) = state.data.get(key) {
            return Some(value.clone());
        }
        let parent = state.parent.clone();
        drop(state);
        parent.and_then(|parent| parent.get(key))
    }

    /// Lock-checked write at a full dotted key.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        if self.is_locked() {
            return Err(Error::Locked(key.to_owned()));
        }
        self.insert_raw(key.to_owned(), value.into());
        Ok(())
    }

    /// Lock-checked removal of this node's own entry. Returns whether the
    /// key was present.
    pub fn remove(&self, key: &str) -> Result<bool> {
        let mut state = self.inner.write();
        if state.locked {
            return Err(Error::Locked(key.to_owned()));
        }
        let removed = state.data.remove(key).is_some();
        if removed {
            state.version += 1;
        }
        Ok(removed)
    }

    // Primitive beneath the lock-checked writes; lock state is enforced in
    // the resolver layer, not here.
    pub(crate) fn insert_raw(&self, key: String, value: Value) {
        let mut state = self.inner.write();
        trace!(%key, "store value");
        state.data.insert(key, value);
        state.version += 1;
    }

    /// True when this node or any ancestor holds `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        let state = self.inner.read();
        if state.data.contains_key(key) {
            return true;
        }
        let parent = state.parent.clone();
        drop(state);
        parent.is_some_and(|parent| parent.contains_key(key))
    }

    /// True when some stored key in this node or an ancestor equals `prefix`
    /// or extends it past a `.` boundary.
    pub fn contains_prefix(&self, prefix: &str) -> bool {
        let state = self.inner.read();
        if state.data.keys().any(|key| key_has_prefix(key, prefix)) {
            return true;
        }
        let parent = state.parent.clone();
        drop(state);
        parent.is_some_and(|parent| parent.contains_prefix(prefix))
    }

    /// This node's own entries, sorted by key.
    pub fn entries(&self) -> BTreeMap<String, Value> {
        self.inner
            .read()
            .data
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Entries across the chain whose key matches `pattern`, parent entries
    /// collected first so nearer descendants override them. A `*` in the
    /// pattern matches one or more characters, everything else is literal,
    /// and the match is anchored on the left only.
    pub fn section(&self, pattern: &str) -> BTreeMap<String, Value> {
        let rx = section_regex(pattern);
        let mut result = BTreeMap::new();
        self.collect_section(&rx, &mut result);
        result
    }

    fn collect_section(&self, rx: &Regex, out: &mut BTreeMap<String, Value>) {
        let state = self.inner.read();
        let parent = state.parent.clone();
        let matching: Vec<(String, Value)> = state
            .data
            .iter()
            .filter(|(key, _)| rx.is_match(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        drop(state);

        if let Some(parent) = parent {
            parent.collect_section(rx, out);
        }
        out.extend(matching);
    }

    pub fn lock(&self) {
        self.inner.write().locked = true;
    }

    pub fn unlock(&self) {
        self.inner.write().locked = false;
    }

    pub fn is_locked(&self) -> bool {
        self.inner.read().locked
    }

    /// Re-open a locked configuration for a scoped mutation. The lock is
    /// restored on every exit path, including builder failure.
    pub fn edit<F>(&self, builder: F) -> Result<()>
    where
        F: FnOnce(&Cursor) -> Result<()>,
    {
        debug!("edit session opened");
        let _relock = Relock::open(self);
        builder(&self.root())
    }

    /// Count of successful writes to this node.
    pub fn version(&self) -> u64 {
        self.inner.read().version
    }

    /// Chain-merged view of every visible entry, folded into a nested object.
    pub fn snapshot(&self) -> ConfigSnapshot {
        // An empty pattern matches every key.
        let entries = self.section("");
        let mut data = Map::new();
        for (key, value) in entries {
            let segments: Vec<&str> = key.split('.').collect();
            insert_nested(&mut data, &segments, value);
        }

        let state = self.inner.read();
        ConfigSnapshot {
            data: Value::Object(data),
            version: state.version,
            locked: state.locked,
        }
    }
}

impl PartialEq for Configuration {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Configuration {}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.read();
        let mut keys: Vec<&String> = state.data.keys().collect();
        keys.sort();
        f.debug_struct("Configuration")
            .field("keys", &keys)
            .field("locked", &state.locked)
            .field("has_parent", &state.parent.is_some())
            .finish()
    }
}

/// Unlocks on construction, relocks on drop.
pub(crate) struct Relock<'a> {
    config: &'a Configuration,
}

impl<'a> Relock<'a> {
    pub(crate) fn open(config: &'a Configuration) -> Self {
        config.unlock();
        Self { config }
    }
}

impl Drop for Relock<'_> {
    fn drop(&mut self) {
        self.config.lock();
    }
}

fn section_regex(pattern: &str) -> Regex {
    let escaped = regex::escape(pattern).replace("\\*", ".+?");
    Regex::new(&format!("^{escaped}")).expect("escaped pattern is a valid regex")
}

fn insert_nested(object: &mut Map<String, Value>, segments: &[&str], value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };
    if rest.is_empty() {
        object.insert((*head).to_owned(), value);
        return;
    }

    let entry = object
        .entry((*head).to_owned())
        .or_insert_with(|| Value::Object(Map::new()));
    if !entry.is_object() {
        *entry = Value::Object(Map::new());
    }
    let child = entry.as_object_mut().expect("entry must be object");
    insert_nested(child, rest, value);
}
