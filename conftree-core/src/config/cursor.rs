use serde_json::Value;

use crate::config::configuration::Configuration;
use crate::config::path::KeyPath;
use crate::error::{Error, Result};

/// Immutable navigation position: a configuration handle plus the path
/// segments accumulated so far. Navigation calls return fresh cursors, so an
/// abandoned or failed expression leaves no state behind to clean up.
#[derive(Debug, Clone)]
pub struct Cursor {
    config: Configuration,
    path: KeyPath,
}

/// Outcome of a bare navigation read: a stored value, or a deeper cursor to
/// keep chaining on.
#[derive(Debug, Clone)]
pub enum Resolved {
    Value(Value),
    Cursor(Cursor),
}

impl Resolved {
    pub fn value(self) -> Option<Value> {
        match self {
            Self::Value(value) => Some(value),
            Self::Cursor(_) => None,
        }
    }

    pub fn cursor(self) -> Option<Cursor> {
        match self {
            Self::Cursor(cursor) => Some(cursor),
            Self::Value(_) => None,
        }
    }
}

impl Cursor {
    pub(crate) fn new(config: Configuration, path: KeyPath) -> Self {
        Self { config, path }
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn path(&self) -> &KeyPath {
        &self.path
    }

    /// Full dotted key for `name` at this position.
    pub fn key(&self, name: &str) -> String {
        self.path.join(name)
    }

    /// Direct read of `name` at this position, with parent fallback.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.config.get(&self.path.join(name))
    }

    /// Write `name` at this position. Rejected while the configuration is
    /// locked; a write ends the navigation expression.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        self.config.set(&self.path.join(name), value)
    }

    /// One step deeper. On a locked configuration the extended prefix must
    /// match at least one stored key in the chain.
    pub fn descend(&self, name: &str) -> Result<Cursor> {
        let key = self.path.join(name);
        if self.config.is_locked() && !self.config.contains_prefix(&key) {
            return Err(Error::UnknownKey(key));
        }
        Ok(Self::new(self.config.clone(), self.path.child(name)))
    }

    /// Bare read: the stored value when `name` resolves to one, otherwise a
    /// deeper cursor, validated against the stored key space once locked.
    pub fn resolve(&self, name: &str) -> Result<Resolved> {
        if let Some(value) = self.get(name) {
            return Ok(Resolved::Value(value));
        }
        self.descend(name).map(Resolved::Cursor)
    }

    /// Evaluate `f` one level deeper. This is the write-oriented block form
    /// and is rejected on a locked configuration.
    pub fn scope<F>(&self, name: &str, f: F) -> Result<()>
    where
        F: FnOnce(&Cursor) -> Result<()>,
    {
        let key = self.path.join(name);
        if self.config.is_locked() {
            return Err(Error::Locked(key));
        }
        f(&Self::new(self.config.clone(), self.path.child(name)))
    }
}
