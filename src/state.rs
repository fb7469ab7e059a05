// src/state.rs

//! Opaque key/value state handed from one build to the next.

use std::collections::BTreeMap;

use serde_json::Value;

pub type ValueMap = BTreeMap<String, Value>;

/// Two-generation value store.
///
/// Reads only ever see what the previous build left behind; writes go to a
/// separate pending map that becomes visible to the *next* build.
#[derive(Debug, Clone, Default)]
pub struct StateRegistry {
    inherited: ValueMap,
    pending: ValueMap,
}

impl StateRegistry {
    pub fn new(inherited: ValueMap) -> Self {
        Self {
            inherited,
            pending: ValueMap::new(),
        }
    }

    /// Value stored under `key` by the previous build.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.inherited.get(key)
    }

    /// Last write wins within a build.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.pending.insert(key.into(), value);
    }

    /// Inherited values overlaid with this build's writes.
    pub fn merged(&self) -> ValueMap {
        let mut merged = self.inherited.clone();
        merged.extend(self.pending.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }
}
