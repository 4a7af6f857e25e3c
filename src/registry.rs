//! Key registry: the extracted key -> text mapping of a run.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Outcome of a single registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// Key was newly added
    Inserted,
    /// Same key and value were already present
    Existing,
    /// Key exists with a different value; the first value is kept
    Conflict { existing: String },
}

/// Accumulate-only mapping from key to canonical text.
///
/// Iteration follows first-insertion order. The core always registers
/// `key == value`, so conflicts only surface when registries from independent
/// runs are compared by the merge step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyRegistry {
    entries: Map<String, Value>,
}

impl KeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, key: &str, value: &str) -> Registration {
        match self.entries.get(key) {
            Some(Value::String(existing)) if existing == value => Registration::Existing,
            Some(existing) => Registration::Conflict {
                existing: existing.as_str().unwrap_or_default().to_string(),
            },
            None => {
                self.entries
                    .insert(key.to_string(), Value::String(value.to_string()));
                Registration::Inserted
            }
        }
    }

    /// Register every entry of `other`; returns the conflicting keys
    pub fn merge(&mut self, other: &KeyRegistry) -> Vec<String> {
        let mut conflicts = Vec::new();
        for (key, value) in other.iter() {
            if let Registration::Conflict { .. } = self.register(key, value) {
                conflicts.push(key.to_string());
            }
        }
        conflicts
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(Value::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .filter_map(|(k, v)| v.as_str().map(|v| (k.as_str(), v)))
    }

    /// Order-independent view, for comparing registries
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }
}
