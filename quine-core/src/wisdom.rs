//! Wisdom: key-value state that survives process replacement.
//!
//! The only channel from a pre-exec process to its replacement is the
//! environment, so wisdom lives in `QUINE_WISDOM_<KEY>` variables. Keys are
//! uppercase alphanumerics and underscores; values are opaque strings.

use std::collections::BTreeMap;

use crate::config::ENV_WISDOM_PREFIX;

/// Ordered wisdom map.
///
/// Backed by a `BTreeMap` so iteration order is the sorted key order the
/// system prompt renders. Keys with empty values are never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Wisdom {
    entries: BTreeMap<String, String>,
}

impl Wisdom {
    /// Create an empty wisdom map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect wisdom from `QUINE_WISDOM_*` environment variables.
    ///
    /// Variables with invalid key suffixes or empty values are skipped.
    #[must_use]
    pub fn from_env() -> Self {
        let mut wisdom = Self::new();
        for (name, value) in std::env::vars() {
            if let Some(key) = name.strip_prefix(ENV_WISDOM_PREFIX) {
                wisdom.set(key, &value);
            }
        }
        wisdom
    }

    /// Insert a key, dropping it instead if the value is empty or the key
    /// is not `[A-Z0-9_]+`.
    ///
    /// Returns whether the entry was stored.
    pub fn set(&mut self, key: &str, value: &str) -> bool {
        if value.is_empty() || !is_valid_key(key) {
            return false;
        }
        self.entries.insert(key.to_string(), value.to_string());
        true
    }

    /// Merge `updates` into this map: new keys overwrite existing ones,
    /// empty values delete.
    pub fn merge(&mut self, updates: &BTreeMap<String, String>) {
        for (key, value) in updates {
            if !is_valid_key(key) {
                continue;
            }
            if value.is_empty() {
                self.entries.remove(key);
            } else {
                self.entries.insert(key.clone(), value.clone());
            }
        }
    }

    /// Iterate entries in sorted key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Environment variable pairs carrying this map to a child or
    /// replacement process.
    #[must_use]
    pub fn to_env(&self) -> Vec<(String, String)> {
        self.entries
            .iter()
            .map(|(k, v)| (format!("{ENV_WISDOM_PREFIX}{k}"), v.clone()))
            .collect()
    }
}

/// Whether `key` is a valid wisdom key: non-empty, `[A-Z0-9_]` only.
#[must_use]
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'_')
}
