//! Counted resource stock.
//!
//! A [`ResourceLedger`] maps resource kinds to strictly positive counts: a
//! kind whose count reaches zero is dropped from the map, so an empty ledger
//! and a ledger of zeros are the same value. Removals that would go below
//! zero are rejected whole.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::StorageError;

const DEFAULT_NAMESPACE: &str = "minecraft";

/// Namespaced resource identifier such as `minecraft:emerald`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceKind(String);

impl ResourceKind {
    /// Parse `namespace:path`, or a bare `path` in the default namespace.
    ///
    /// Returns `None` for anything with an empty part, more than one `:`, or
    /// characters outside `[a-z0-9_.-]` (plus `/` in the path).
    pub fn parse(raw: &str) -> Option<Self> {
        let (namespace, path) = match raw.split_once(':') {
            Some((ns, path)) => (ns, path),
            None => (DEFAULT_NAMESPACE, raw),
        };
        if namespace.is_empty() || path.is_empty() || path.contains(':') {
            return None;
        }
        let namespace_ok = namespace.chars().all(is_id_char);
        let path_ok = path.chars().all(|c| is_id_char(c) || c == '/');
        if !namespace_ok || !path_ok {
            return None;
        }
        Some(Self(format!("{namespace}:{path}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn namespace(&self) -> &str {
        self.0.split_once(':').map(|(ns, _)| ns).unwrap_or(DEFAULT_NAMESPACE)
    }

    pub fn path(&self) -> &str {
        self.0.split_once(':').map(|(_, path)| path).unwrap_or(&self.0)
    }
}

fn is_id_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '.' | '-')
}

impl TryFrom<String> for ResourceKind {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("malformed resource kind {value:?}"))
    }
}

impl From<ResourceKind> for String {
    fn from(kind: ResourceKind) -> Self {
        kind.0
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resource kind to count, with no zero entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceLedger {
    counts: BTreeMap<ResourceKind, u64>,
}

impl ResourceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: &ResourceKind) -> u64 {
        self.counts.get(kind).copied().unwrap_or(0)
    }

    pub fn contains(&self, kind: &ResourceKind) -> bool {
        self.counts.contains_key(kind)
    }

    /// Add stock. Adding zero is a no-op.
    pub fn add(&mut self, kind: ResourceKind, amount: u64) {
        if amount == 0 {
            return;
        }
        let count = self.counts.entry(kind).or_insert(0);
        *count = count.saturating_add(amount);
    }

    /// Remove stock, rejecting the whole removal if there is not enough.
    pub fn remove(&mut self, kind: &ResourceKind, amount: u64) -> Result<(), StorageError> {
        let available = self.get(kind);
        if amount > available {
            return Err(StorageError::InsufficientStock {
                kind: kind.clone(),
                available,
                requested: amount,
            });
        }
        self.set(kind.clone(), available - amount);
        Ok(())
    }

    /// Apply a signed change and return the new count.
    ///
    /// A change that would go negative fails without touching the ledger; a
    /// change that lands on zero drops the entry.
    pub fn apply_delta(&mut self, kind: &ResourceKind, delta: i64) -> Result<u64, StorageError> {
        if delta < 0 {
            self.remove(kind, delta.unsigned_abs())?;
        } else {
            self.add(kind.clone(), delta as u64);
        }
        Ok(self.get(kind))
    }

    /// Overwrite a count. Zero removes the entry.
    pub fn set(&mut self, kind: ResourceKind, count: u64) {
        if count == 0 {
            self.counts.remove(&kind);
        } else {
            self.counts.insert(kind, count);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ResourceKind, u64)> {
        self.counts.iter().map(|(kind, count)| (kind, *count))
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.counts.values().fold(0u64, |sum, c| sum.saturating_add(*c))
    }
}
