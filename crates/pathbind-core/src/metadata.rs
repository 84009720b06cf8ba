//! Per-call metadata passed through to member getters and setters.
//!
//! The engine never interprets metadata; it forwards whatever the binding
//! layer supplies so descriptors can read culture, converters, or similar
//! context.

use std::collections::HashMap;

use crate::object::Value;

/// Small string-keyed bag of [`Value`]s.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    entries: HashMap<String, Value>,
}

impl Metadata {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.entries.insert(key.into(), value)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
