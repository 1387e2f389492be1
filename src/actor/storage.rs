//! In-memory key-value store owned by the actor.

use std::collections::HashMap;

use bytes::Bytes;

#[derive(Debug, Default)]
/// Key to value map, later stores overwrite earlier ones.
pub struct Storage {
    values: HashMap<String, Bytes>,
}

impl Storage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: String, value: Bytes) {
        self.values.insert(key, value);
    }

    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.values.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
