//! In-memory implementation of [`GraphStore`].
//!
//! [`InMemoryStore`] is the backend for tests and for sessions that never
//! touch the disk.

use std::collections::BTreeMap;

use crate::error::StorageError;
use crate::traits::{check_name, GraphStore};

#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    entries: BTreeMap<String, Vec<u8>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GraphStore for InMemoryStore {
    fn put(&mut self, name: &str, bytes: &[u8]) -> Result<(), StorageError> {
        check_name(name)?;
        self.entries.insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    fn get(&self, name: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.entries.get(name).cloned())
    }

    fn remove(&mut self, name: &str) -> Result<bool, StorageError> {
        Ok(self.entries.remove(name).is_some())
    }

    fn names(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.entries.keys().cloned().collect())
    }
}
