//! The [`GraphStore`] trait: a flat namespace of serialized graphs.
//!
//! Backends only move bytes. Encoding and decoding stay in boxgraph-core, so
//! every backend stores exactly what `BoxGraph::to_bytes` produced.

use crate::error::StorageError;

/// Named byte blobs.
pub trait GraphStore {
    /// Stores `bytes` under `name`, replacing any previous entry.
    fn put(&mut self, name: &str, bytes: &[u8]) -> Result<(), StorageError>;

    fn get(&self, name: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Returns `false` if there was nothing to remove.
    fn remove(&mut self, name: &str) -> Result<bool, StorageError>;

    /// Entry names in ascending order.
    fn names(&self) -> Result<Vec<String>, StorageError>;

    fn contains(&self, name: &str) -> Result<bool, StorageError> {
        Ok(self.get(name)?.is_some())
    }
}

/// Rejects names that are empty or could escape a directory.
pub(crate) fn check_name(name: &str) -> Result<(), StorageError> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']);
    if bad {
        return Err(StorageError::InvalidName {
            name: name.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_validated() {
        assert!(check_name("before-mixdown").is_ok());
        for bad in ["", "..", "a/b", "a\\b"] {
            assert!(matches!(
                check_name(bad),
                Err(StorageError::InvalidName { .. })
            ));
        }
    }
}
