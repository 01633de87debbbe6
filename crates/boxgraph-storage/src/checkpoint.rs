//! Named graph checkpoints.
//!
//! [`CheckpointManager`] snapshots the full graph under a name in any
//! [`GraphStore`] and restores it later as a new graph.

use serde::{Deserialize, Serialize};

use boxgraph_core::BoxGraph;

use crate::error::StorageError;
use crate::hash::graph_digest;
use crate::traits::GraphStore;

/// Listing entry for a stored checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointInfo {
    pub name: String,
    /// blake3 digest of the snapshot, hex encoded
    pub digest: String,
    pub boxes: usize,
}

impl CheckpointInfo {
    fn of(name: &str, graph: &BoxGraph) -> Self {
        CheckpointInfo {
            name: name.to_string(),
            digest: graph_digest(graph).to_hex().to_string(),
            boxes: graph.box_count(),
        }
    }
}

pub struct CheckpointManager<S: GraphStore> {
    store: S,
}

impl<S: GraphStore> CheckpointManager<S> {
    pub fn new(store: S) -> Self {
        CheckpointManager { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Stores the current graph under `name`. Names are never overwritten.
    pub fn create(&mut self, name: &str, graph: &BoxGraph) -> Result<CheckpointInfo, StorageError> {
        if self.store.contains(name)? {
            return Err(StorageError::CheckpointExists {
                name: name.to_string(),
            });
        }
        self.store.put(name, &graph.to_bytes())?;
        let info = CheckpointInfo::of(name, graph);
        tracing::debug!(checkpoint = name, digest = %info.digest, "checkpoint created");
        Ok(info)
    }

    /// Loads the graph stored under `name`.
    pub fn restore(&self, name: &str) -> Result<BoxGraph, StorageError> {
        let bytes = self
            .store
            .get(name)?
            .ok_or_else(|| StorageError::CheckpointNotFound {
                name: name.to_string(),
            })?;
        Ok(BoxGraph::from_bytes(&bytes)?)
    }

    pub fn list(&self) -> Result<Vec<CheckpointInfo>, StorageError> {
        let mut infos = Vec::new();
        for name in self.store.names()? {
            let graph = self.restore(&name)?;
            infos.push(CheckpointInfo::of(&name, &graph));
        }
        Ok(infos)
    }

    pub fn delete(&mut self, name: &str) -> Result<(), StorageError> {
        if !self.store.remove(name)? {
            return Err(StorageError::CheckpointNotFound {
                name: name.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use boxgraph_core::{BoxId, BoxKind};

    fn graph() -> BoxGraph {
        let mut graph = BoxGraph::new();
        graph
            .transact(|g| g.create_box(BoxKind::Root, BoxId::generate(), |_| {}).map(|_| ()))
            .unwrap();
        graph
    }

    #[test]
    fn create_restore_delete() {
        let mut manager = CheckpointManager::new(InMemoryStore::new());
        let graph = graph();
        let info = manager.create("v1", &graph).unwrap();
        assert_eq!(info.boxes, 1);
        assert_eq!(info.digest.len(), 64);

        assert!(matches!(
            manager.create("v1", &graph),
            Err(StorageError::CheckpointExists { .. })
        ));

        let restored = manager.restore("v1").unwrap();
        assert_eq!(restored.to_bytes(), graph.to_bytes());
        assert_eq!(manager.list().unwrap(), vec![info]);

        manager.delete("v1").unwrap();
        assert!(matches!(
            manager.restore("v1"),
            Err(StorageError::CheckpointNotFound { .. })
        ));
        assert!(matches!(
            manager.delete("v1"),
            Err(StorageError::CheckpointNotFound { .. })
        ));
    }
}
