//! Graph files on disk.
//!
//! [`save_graph`] / [`load_graph`] handle a single snapshot file;
//! [`DirectoryStore`] keeps one `<name>.bxgr` file per entry.

use std::fs;
use std::path::{Path, PathBuf};

use boxgraph_core::BoxGraph;

use crate::error::StorageError;
use crate::traits::{check_name, GraphStore};

const EXTENSION: &str = "bxgr";

/// Writes a graph snapshot to `path`.
pub fn save_graph(path: &Path, graph: &BoxGraph) -> Result<(), StorageError> {
    fs::write(path, graph.to_bytes())?;
    tracing::debug!(path = %path.display(), boxes = graph.box_count(), "graph saved");
    Ok(())
}

/// Reads a graph snapshot from `path`. The graph is not validated.
pub fn load_graph(path: &Path) -> Result<BoxGraph, StorageError> {
    let bytes = fs::read(path)?;
    Ok(BoxGraph::from_bytes(&bytes)?)
}

/// A directory of snapshot files.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    /// Opens `root`, creating it if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(DirectoryStore { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, name: &str) -> Result<PathBuf, StorageError> {
        check_name(name)?;
        Ok(self.root.join(format!("{}.{}", name, EXTENSION)))
    }
}

impl GraphStore for DirectoryStore {
    fn put(&mut self, name: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.path_of(name)?;
        // write then rename so readers never see half a file
        let partial = path.with_extension("partial");
        fs::write(&partial, bytes)?;
        fs::rename(&partial, &path)?;
        Ok(())
    }

    fn get(&self, name: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.path_of(name)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn remove(&mut self, name: &str) -> Result<bool, StorageError> {
        let path = self.path_of(name)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    fn names(&self) -> Result<Vec<String>, StorageError> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}
