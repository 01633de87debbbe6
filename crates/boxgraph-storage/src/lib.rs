//! Persistence helpers for box graphs.
//!
//! Graphs are kept in memory; this crate moves their serialized form in and
//! out of byte stores and files.
//!
//! # Modules
//!
//! - [`error`]: StorageError enum with all failure modes
//! - [`preset`]: audio-unit preset files (`BXPR`)
//! - [`hash`]: blake3 content digests of boxes and graphs
//! - [`traits`]: GraphStore trait for named byte blobs
//! - [`memory`]: InMemoryStore implementation
//! - [`file`]: DirectoryStore and single-file save/load
//! - [`checkpoint`]: named graph checkpoints on top of any GraphStore

pub mod checkpoint;
pub mod error;
pub mod file;
pub mod hash;
pub mod memory;
pub mod preset;
pub mod traits;

// Re-export key types for ergonomic use.
pub use checkpoint::{CheckpointInfo, CheckpointManager};
pub use error::StorageError;
pub use file::{load_graph, save_graph, DirectoryStore};
pub use hash::{box_digest, graph_digest};
pub use memory::InMemoryStore;
pub use preset::{Preset, PresetDecoder, PresetEncoder, PRESET_MAGIC, PRESET_VERSION};
pub use traits::GraphStore;
