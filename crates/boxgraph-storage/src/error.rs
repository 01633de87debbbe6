//! Storage error types for boxgraph-storage.
//!
//! [`StorageError`] wraps graph and I/O failures and adds the preset and
//! checkpoint specific cases.

use thiserror::Error;

use boxgraph_core::{BoxId, BoxKind, CoreError};

/// Errors produced by storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Decoding or applying graph data failed.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Reading or writing a file failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The preset content is well-formed but not a usable preset.
    #[error("invalid preset: {reason}")]
    InvalidPreset { reason: String },

    /// The preset contains no records.
    #[error("preset contains no boxes")]
    EmptyPreset,

    /// Presets can only be created from audio units.
    #[error("box {id} is a {kind:?}, not an audio unit")]
    NotAnAudioUnit { id: BoxId, kind: BoxKind },

    /// A checkpoint with this name already exists.
    #[error("checkpoint '{name}' already exists")]
    CheckpointExists { name: String },

    /// No checkpoint with this name exists.
    #[error("checkpoint '{name}' not found")]
    CheckpointNotFound { name: String },

    /// Store entry names must be non-empty and free of path separators.
    #[error("invalid entry name '{name}'")]
    InvalidName { name: String },
}
