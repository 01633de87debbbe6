//! Error type for the sync crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// A caller buffer does not match the channel's frame length.
    #[error("frame length mismatch: expected {expected}, got {actual}")]
    FrameLength { expected: usize, actual: usize },

    /// Settings must serialize to a JSON object.
    #[error("settings serialize to {found}, expected an object")]
    NotAnObject { found: &'static str },

    /// A patch names a property the settings type does not have.
    #[error("unknown settings key '{key}'")]
    UnknownKey { key: String },

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
