//! Undo/redo history for box graphs.
//!
//! [`BoxEditing`] wraps graph modifications in transactions, collects the
//! journal each transaction produces and groups it into history steps that
//! can be replayed backwards (undo) and forwards (redo).
//!
//! # Modules
//!
//! - [`error`]: EditingError
//! - [`history`]: BoxEditing, EditStep and HistoryConfig

pub mod error;
pub mod history;

pub use error::EditingError;
pub use history::{BoxEditing, EditStep, HistoryConfig, HistoryEntry};
