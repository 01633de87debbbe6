//! Error types for boxgraph-editing.

use thiserror::Error;
use uuid::Uuid;

use boxgraph_core::CoreError;

/// Errors produced by history operations.
#[derive(Debug, Error)]
pub enum EditingError {
    /// The modification itself failed, or the graph rejected its result.
    #[error(transparent)]
    Graph(#[from] CoreError),

    /// Replaying a recorded step failed; the step was left where it was.
    #[error("failed to {direction} step {step}: {source}")]
    Replay {
        direction: &'static str,
        step: Uuid,
        #[source]
        source: CoreError,
    },
}

impl EditingError {
    /// The underlying graph error.
    pub fn core(&self) -> &CoreError {
        match self {
            EditingError::Graph(err) => err,
            EditingError::Replay { source, .. } => source,
        }
    }
}
