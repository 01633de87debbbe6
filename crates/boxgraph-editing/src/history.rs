//! Edit history: transaction journals grouped into undoable steps.
//!
//! Every `modify`/`append` runs in its own graph transaction. The journal of
//! that transaction is added to a pending list; marking finalizes the
//! pending updates into one [`EditStep`] and clears the redo stack. Undo
//! replays a step's inverted updates in reverse order, redo replays them
//! forward, each inside a fresh transaction.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use boxgraph_core::{BoxGraph, CoreError, Update};

use crate::error::EditingError;

/// History limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum number of undo steps; the oldest step is dropped first.
    pub limit: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        HistoryConfig { limit: 100 }
    }
}

impl HistoryConfig {
    /// Reads `BOXGRAPH_HISTORY_LIMIT`, keeping the default if unset or invalid.
    pub fn from_env() -> Self {
        std::env::var("BOXGRAPH_HISTORY_LIMIT")
            .ok()
            .and_then(|value| value.trim().parse().ok())
            .map(|limit| HistoryConfig { limit })
            .unwrap_or_default()
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// One undoable unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditStep {
    pub id: Uuid,
    pub description: Option<String>,
    /// Updates in the order they were applied.
    pub updates: Vec<Update>,
}

/// Summary of a step for listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub description: Option<String>,
    pub updates: usize,
    pub undone: bool,
}

impl EditStep {
    fn entry(&self, undone: bool) -> HistoryEntry {
        HistoryEntry {
            id: self.id,
            description: self.description.clone(),
            updates: self.updates.len(),
            undone,
        }
    }
}

/// Linear undo/redo history over a [`BoxGraph`].
#[derive(Debug, Default)]
pub struct BoxEditing {
    undo: VecDeque<EditStep>,
    redo: Vec<EditStep>,
    pending: Vec<Update>,
    config: HistoryConfig,
}

impl BoxEditing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: HistoryConfig) -> Self {
        BoxEditing {
            config,
            ..Self::default()
        }
    }

    /// Runs `f` in a transaction and records it as one history step.
    pub fn modify<T>(
        &mut self,
        graph: &mut BoxGraph,
        f: impl FnOnce(&mut BoxGraph) -> Result<T, CoreError>,
    ) -> Result<T, EditingError> {
        self.modify_with(graph, true, f)
    }

    /// Runs `f` in a transaction and adds its updates to the pending step.
    /// Call [`mark`](BoxEditing::mark) to finalize.
    pub fn append<T>(
        &mut self,
        graph: &mut BoxGraph,
        f: impl FnOnce(&mut BoxGraph) -> Result<T, CoreError>,
    ) -> Result<T, EditingError> {
        self.modify_with(graph, false, f)
    }

    /// Runs `f` in a transaction.
    ///
    /// If `f` fails the transaction is aborted and nothing is recorded. If
    /// the graph rejects the result at transaction end, the updates are kept
    /// and recorded so they can be undone, and the error is returned.
    pub fn modify_with<T>(
        &mut self,
        graph: &mut BoxGraph,
        mark: bool,
        f: impl FnOnce(&mut BoxGraph) -> Result<T, CoreError>,
    ) -> Result<T, EditingError> {
        graph.begin_transaction()?;
        let value = match f(graph) {
            Ok(value) => value,
            Err(err) => {
                if let Err(abort) = graph.abort_transaction() {
                    tracing::warn!(error = %abort, "failed to abort modification");
                }
                return Err(err.into());
            }
        };
        let end = graph.end_transaction();
        if let Some(updates) = graph.take_last_transaction() {
            self.pending.extend(updates);
        }
        if mark {
            self.mark();
        }
        end?;
        Ok(value)
    }

    /// Finalizes pending updates into one step.
    pub fn mark(&mut self) {
        self.mark_described(None);
    }

    /// Like [`mark`](BoxEditing::mark), attaching a description to the step.
    pub fn mark_described(&mut self, description: Option<&str>) {
        if self.pending.is_empty() {
            return;
        }
        let step = EditStep {
            id: Uuid::new_v4(),
            description: description.map(str::to_string),
            updates: std::mem::take(&mut self.pending),
        };
        tracing::debug!(step = %step.id, updates = step.updates.len(), "history step recorded");
        self.undo.push_back(step);
        self.redo.clear();
        while self.undo.len() > self.config.limit {
            self.undo.pop_front();
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty() || !self.pending.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Reverts the latest step. Returns `Ok(false)` when there is nothing to
    /// undo.
    pub fn undo(&mut self, graph: &mut BoxGraph) -> Result<bool, EditingError> {
        self.mark();
        let Some(step) = self.undo.pop_back() else {
            return Ok(false);
        };
        let inverted: Vec<Update> = step.updates.iter().rev().map(Update::inverse).collect();
        match replay(graph, &inverted) {
            Ok(end) => {
                tracing::debug!(step = %step.id, "undo");
                let id = step.id;
                self.redo.push(step);
                end.map_err(|source| EditingError::Replay {
                    direction: "undo",
                    step: id,
                    source,
                })?;
                Ok(true)
            }
            Err(source) => {
                let id = step.id;
                self.undo.push_back(step);
                Err(EditingError::Replay {
                    direction: "undo",
                    step: id,
                    source,
                })
            }
        }
    }

    /// Re-applies the latest undone step. Returns `Ok(false)` when there is
    /// nothing to redo.
    pub fn redo(&mut self, graph: &mut BoxGraph) -> Result<bool, EditingError> {
        let Some(step) = self.redo.pop() else {
            return Ok(false);
        };
        match replay(graph, &step.updates) {
            Ok(end) => {
                tracing::debug!(step = %step.id, "redo");
                let id = step.id;
                self.undo.push_back(step);
                end.map_err(|source| EditingError::Replay {
                    direction: "redo",
                    step: id,
                    source,
                })?;
                Ok(true)
            }
            Err(source) => {
                let id = step.id;
                self.redo.push(step);
                Err(EditingError::Replay {
                    direction: "redo",
                    step: id,
                    source,
                })
            }
        }
    }

    /// Drops all history, including pending updates.
    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
        self.pending.clear();
    }

    /// Steps newest first; undone steps are listed before the rest.
    pub fn history(&self) -> Vec<HistoryEntry> {
        let mut entries: Vec<HistoryEntry> = self.redo.iter().map(|s| s.entry(true)).collect();
        entries.extend(self.undo.iter().rev().map(|s| s.entry(false)));
        entries
    }

    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }
}

/// Applies `updates` in a fresh transaction.
///
/// The outer `Result` reports a failed replay, which is aborted and leaves
/// the graph unchanged. The inner one carries the end-of-transaction
/// validation result of a replay that was applied.
fn replay(graph: &mut BoxGraph, updates: &[Update]) -> Result<Result<(), CoreError>, CoreError> {
    graph.begin_transaction()?;
    for update in updates {
        if let Err(err) = graph.apply_update(update) {
            graph.abort_transaction()?;
            return Err(err);
        }
    }
    let end = graph.end_transaction();
    // replays are not new history
    graph.take_last_transaction();
    Ok(end)
}
