//! Observable settings.
//!
//! [`ObservableSettings`] wraps any serde-serializable settings struct. Each
//! [`update`](ObservableSettings::update) runs a batch of mutations, diffs the
//! top-level properties of the serialized value against the previous
//! snapshot, and notifies only the listeners subscribed to keys that actually
//! changed. The returned [`SettingsPatch`] carries the changed keys to a
//! replica, which folds them in with
//! [`apply_patch`](ObservableSettings::apply_patch) and notifies its own
//! listeners the same way.

use std::collections::BTreeMap;
use std::fmt;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SyncError;

/// Handle returned by [`ObservableSettings::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Changed top-level properties, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsPatch {
    pub changes: BTreeMap<String, Value>,
}

impl SettingsPatch {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.changes.keys().map(String::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.changes.get(key)
    }
}

type Listener<T> = Box<dyn FnMut(&T) + Send>;

pub struct ObservableSettings<T> {
    value: T,
    snapshot: Map<String, Value>,
    listeners: IndexMap<ListenerId, (String, Listener<T>)>,
    next_listener: u64,
}

impl<T: fmt::Debug> fmt::Debug for ObservableSettings<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableSettings")
            .field("value", &self.value)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

fn to_object<T: Serialize>(value: &T) -> Result<Map<String, Value>, SyncError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(SyncError::NotAnObject {
            found: match other {
                Value::Null => "null",
                Value::Bool(_) => "a boolean",
                Value::Number(_) => "a number",
                Value::String(_) => "a string",
                Value::Array(_) => "an array",
                Value::Object(_) => "an object",
            },
        }),
    }
}

impl<T: Serialize + DeserializeOwned> ObservableSettings<T> {
    pub fn new(value: T) -> Result<Self, SyncError> {
        let snapshot = to_object(&value)?;
        Ok(ObservableSettings {
            value,
            snapshot,
            listeners: IndexMap::new(),
            next_listener: 0,
        })
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    /// The serialized value as of the last update.
    pub fn snapshot(&self) -> &Map<String, Value> {
        &self.snapshot
    }

    /// Calls `listener` with the new value whenever `key` changes.
    pub fn subscribe(
        &mut self,
        key: &str,
        listener: impl FnMut(&T) + Send + 'static,
    ) -> Result<ListenerId, SyncError> {
        if !self.snapshot.contains_key(key) {
            return Err(SyncError::UnknownKey {
                key: key.to_string(),
            });
        }
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners
            .insert(id, (key.to_string(), Box::new(listener)));
        Ok(id)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.shift_remove(&id).is_some()
    }

    /// Runs `mutate` and broadcasts the properties it changed.
    ///
    /// Listeners run once per update, after the whole batch, in subscription
    /// order.
    pub fn update(&mut self, mutate: impl FnOnce(&mut T)) -> Result<SettingsPatch, SyncError> {
        mutate(&mut self.value);
        let next = to_object(&self.value)?;
        let patch = diff(&self.snapshot, &next);
        self.snapshot = next;
        self.notify(&patch);
        Ok(patch)
    }

    /// Folds a patch from another instance into this one.
    ///
    /// The patch is checked in full before anything changes: an unknown key
    /// or a value of the wrong shape leaves the settings untouched. Returns the
    /// subset of the patch that differed locally.
    pub fn apply_patch(&mut self, patch: &SettingsPatch) -> Result<SettingsPatch, SyncError> {
        let mut merged = self.snapshot.clone();
        for (key, value) in &patch.changes {
            match merged.get_mut(key) {
                Some(slot) => *slot = value.clone(),
                None => {
                    return Err(SyncError::UnknownKey { key: key.clone() });
                }
            }
        }
        let value: T = serde_json::from_value(Value::Object(merged))?;
        // re-serialize so the snapshot reflects what T actually holds
        let next = to_object(&value)?;
        let applied = diff(&self.snapshot, &next);
        self.value = value;
        self.snapshot = next;
        self.notify(&applied);
        Ok(applied)
    }

    fn notify(&mut self, patch: &SettingsPatch) {
        if patch.is_empty() {
            return;
        }
        tracing::debug!(keys = ?patch.changes.keys().collect::<Vec<_>>(), "settings changed");
        for (key, listener) in self.listeners.values_mut() {
            if patch.changes.contains_key(key) {
                listener(&self.value);
            }
        }
    }
}

fn diff(before: &Map<String, Value>, after: &Map<String, Value>) -> SettingsPatch {
    let changes = after
        .iter()
        .filter(|(key, value)| before.get(*key) != Some(*value))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    SettingsPatch { changes }
}
