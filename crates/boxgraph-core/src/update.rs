//! Journal entries recorded for every mutation inside a transaction.

use serde::{Deserialize, Serialize};

use crate::address::{Address, BoxId};
use crate::catalog::BoxKind;
use crate::field::Value;

/// One recorded mutation.
///
/// Creation and deletion payloads never contain pointer targets: links are
/// journaled separately as [`Update::Pointer`] entries, so replaying any
/// prefix of a journal keeps the edge index consistent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Update {
    New {
        id: BoxId,
        kind: BoxKind,
        payload: Vec<u8>,
    },
    Delete {
        id: BoxId,
        kind: BoxKind,
        payload: Vec<u8>,
    },
    Value {
        address: Address,
        old: Value,
        new: Value,
    },
    Pointer {
        address: Address,
        old: Option<Address>,
        new: Option<Address>,
    },
}

impl Update {
    /// The update that undoes this one.
    pub fn inverse(&self) -> Update {
        match self {
            Update::New { id, kind, payload } => Update::Delete {
                id: *id,
                kind: *kind,
                payload: payload.clone(),
            },
            Update::Delete { id, kind, payload } => Update::New {
                id: *id,
                kind: *kind,
                payload: payload.clone(),
            },
            Update::Value { address, old, new } => Update::Value {
                address: address.clone(),
                old: new.clone(),
                new: old.clone(),
            },
            Update::Pointer { address, old, new } => Update::Pointer {
                address: address.clone(),
                old: new.clone(),
                new: old.clone(),
            },
        }
    }

    /// Id of the box the update touches.
    pub fn box_id(&self) -> BoxId {
        match self {
            Update::New { id, .. } | Update::Delete { id, .. } => *id,
            Update::Value { address, .. } | Update::Pointer { address, .. } => address.id,
        }
    }
}
