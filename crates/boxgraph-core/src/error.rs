//! Core error types for boxgraph-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering
//! transaction state, identity lookups, structural validation and the
//! binary codec.

use thiserror::Error;

use crate::address::{Address, BoxId};
use crate::catalog::PointerType;

/// A single structural constraint violation found at transaction end.
///
/// `context` is the human-readable schema path of the vertex (for example
/// `AudioUnit.input`), `address` its identity in the graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    /// An exclusive target has more than one incoming pointer.
    #[error("{context} ({address}) is exclusive but has {incoming} incoming pointers")]
    ExclusiveTarget {
        context: String,
        address: Address,
        incoming: usize,
    },

    /// A mandatory target has no incoming pointer.
    #[error("{context} ({address}) is mandatory but has 0 incoming pointers")]
    MandatoryTarget { context: String, address: Address },

    /// A mandatory pointer field holds no target.
    #[error("pointer {context} ({address}) is mandatory but has no target")]
    MandatoryPointer { context: String, address: Address },

    /// A pointer targets a vertex that is not attached to the graph.
    #[error("pointer {context} ({address}) targets missing vertex {target}")]
    DanglingPointer {
        context: String,
        address: Address,
        target: Address,
    },
}

impl Violation {
    /// Returns the address of the vertex the violation is reported on.
    pub fn address(&self) -> &Address {
        match self {
            Violation::ExclusiveTarget { address, .. }
            | Violation::MandatoryTarget { address, .. }
            | Violation::MandatoryPointer { address, .. }
            | Violation::DanglingPointer { address, .. } => address,
        }
    }
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Core errors produced by the boxgraph-core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// One or more exclusive/mandatory/dangling constraints failed at
    /// transaction end. Already-applied mutations are kept.
    #[error("structural violation: {}", join_violations(.violations))]
    StructuralViolation { violations: Vec<Violation> },

    /// Mutating outside a transaction, or opening one while one is open.
    #[error("transaction state error: {reason}")]
    TransactionState { reason: String },

    /// A box id was not found in the graph.
    #[error("box not found: {id}")]
    BoxNotFound { id: BoxId },

    /// An address does not resolve to a box or field.
    #[error("vertex not found: {address}")]
    VertexNotFound { address: Address },

    /// An address resolves to a box, but the field path does not exist.
    #[error("field not found: {address}")]
    FieldNotFound { address: Address },

    /// A box with this id is already attached.
    #[error("duplicate box id: {id}")]
    DuplicateBox { id: BoxId },

    /// The id belonged to a box deleted earlier in this graph's lifetime.
    #[error("box id {id} was already used by a deleted box")]
    RetiredBox { id: BoxId },

    /// The field at the address is not a pointer.
    #[error("field {address} is not a pointer")]
    NotAPointer { address: Address },

    /// The field at the address does not hold a primitive value.
    #[error("field {address} does not hold a value")]
    NotAValue { address: Address },

    /// A value does not fit the field kind.
    #[error("type mismatch at {address}: expected {expected}, found {found}")]
    TypeMismatch {
        address: Address,
        expected: &'static str,
        found: &'static str,
    },

    /// The target vertex does not accept the pointer's type.
    #[error("{target} does not accept pointers of type {pointer_type:?}")]
    PointerTypeRejected {
        pointer_type: PointerType,
        target: Address,
    },

    /// A payload was written with an unsupported structure/format version.
    #[error("serialization version mismatch: found {found}, supported {supported}")]
    VersionMismatch { found: i32, supported: i32 },

    /// A payload does not start with the expected magic number.
    #[error("invalid magic: expected {expected:#010x}, found {found:#010x}")]
    InvalidMagic { expected: i32, found: i32 },

    /// A payload is truncated or structurally malformed.
    #[error("corrupt payload: {reason}")]
    CorruptPayload { reason: String },

    /// A record carries a box kind key that is not in the catalog.
    #[error("unknown box kind key: {key}")]
    UnknownBoxKind { key: u16 },

    /// Textual address could not be parsed.
    #[error("invalid address: '{text}'")]
    InvalidAddress { text: String },

    /// A transferred mandatory pointer has no target in the destination graph.
    #[error("pointer {address} cannot be resolved: {target} is not available")]
    UnresolvedPointer { address: Address, target: Address },

    /// Internal bookkeeping disagrees with the box contents.
    #[error("graph inconsistency: {reason}")]
    GraphInconsistency { reason: String },
}

impl CoreError {
    /// Returns the violations if this is a [`CoreError::StructuralViolation`].
    pub fn violations(&self) -> &[Violation] {
        match self {
            CoreError::StructuralViolation { violations } => violations,
            _ => &[],
        }
    }

    pub(crate) fn state(reason: impl Into<String>) -> Self {
        CoreError::TransactionState {
            reason: reason.into(),
        }
    }

    pub(crate) fn corrupt(reason: impl Into<String>) -> Self {
        CoreError::CorruptPayload {
            reason: reason.into(),
        }
    }
}
