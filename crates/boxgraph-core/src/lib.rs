pub mod address;
pub mod boxes;
pub mod catalog;
pub mod codec;
pub mod config;
pub mod dependencies;
pub mod edges;
pub mod error;
pub mod field;
pub mod graph;
pub mod hub;
pub mod schema;
pub mod transfer;
pub mod update;

// Re-export commonly used types
pub use address::{Address, BoxId, FieldKey, FieldPath};
pub use boxes::{BoxInit, BoxNode};
pub use catalog::{BoxKind, PointerType};
pub use config::GraphConfig;
pub use dependencies::{Dependencies, DependencyOptions};
pub use error::{CoreError, Violation};
pub use field::{FieldNode, Value};
pub use graph::{BoxGraph, Edges, Vertex};
pub use hub::{HubChange, HubEvent, PointerHub, SubscriptionId};
pub use schema::{BoxSchema, FieldKind, FieldSchema, PointerRules, Resource};
pub use transfer::{
    transfer, transfer_within, ExternalDependents, TransferOptions, TransferOutcome, TransferPlan,
};
pub use update::Update;
