//! Deterministic content digests using blake3.
//!
//! Digests are computed over the binary encoding, which is canonical: boxes
//! are written in id order and fields in schema order. Two graphs with the
//! same digest hold the same boxes, values and pointers.

use boxgraph_core::{BoxGraph, BoxNode};

/// Digest of one box: kind key, id and payload.
pub fn box_digest(node: &BoxNode) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&node.kind().key().to_be_bytes());
    hasher.update(node.id().as_bytes());
    hasher.update(&node.to_bytes());
    hasher.finalize()
}

/// Digest of a whole graph snapshot.
pub fn graph_digest(graph: &BoxGraph) -> blake3::Hash {
    blake3::hash(&graph.to_bytes())
}
