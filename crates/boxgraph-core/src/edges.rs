//! Bidirectional pointer index.
//!
//! Pointer fields store their target inside the owning box; this index
//! mirrors every held target so that incoming queries, hub sizes and
//! cascade collection never scan the graph.

use std::collections::HashMap;

use indexmap::{IndexMap, IndexSet};

use crate::address::{Address, BoxId};
use crate::catalog::PointerType;

/// Source -> target and target -> sources maps, plus per-box summaries.
#[derive(Debug, Default, Clone)]
pub struct EdgeIndex {
    outgoing: IndexMap<Address, (Address, PointerType)>,
    incoming: HashMap<Address, IndexMap<Address, PointerType>>,
    box_sources: HashMap<BoxId, IndexSet<Address>>,
    box_targets: HashMap<BoxId, IndexSet<Address>>,
}

impl EdgeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `source -> target`. Any previous target of `source` is
    /// replaced and returned.
    pub fn connect(
        &mut self,
        source: Address,
        target: Address,
        pointer_type: PointerType,
    ) -> Option<Address> {
        let previous = self.disconnect(&source).map(|(target, _)| target);
        self.incoming
            .entry(target.clone())
            .or_default()
            .insert(source.clone(), pointer_type);
        self.box_targets
            .entry(target.id)
            .or_default()
            .insert(target.clone());
        self.box_sources
            .entry(source.id)
            .or_default()
            .insert(source.clone());
        self.outgoing.insert(source, (target, pointer_type));
        previous
    }

    /// Removes the edge leaving `source`, returning its target and type.
    pub fn disconnect(&mut self, source: &Address) -> Option<(Address, PointerType)> {
        let (target, pointer_type) = self.outgoing.shift_remove(source)?;
        if let Some(sources) = self.incoming.get_mut(&target) {
            sources.shift_remove(source);
            if sources.is_empty() {
                self.incoming.remove(&target);
                if let Some(targets) = self.box_targets.get_mut(&target.id) {
                    targets.shift_remove(&target);
                    if targets.is_empty() {
                        self.box_targets.remove(&target.id);
                    }
                }
            }
        }
        if let Some(sources) = self.box_sources.get_mut(&source.id) {
            sources.shift_remove(source);
            if sources.is_empty() {
                self.box_sources.remove(&source.id);
            }
        }
        Some((target, pointer_type))
    }

    pub fn target_of(&self, source: &Address) -> Option<&(Address, PointerType)> {
        self.outgoing.get(source)
    }

    /// Sources pointing at `target`, in insertion order.
    pub fn incoming(&self, target: &Address) -> Vec<(Address, PointerType)> {
        self.incoming
            .get(target)
            .map(|sources| sources.iter().map(|(s, t)| (s.clone(), *t)).collect())
            .unwrap_or_default()
    }

    pub fn incoming_count(&self, target: &Address) -> usize {
        self.incoming.get(target).map_or(0, IndexMap::len)
    }

    pub fn has_incoming(&self, target: &Address, source: &Address) -> bool {
        self.incoming
            .get(target)
            .is_some_and(|sources| sources.contains_key(source))
    }

    /// Outgoing edges whose source lives in box `id`.
    pub fn outgoing_of_box(&self, id: BoxId) -> Vec<(Address, Address, PointerType)> {
        let Some(sources) = self.box_sources.get(&id) else {
            return Vec::new();
        };
        sources
            .iter()
            .filter_map(|source| {
                self.outgoing
                    .get(source)
                    .map(|(target, t)| (source.clone(), target.clone(), *t))
            })
            .collect()
    }

    /// Incoming edges whose target is box `id` or one of its fields.
    pub fn incoming_of_box(&self, id: BoxId) -> Vec<(Address, Address, PointerType)> {
        let Some(targets) = self.box_targets.get(&id) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for target in targets {
            if let Some(sources) = self.incoming.get(target) {
                for (source, t) in sources {
                    out.push((source.clone(), target.clone(), *t));
                }
            }
        }
        out
    }

    /// All edges as `(source, target, type)`, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&Address, &Address, PointerType)> {
        self.outgoing.iter().map(|(s, (t, p))| (s, t, *p))
    }

    pub fn len(&self) -> usize {
        self.outgoing.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outgoing.is_empty()
    }
}
