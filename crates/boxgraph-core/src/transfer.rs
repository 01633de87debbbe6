//! Copying a box and its dependencies between graphs.
//!
//! A [`TransferPlan`] is the serialized root plus its dependencies. Applying
//! it re-creates every box under a new identity, except preserved resources,
//! which keep their canonical id and are reused when the target already has
//! them. Pointers are rewritten through the id map.

use indexmap::{IndexMap, IndexSet};

use crate::address::{Address, BoxId, FieldKey};
use crate::boxes::BoxNode;
use crate::codec::BoxRecord;
use crate::dependencies::DependencyOptions;
use crate::error::CoreError;
use crate::field::Value;
use crate::graph::BoxGraph;
use crate::schema::Resource;

/// What to do with dependents that also hold a mandatory pointer to a box
/// outside the plan, such as a connection from the copied unit to another one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExternalDependents {
    /// Copy them; their outside pointers are kept or reported as unresolved.
    #[default]
    Keep,
    /// Leave them out of the plan, together with everything that depends on
    /// them.
    Prune,
}

/// Insertion parameters for [`TransferPlan::apply`].
#[derive(Debug, Clone, Default)]
pub struct TransferOptions {
    /// Redirects the root's pointer at the given path to a new parent.
    pub parent: Option<(Vec<FieldKey>, Address)>,
    /// Values written on the copied root after linking.
    pub values: Vec<(Vec<FieldKey>, Value)>,
    /// Delete the original root once the copy succeeded.
    pub delete_source: bool,
    /// Applied when the plan is collected.
    pub external_dependents: ExternalDependents,
}

impl TransferOptions {
    pub fn with_parent(mut self, path: &[FieldKey], parent: Address) -> Self {
        self.parent = Some((path.to_vec(), parent));
        self
    }

    pub fn with_value(mut self, path: &[FieldKey], value: impl Into<Value>) -> Self {
        self.values.push((path.to_vec(), value.into()));
        self
    }

    pub fn pruning_external_dependents(mut self) -> Self {
        self.external_dependents = ExternalDependents::Prune;
        self
    }
}

/// What a transfer created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    /// Id of the copied root in the target graph.
    pub root: BoxId,
    /// Source id -> target id for every box of the plan.
    pub mapping: IndexMap<BoxId, BoxId>,
    /// Preserved boxes that already existed in the target.
    pub reused: Vec<BoxId>,
}

/// A root box and its dependencies, ready to be applied to a graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferPlan {
    records: Vec<BoxRecord>,
}

impl TransferPlan {
    /// Captures `root` and everything that depends on it.
    pub fn collect(source: &BoxGraph, root: BoxId) -> Result<TransferPlan, CoreError> {
        Self::collect_with(source, root, ExternalDependents::Keep)
    }

    /// Like [`collect`](TransferPlan::collect), with a policy for dependents
    /// that are also bound to boxes outside the plan.
    pub fn collect_with(
        source: &BoxGraph,
        root: BoxId,
        external: ExternalDependents,
    ) -> Result<TransferPlan, CoreError> {
        let node = source.get_box(root)?;
        let deps = source.dependencies_of(
            &[root],
            &DependencyOptions {
                always_follow_mandatory: true,
                stop_at_resources: true,
                exclude_box: None,
            },
        );
        let mut members: IndexSet<BoxId> = std::iter::once(root).chain(deps.boxes).collect();
        if external == ExternalDependents::Prune {
            prune_external(source, root, &mut members);
        }
        let mut records = Vec::with_capacity(members.len());
        for id in members {
            records.push(record_of(source.get_box(id)?));
        }
        tracing::debug!(root = %root, boxes = records.len(), "transfer plan collected");
        Ok(TransferPlan { records })
    }

    /// Rebuilds a plan from records whose first entry is the root.
    pub fn from_records(records: Vec<BoxRecord>) -> Result<TransferPlan, CoreError> {
        if records.is_empty() {
            return Err(CoreError::corrupt("transfer plan has no root record"));
        }
        Ok(TransferPlan { records })
    }

    pub fn root(&self) -> BoxId {
        self.records[0].id
    }

    pub fn records(&self) -> &[BoxRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<BoxRecord> {
        self.records
    }

    /// Re-creates the plan inside the open transaction of `target`.
    ///
    /// Every link is resolved before the first mutation, so an unresolvable
    /// mandatory pointer leaves the target untouched.
    pub fn apply(
        &self,
        target: &mut BoxGraph,
        options: &TransferOptions,
    ) -> Result<TransferOutcome, CoreError> {
        if !target.in_transaction() {
            return Err(CoreError::state("transfer requires an open transaction"));
        }
        let nodes = self
            .records
            .iter()
            .map(|r| BoxNode::read(r.kind, r.id, &r.payload))
            .collect::<Result<Vec<_>, _>>()?;
        let root = self.root();

        let mut mapping = IndexMap::new();
        let mut reused = Vec::new();
        for node in &nodes {
            let id = node.id();
            // a retired id stays retired; the resource comes back under a new one
            if node.resource() == Resource::Preserved && !target.is_retired(id) {
                if target.contains_box(id) {
                    reused.push(id);
                }
                mapping.insert(id, id);
            } else {
                mapping.insert(id, BoxId::generate());
            }
        }

        let mut links = Vec::new();
        let mut parent_linked = false;
        for node in nodes.iter().filter(|n| !reused.contains(&n.id())) {
            for (source, schema, current) in node.pointer_fields() {
                let new_source = source.with_id(mapping[&node.id()]);
                if node.id() == root {
                    if let Some((path, parent)) = &options.parent {
                        if source.path.as_slice() == path.as_slice() {
                            links.push((new_source, parent.clone()));
                            parent_linked = true;
                            continue;
                        }
                    }
                }
                let Some(current) = current else {
                    continue;
                };
                if let Some(mapped) = mapping.get(&current.id) {
                    links.push((new_source, current.with_id(*mapped)));
                } else if target.contains_vertex(&current) {
                    links.push((new_source, current));
                } else if schema.pointer().is_some_and(|(_, mandatory)| mandatory) {
                    return Err(CoreError::UnresolvedPointer {
                        address: source,
                        target: current,
                    });
                }
            }
        }
        if let (Some((path, _)), false) = (&options.parent, parent_linked) {
            return Err(CoreError::FieldNotFound {
                address: Address::new(root, path),
            });
        }

        for (node, record) in nodes.iter().zip(&self.records) {
            if reused.contains(&node.id()) {
                continue;
            }
            target.restore_box(record.kind, mapping[&node.id()], &record.payload)?;
        }
        for (source, destination) in &links {
            target.refer(source, destination)?;
        }
        let new_root = mapping[&root];
        for (path, value) in &options.values {
            target.set_value(&Address::new(new_root, path), value.clone())?;
        }
        tracing::debug!(
            root = %new_root,
            boxes = mapping.len() - reused.len(),
            reused = reused.len(),
            "transfer applied"
        );
        Ok(TransferOutcome {
            root: new_root,
            mapping,
            reused,
        })
    }
}

/// Drops non-root, non-preserved members holding a mandatory pointer to a
/// box outside `members`, until no such member is left.
fn prune_external(source: &BoxGraph, root: BoxId, members: &mut IndexSet<BoxId>) {
    loop {
        let stranded: Vec<BoxId> = members
            .iter()
            .copied()
            .filter(|id| *id != root)
            .filter(|id| {
                source.find_box(*id).is_some_and(|node| {
                    node.resource() != Resource::Preserved
                        && node.pointer_fields().into_iter().any(|(_, schema, target)| {
                            schema.pointer().is_some_and(|(_, mandatory)| mandatory)
                                && target.is_some_and(|t| !members.contains(&t.id))
                        })
                })
            })
            .collect();
        if stranded.is_empty() {
            return;
        }
        tracing::trace!(count = stranded.len(), "pruning external dependents");
        for id in stranded {
            members.shift_remove(&id);
        }
    }
}

fn record_of(node: &BoxNode) -> BoxRecord {
    BoxRecord {
        kind: node.kind(),
        id: node.id(),
        payload: node.to_bytes(),
    }
}

/// Copies `root` from `source` into `target`. Both graphs need an open
/// transaction when `options.delete_source` is set, `target` always.
pub fn transfer(
    source: &mut BoxGraph,
    target: &mut BoxGraph,
    root: BoxId,
    options: &TransferOptions,
) -> Result<TransferOutcome, CoreError> {
    let plan = TransferPlan::collect_with(source, root, options.external_dependents)?;
    let outcome = plan.apply(target, options)?;
    if options.delete_source {
        source.delete_box(root)?;
    }
    Ok(outcome)
}

/// Copies `root` within one graph, e.g. to duplicate an audio unit.
pub fn transfer_within(
    graph: &mut BoxGraph,
    root: BoxId,
    options: &TransferOptions,
) -> Result<TransferOutcome, CoreError> {
    let plan = TransferPlan::collect_with(graph, root, options.external_dependents)?;
    let outcome = plan.apply(graph, options)?;
    if options.delete_source {
        graph.delete_box(root)?;
    }
    Ok(outcome)
}
