//! BoxGraph: the transactional box container.
//!
//! [`BoxGraph`] owns every box, the bidirectional pointer index and the
//! journal of the open transaction. All mutations go through its methods and
//! require an open transaction; reads are allowed at any time.
//!
//! # Transactions
//!
//! Structural rules (exclusive, mandatory, no dangling pointers) are only
//! checked when a transaction ends. Inside the window the graph may be
//! temporarily invalid, which lets callers rewire pointers in any order.
//! A failed check is reported as [`CoreError::StructuralViolation`] and the
//! mutations stay applied; [`BoxGraph::abort_transaction`] is the only
//! path that reverts them.

use std::collections::{BTreeMap, HashSet, VecDeque};

use bytes::BytesMut;
use indexmap::{IndexMap, IndexSet};
use petgraph::algo::is_cyclic_directed;
use petgraph::graphmap::DiGraphMap;

use crate::address::{Address, BoxId};
use crate::boxes::{BoxInit, BoxNode};
use crate::catalog::{BoxKind, PointerType};
use crate::codec::{self, BoxRecord};
use crate::config::GraphConfig;
use crate::dependencies::{self, Dependencies, DependencyOptions};
use crate::edges::EdgeIndex;
use crate::error::{CoreError, Violation};
use crate::field::{FieldNode, Value};
use crate::hub::{HubChange, HubEvent, HubSubscribers, PointerHub, SubscriptionId};
use crate::schema::{FieldSchema, PointerRules};
use crate::update::Update;

type UpdateListener = Box<dyn FnMut(&[Update])>;

#[derive(Debug)]
struct Transaction {
    id: u64,
    journal: Vec<Update>,
    /// Fresh ids handed to `create_box`; released again on abort
    created: Vec<BoxId>,
}

/// A resolved vertex: a whole box or one of its fields.
#[derive(Debug, Clone)]
pub struct Vertex<'a> {
    pub address: Address,
    pub owner: &'a BoxNode,
    /// `None` when the vertex is the box itself.
    pub field: Option<(&'static FieldSchema, &'a FieldNode)>,
}

impl Vertex<'_> {
    /// Pointer rules of the vertex as a target.
    pub fn rules(&self) -> PointerRules {
        match self.field {
            Some((schema, _)) => schema.rules,
            None => self.owner.schema().rules,
        }
    }

    /// Human-readable schema path.
    pub fn describe(&self) -> String {
        self.owner.schema().describe(&self.address.path)
    }
}

/// The transactional object graph.
pub struct BoxGraph {
    /// Attached boxes, ordered by id
    boxes: BTreeMap<BoxId, BoxNode>,
    /// Mirror of every pointer value
    edges: EdgeIndex,
    /// Ids of deleted boxes; `create_box` refuses them
    retired: HashSet<BoxId>,
    transaction: Option<Transaction>,
    next_transaction: u64,
    last_committed: Option<Vec<Update>>,
    hubs: HubSubscribers,
    update_listeners: IndexMap<SubscriptionId, UpdateListener>,
    next_subscription: u64,
    config: GraphConfig,
}

impl std::fmt::Debug for BoxGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxGraph")
            .field("boxes", &self.boxes.len())
            .field("edges", &self.edges.len())
            .field("in_transaction", &self.transaction.is_some())
            .field("config", &self.config)
            .finish()
    }
}

impl Default for BoxGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl BoxGraph {
    pub fn new() -> Self {
        Self::with_config(GraphConfig::default())
    }

    pub fn with_config(config: GraphConfig) -> Self {
        BoxGraph {
            boxes: BTreeMap::new(),
            edges: EdgeIndex::new(),
            retired: HashSet::new(),
            transaction: None,
            next_transaction: 1,
            last_committed: None,
            hubs: HubSubscribers::default(),
            update_listeners: IndexMap::new(),
            next_subscription: 1,
            config,
        }
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: GraphConfig) {
        self.config = config;
    }

    // -----------------------------------------------------------------------
    // Transactions
    // -----------------------------------------------------------------------

    pub fn in_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    /// Opens a transaction window.
    pub fn begin_transaction(&mut self) -> Result<(), CoreError> {
        if let Some(open) = &self.transaction {
            return Err(CoreError::state(format!(
                "transaction {} is already open",
                open.id
            )));
        }
        let id = self.next_transaction;
        self.next_transaction += 1;
        tracing::debug!(transaction = id, "begin transaction");
        self.transaction = Some(Transaction {
            id,
            journal: Vec::new(),
            created: Vec::new(),
        });
        Ok(())
    }

    /// Closes the window, notifies update listeners, then validates.
    ///
    /// A validation failure does not roll anything back.
    pub fn end_transaction(&mut self) -> Result<(), CoreError> {
        let transaction = self
            .transaction
            .take()
            .ok_or_else(|| CoreError::state("no transaction is open"))?;
        tracing::debug!(
            transaction = transaction.id,
            updates = transaction.journal.len(),
            "end transaction"
        );
        for listener in self.update_listeners.values_mut() {
            listener(&transaction.journal);
        }
        self.last_committed = Some(transaction.journal);

        if self.config.verify_pointers_on_commit {
            self.verify_pointers()?;
        }
        if self.config.validate_on_commit {
            let violations = self.edges().validate_requirements();
            if !violations.is_empty() {
                tracing::warn!(
                    count = violations.len(),
                    "transaction left the graph in violation"
                );
                return Err(CoreError::StructuralViolation { violations });
            }
        }
        Ok(())
    }

    /// Reverts every mutation of the open transaction, newest first, and
    /// closes it without validation or update notification.
    pub fn abort_transaction(&mut self) -> Result<(), CoreError> {
        let transaction = self
            .transaction
            .take()
            .ok_or_else(|| CoreError::state("no transaction is open"))?;
        tracing::debug!(
            transaction = transaction.id,
            updates = transaction.journal.len(),
            "abort transaction"
        );
        // Replays journal into a scratch transaction that is thrown away.
        self.transaction = Some(Transaction {
            id: transaction.id,
            journal: Vec::new(),
            created: Vec::new(),
        });
        let mut result = Ok(());
        for update in transaction.journal.iter().rev() {
            if let Err(err) = self.apply_update(&update.inverse()) {
                result = Err(CoreError::GraphInconsistency {
                    reason: format!("abort could not revert {:?}: {}", update, err),
                });
                break;
            }
        }
        self.transaction = None;
        for id in transaction.created {
            if !self.boxes.contains_key(&id) {
                self.retired.remove(&id);
            }
        }
        result
    }

    /// Runs `f` inside a transaction. The transaction is closed even when `f`
    /// fails; the first error wins.
    pub fn transact<T>(
        &mut self,
        f: impl FnOnce(&mut BoxGraph) -> Result<T, CoreError>,
    ) -> Result<T, CoreError> {
        self.begin_transaction()?;
        let result = f(self);
        let end = self.end_transaction();
        let value = result?;
        end?;
        Ok(value)
    }

    /// Journal of the most recently closed transaction.
    pub fn take_last_transaction(&mut self) -> Option<Vec<Update>> {
        self.last_committed.take()
    }

    fn require_transaction(&self, operation: &str) -> Result<(), CoreError> {
        if self.transaction.is_none() {
            return Err(CoreError::state(format!(
                "{} requires an open transaction",
                operation
            )));
        }
        Ok(())
    }

    fn record(&mut self, update: Update) {
        if let Some(transaction) = &mut self.transaction {
            transaction.journal.push(update);
        }
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Creates a box with default values, then applies `init`'s writes.
    pub fn create_box(
        &mut self,
        kind: BoxKind,
        id: BoxId,
        init: impl FnOnce(&mut BoxInit),
    ) -> Result<BoxId, CoreError> {
        self.require_transaction("create_box")?;
        if self.retired.contains(&id) {
            return Err(CoreError::RetiredBox { id });
        }
        self.attach(BoxNode::new(kind, id))?;
        if let Some(transaction) = &mut self.transaction {
            transaction.created.push(id);
        }

        let mut staged = BoxInit::new(id);
        init(&mut staged);
        for (path, value) in staged.values {
            self.set_value(&Address { id, path }, value)?;
        }
        for (path, target) in staged.pointers {
            self.refer(&Address { id, path }, &target)?;
        }
        Ok(id)
    }

    /// Attaches a box decoded from `payload`, reviving a retired id if needed.
    ///
    /// Pointer values found in the payload are not linked; they are returned
    /// as `(source, target)` so the caller can re-link them with [`refer`].
    ///
    /// [`refer`]: BoxGraph::refer
    pub fn restore_box(
        &mut self,
        kind: BoxKind,
        id: BoxId,
        payload: &[u8],
    ) -> Result<Vec<(Address, Address)>, CoreError> {
        self.require_transaction("restore_box")?;
        let mut node = BoxNode::read(kind, id, payload)?;
        let links = node
            .take_pointers()
            .into_iter()
            .map(|(path, target)| (Address { id, path }, target))
            .collect();
        self.attach(node)?;
        self.retired.remove(&id);
        Ok(links)
    }

    fn attach(&mut self, node: BoxNode) -> Result<(), CoreError> {
        let id = node.id();
        if self.boxes.contains_key(&id) {
            return Err(CoreError::DuplicateBox { id });
        }
        let update = Update::New {
            id,
            kind: node.kind(),
            payload: node.unlinked_bytes(),
        };
        self.boxes.insert(id, node);
        self.record(update);
        Ok(())
    }

    /// Writes a primitive value.
    pub fn set_value(&mut self, address: &Address, value: Value) -> Result<(), CoreError> {
        self.require_transaction("set_value")?;
        let node = self
            .boxes
            .get_mut(&address.id)
            .ok_or(CoreError::BoxNotFound { id: address.id })?;
        let (schema, slot) = node
            .field_mut(&address.path)
            .ok_or_else(|| CoreError::FieldNotFound {
                address: address.clone(),
            })?;
        let FieldNode::Value(current) = slot else {
            return Err(CoreError::NotAValue {
                address: address.clone(),
            });
        };
        if !value.fits(&schema.kind) {
            return Err(CoreError::TypeMismatch {
                address: address.clone(),
                expected: schema.kind.name(),
                found: value.kind_name(),
            });
        }
        if *current == value {
            return Ok(());
        }
        let old = std::mem::replace(current, value.clone());
        self.record(Update::Value {
            address: address.clone(),
            old,
            new: value,
        });
        Ok(())
    }

    /// Points `pointer` at `target`.
    ///
    /// Fails if the target does not exist or does not accept the pointer's
    /// type. Cardinality is not checked here.
    pub fn refer(&mut self, pointer: &Address, target: &Address) -> Result<(), CoreError> {
        self.require_transaction("refer")?;
        let pointer_type = self.pointer_type_of(pointer)?;
        let vertex = self
            .find_vertex(target)
            .ok_or_else(|| CoreError::VertexNotFound {
                address: target.clone(),
            })?;
        if !vertex.rules().accepts_type(pointer_type) {
            return Err(CoreError::PointerTypeRejected {
                pointer_type,
                target: target.clone(),
            });
        }
        self.write_pointer(pointer, pointer_type, Some(target.clone()))
    }

    /// Empties a pointer field.
    pub fn clear_pointer(&mut self, pointer: &Address) -> Result<(), CoreError> {
        self.require_transaction("clear_pointer")?;
        let pointer_type = self.pointer_type_of(pointer)?;
        self.write_pointer(pointer, pointer_type, None)
    }

    fn pointer_type_of(&self, pointer: &Address) -> Result<PointerType, CoreError> {
        let node = self
            .boxes
            .get(&pointer.id)
            .ok_or(CoreError::BoxNotFound { id: pointer.id })?;
        let (schema, _) = node
            .field(&pointer.path)
            .ok_or_else(|| CoreError::FieldNotFound {
                address: pointer.clone(),
            })?;
        schema
            .pointer()
            .map(|(pointer_type, _)| pointer_type)
            .ok_or_else(|| CoreError::NotAPointer {
                address: pointer.clone(),
            })
    }

    /// Stores the new target, keeps the index in sync and notifies hubs.
    fn write_pointer(
        &mut self,
        source: &Address,
        pointer_type: PointerType,
        new: Option<Address>,
    ) -> Result<(), CoreError> {
        let node = self
            .boxes
            .get_mut(&source.id)
            .ok_or(CoreError::BoxNotFound { id: source.id })?;
        let (_, slot) = node
            .field_mut(&source.path)
            .ok_or_else(|| CoreError::FieldNotFound {
                address: source.clone(),
            })?;
        let FieldNode::Pointer(current) = slot else {
            return Err(CoreError::NotAPointer {
                address: source.clone(),
            });
        };
        if *current == new {
            return Ok(());
        }
        let old = std::mem::replace(current, new.clone());

        if let Some(old_target) = &old {
            self.edges.disconnect(source);
            self.hubs.notify(&HubEvent {
                change: HubChange::Removed,
                source: source.clone(),
                target: old_target.clone(),
                pointer_type,
            });
        }
        if let Some(new_target) = &new {
            self.edges
                .connect(source.clone(), new_target.clone(), pointer_type);
            self.hubs.notify(&HubEvent {
                change: HubChange::Added,
                source: source.clone(),
                target: new_target.clone(),
                pointer_type,
            });
        }
        self.record(Update::Pointer {
            address: source.clone(),
            old,
            new,
        });
        Ok(())
    }

    /// Deletes a box and everything that cannot live without it.
    ///
    /// Every box holding a mandatory pointer into a doomed box (or one of its
    /// fields) is doomed too. Outgoing pointers of doomed boxes and optional
    /// incoming pointers from survivors are cleared through the regular hub
    /// notification path before the boxes are detached. Returns the deleted
    /// ids, starting with `id`.
    pub fn delete_box(&mut self, id: BoxId) -> Result<Vec<BoxId>, CoreError> {
        self.require_transaction("delete_box")?;
        if !self.boxes.contains_key(&id) {
            return Err(CoreError::BoxNotFound { id });
        }

        let doomed = self.collect_cascade(id);
        tracing::trace!(root = %id, count = doomed.len(), "delete cascade");

        for victim in &doomed {
            for (source, _, pointer_type) in self.edges.outgoing_of_box(*victim) {
                self.write_pointer(&source, pointer_type, None)?;
            }
        }
        for victim in &doomed {
            for (source, _, pointer_type) in self.edges.incoming_of_box(*victim) {
                self.write_pointer(&source, pointer_type, None)?;
            }
        }
        for victim in &doomed {
            self.detach(*victim)?;
        }
        Ok(doomed.into_iter().collect())
    }

    /// Breadth-first closure over mandatory incoming pointers.
    fn collect_cascade(&self, id: BoxId) -> IndexSet<BoxId> {
        let mut doomed = IndexSet::new();
        let mut queue = VecDeque::new();
        doomed.insert(id);
        queue.push_back(id);
        while let Some(current) = queue.pop_front() {
            for (source, _, _) in self.edges.incoming_of_box(current) {
                if !self.is_mandatory_pointer(&source) {
                    continue;
                }
                if doomed.insert(source.id) {
                    queue.push_back(source.id);
                }
            }
        }
        doomed
    }

    pub(crate) fn is_mandatory_pointer(&self, source: &Address) -> bool {
        self.boxes
            .get(&source.id)
            .and_then(|node| node.field(&source.path))
            .and_then(|(schema, _)| schema.pointer())
            .is_some_and(|(_, mandatory)| mandatory)
    }

    /// Removes a box that no longer has any edge and retires its id.
    fn detach(&mut self, id: BoxId) -> Result<(), CoreError> {
        if !self.edges.outgoing_of_box(id).is_empty() || !self.edges.incoming_of_box(id).is_empty()
        {
            return Err(CoreError::GraphInconsistency {
                reason: format!("box {} still has edges and cannot be detached", id),
            });
        }
        let node = self
            .boxes
            .remove(&id)
            .ok_or(CoreError::BoxNotFound { id })?;
        self.retired.insert(id);
        self.record(Update::Delete {
            id,
            kind: node.kind(),
            payload: node.unlinked_bytes(),
        });
        Ok(())
    }

    /// Replays one journal entry. Used by undo/redo and by abort.
    pub fn apply_update(&mut self, update: &Update) -> Result<(), CoreError> {
        self.require_transaction("apply_update")?;
        match update {
            Update::New { id, kind, payload } => {
                let links = self.restore_box(*kind, *id, payload)?;
                for (source, target) in links {
                    self.refer(&source, &target)?;
                }
                Ok(())
            }
            Update::Delete { id, .. } => self.detach(*id),
            Update::Value { address, old, new } => {
                let current = self.value(address).ok_or_else(|| CoreError::FieldNotFound {
                    address: address.clone(),
                })?;
                if current != old {
                    return Err(CoreError::GraphInconsistency {
                        reason: format!("{} holds {:?}, expected {:?}", address, current, old),
                    });
                }
                self.set_value(address, new.clone())
            }
            Update::Pointer { address, old, new } => {
                if self.pointer_target(address) != old.as_ref() {
                    return Err(CoreError::GraphInconsistency {
                        reason: format!("pointer {} does not hold the expected target", address),
                    });
                }
                match new {
                    Some(target) => self.refer(address, target),
                    None => self.clear_pointer(address),
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn find_box(&self, id: BoxId) -> Option<&BoxNode> {
        self.boxes.get(&id)
    }

    pub fn get_box(&self, id: BoxId) -> Result<&BoxNode, CoreError> {
        self.boxes.get(&id).ok_or(CoreError::BoxNotFound { id })
    }

    pub fn contains_box(&self, id: BoxId) -> bool {
        self.boxes.contains_key(&id)
    }

    /// `true` if `id` belonged to a box deleted from this graph.
    pub fn is_retired(&self, id: BoxId) -> bool {
        self.retired.contains(&id)
    }

    /// Resolves an address to a box or a field of an attached box.
    pub fn find_vertex(&self, address: &Address) -> Option<Vertex<'_>> {
        let owner = self.boxes.get(&address.id)?;
        let field = if address.is_box() {
            None
        } else {
            Some(owner.field(&address.path)?)
        };
        Some(Vertex {
            address: address.clone(),
            owner,
            field,
        })
    }

    pub fn contains_vertex(&self, address: &Address) -> bool {
        self.find_vertex(address).is_some()
    }

    /// Attached boxes in id order.
    pub fn boxes(&self) -> impl Iterator<Item = &BoxNode> {
        self.boxes.values()
    }

    /// Attached boxes of one kind, in id order.
    pub fn boxes_of(&self, kind: BoxKind) -> impl Iterator<Item = &BoxNode> {
        self.boxes.values().filter(move |node| node.kind() == kind)
    }

    pub fn box_count(&self) -> usize {
        self.boxes.len()
    }

    pub fn value(&self, address: &Address) -> Option<&Value> {
        self.boxes.get(&address.id)?.value(&address.path)
    }

    pub fn pointer_target(&self, address: &Address) -> Option<&Address> {
        self.boxes.get(&address.id)?.pointer_target(&address.path)
    }

    /// Follows a pointer to the vertex it targets.
    pub fn resolve_pointer(&self, address: &Address) -> Option<Vertex<'_>> {
        let target = self.pointer_target(address)?;
        self.find_vertex(target)
    }

    pub fn pointer_hub<'a>(&'a self, address: &'a Address) -> PointerHub<'a> {
        PointerHub::new(address, &self.edges)
    }

    pub fn edges(&self) -> Edges<'_> {
        Edges { graph: self }
    }

    /// See [`dependencies::dependencies_of`].
    pub fn dependencies_of(&self, roots: &[BoxId], options: &DependencyOptions<'_>) -> Dependencies {
        dependencies::dependencies_of(self, roots, options)
    }

    pub(crate) fn edge_index(&self) -> &EdgeIndex {
        &self.edges
    }

    // -----------------------------------------------------------------------
    // Subscriptions
    // -----------------------------------------------------------------------

    fn next_subscription_id(&mut self) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        id
    }

    /// Calls `listener` once per added or removed incoming pointer of
    /// `address` whose type is in `filter` (all types if empty).
    pub fn subscribe_pointer_hub(
        &mut self,
        address: Address,
        filter: &[PointerType],
        listener: impl FnMut(&HubEvent) + 'static,
    ) -> SubscriptionId {
        let id = self.next_subscription_id();
        self.hubs.insert(id, address, filter, Box::new(listener));
        id
    }

    /// Calls `listener` with the journal of every closed transaction.
    pub fn subscribe_updates(
        &mut self,
        listener: impl FnMut(&[Update]) + 'static,
    ) -> SubscriptionId {
        let id = self.next_subscription_id();
        self.update_listeners.insert(id, Box::new(listener));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.hubs.remove(id) || self.update_listeners.shift_remove(&id).is_some()
    }

    // -----------------------------------------------------------------------
    // Diagnostics
    // -----------------------------------------------------------------------

    /// Cross-checks pointer values against the edge index. Returns the number
    /// of verified edges.
    pub fn verify_pointers(&self) -> Result<usize, CoreError> {
        let inconsistent = |reason: String| CoreError::GraphInconsistency { reason };
        let mut count = 0;
        for node in self.boxes.values() {
            for (source, target) in node.outgoing() {
                match self.edges.target_of(&source) {
                    Some((indexed, _)) if *indexed == target => {}
                    _ => {
                        return Err(inconsistent(format!(
                            "pointer {} -> {} is not indexed",
                            source, target
                        )))
                    }
                }
                if !self.contains_vertex(&target) {
                    return Err(inconsistent(format!(
                        "pointer {} targets missing vertex {}",
                        source, target
                    )));
                }
                count += 1;
            }
        }
        for (source, target, _) in self.edges.iter() {
            if self.pointer_target(source) != Some(target) {
                return Err(inconsistent(format!(
                    "indexed edge {} -> {} has no backing field",
                    source, target
                )));
            }
        }
        if count != self.edges.len() {
            return Err(inconsistent(format!(
                "{} pointer values but {} indexed edges",
                count,
                self.edges.len()
            )));
        }
        Ok(count)
    }

    /// `true` if mandatory pointers form a cycle between boxes.
    pub fn has_mandatory_cycle(&self) -> bool {
        let mut graph = DiGraphMap::<BoxId, ()>::new();
        for (source, target, _) in self.edges.iter() {
            if self.is_mandatory_pointer(source) {
                graph.add_edge(source.id, target.id, ());
            }
        }
        is_cyclic_directed(&graph)
    }

    /// Diagnostic JSON rendering of every box.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Array(self.boxes.values().map(BoxNode::to_json).collect())
    }

    // -----------------------------------------------------------------------
    // Serialization
    // -----------------------------------------------------------------------

    /// Every box as a record, in id order.
    pub fn records(&self) -> Vec<BoxRecord> {
        self.boxes
            .values()
            .map(|node| BoxRecord {
                kind: node.kind(),
                id: node.id(),
                payload: node.to_bytes(),
            })
            .collect()
    }

    /// Snapshot of the whole graph.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = BytesMut::new();
        codec::write_header(&mut out, codec::GRAPH_MAGIC, codec::GRAPH_FORMAT_VERSION);
        codec::write_records(&mut out, &self.records());
        out.to_vec()
    }

    /// Loads a snapshot without running validation, so that graphs violating
    /// cardinality rules can still be inspected.
    pub fn from_bytes(bytes: &[u8]) -> Result<BoxGraph, CoreError> {
        Self::from_bytes_with_config(bytes, GraphConfig::default())
    }

    pub fn from_bytes_with_config(bytes: &[u8], config: GraphConfig) -> Result<BoxGraph, CoreError> {
        let mut input = bytes;
        codec::read_header(&mut input, codec::GRAPH_MAGIC, codec::GRAPH_FORMAT_VERSION)?;
        let records = codec::read_records(&mut input)?;
        if !input.is_empty() {
            return Err(CoreError::corrupt(format!(
                "{} trailing bytes after graph records",
                input.len()
            )));
        }

        let mut graph = BoxGraph::with_config(config);
        for record in records {
            let node = BoxNode::read(record.kind, record.id, &record.payload)?;
            if graph.boxes.insert(record.id, node).is_some() {
                return Err(CoreError::DuplicateBox { id: record.id });
            }
        }

        let mut links = Vec::new();
        for node in graph.boxes.values() {
            for (source, schema, target) in node.pointer_fields() {
                if let (Some(target), Some((pointer_type, _))) = (target, schema.pointer()) {
                    links.push((source, target, pointer_type));
                }
            }
        }
        for (source, target, pointer_type) in links {
            if !graph.contains_vertex(&target) {
                return Err(CoreError::UnresolvedPointer {
                    address: source,
                    target,
                });
            }
            graph.edges.connect(source, target, pointer_type);
        }
        tracing::debug!(
            boxes = graph.boxes.len(),
            edges = graph.edges.len(),
            "graph loaded"
        );
        Ok(graph)
    }
}

/// Edge queries and structural validation over a graph.
#[derive(Debug, Clone, Copy)]
pub struct Edges<'a> {
    graph: &'a BoxGraph,
}

impl<'a> Edges<'a> {
    /// Checks every structural rule and returns all violations, in box id
    /// order.
    pub fn validate_requirements(&self) -> Vec<Violation> {
        let edges = &self.graph.edges;
        let mut violations = Vec::new();
        for node in self.graph.boxes.values() {
            let schema = node.schema();

            let mut targets = Vec::new();
            if schema.rules.is_targetable() {
                targets.push((node.address(), schema.rules));
            }
            for (address, field) in node.targetable_fields() {
                targets.push((address, field.rules));
            }
            for (address, rules) in targets {
                let incoming = edges.incoming_count(&address);
                let context = schema.describe(&address.path);
                if rules.exclusive && incoming > 1 {
                    violations.push(Violation::ExclusiveTarget {
                        context,
                        address,
                        incoming,
                    });
                } else if rules.mandatory && incoming == 0 {
                    violations.push(Violation::MandatoryTarget { context, address });
                }
            }

            for (address, field, target) in node.pointer_fields() {
                let context = schema.describe(&address.path);
                match target {
                    None => {
                        if field.pointer().is_some_and(|(_, mandatory)| mandatory) {
                            violations.push(Violation::MandatoryPointer { context, address });
                        }
                    }
                    Some(target) => {
                        if !self.graph.contains_vertex(&target) {
                            violations.push(Violation::DanglingPointer {
                                context,
                                address,
                                target,
                            });
                        }
                    }
                }
            }
        }
        violations
    }

    /// `(source, target)` for every pointer held by box `id`.
    pub fn outgoing_edges_of(&self, id: BoxId) -> Vec<(Address, Address)> {
        self.graph
            .edges
            .outgoing_of_box(id)
            .into_iter()
            .map(|(source, target, _)| (source, target))
            .collect()
    }

    /// `(source, target)` for every pointer into box `id` or its fields.
    pub fn incoming_edges_of(&self, id: BoxId) -> Vec<(Address, Address)> {
        self.graph
            .edges
            .incoming_of_box(id)
            .into_iter()
            .map(|(source, target, _)| (source, target))
            .collect()
    }

    /// Sources of pointers targeting exactly `address`.
    pub fn incoming_edges_of_field(&self, address: &Address) -> Vec<Address> {
        self.graph
            .edges
            .incoming(address)
            .into_iter()
            .map(|(source, _)| source)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.graph.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.edges.is_empty()
    }
}
