//! Boxes: typed records holding a field tree.
//!
//! A [`BoxNode`] owns its field values. Edges between boxes live in the
//! graph's edge index; the box only stores the target address in each
//! pointer field.

use bytes::{BufMut, BytesMut};

use crate::address::{Address, BoxId, FieldKey, FieldPath};
use crate::catalog::BoxKind;
use crate::codec;
use crate::error::CoreError;
use crate::field::{self, FieldNode, Value};
use crate::schema::{BoxSchema, FieldKind, FieldSchema, Resource};

/// A box and its field values.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxNode {
    id: BoxId,
    kind: BoxKind,
    fields: Vec<FieldNode>,
}

impl BoxNode {
    /// Creates a box with every field at its schema default.
    pub fn new(kind: BoxKind, id: BoxId) -> Self {
        BoxNode {
            id,
            kind,
            fields: field::defaults(kind.schema().fields),
        }
    }

    pub fn id(&self) -> BoxId {
        self.id
    }

    pub fn kind(&self) -> BoxKind {
        self.kind
    }

    pub fn schema(&self) -> &'static BoxSchema {
        self.kind.schema()
    }

    pub fn address(&self) -> Address {
        Address::of_box(self.id)
    }

    pub fn resource(&self) -> Resource {
        self.schema().resource
    }

    /// The field node at `path` together with its schema.
    pub fn field(&self, path: &[FieldKey]) -> Option<(&'static FieldSchema, &FieldNode)> {
        field::resolve(self.schema().fields, &self.fields, path)
    }

    pub(crate) fn field_mut(
        &mut self,
        path: &[FieldKey],
    ) -> Option<(&'static FieldSchema, &mut FieldNode)> {
        field::resolve_mut(self.kind.schema().fields, &mut self.fields, path)
    }

    /// The primitive value at `path`.
    pub fn value(&self, path: &[FieldKey]) -> Option<&Value> {
        self.field(path).and_then(|(_, node)| node.as_value())
    }

    /// The target of the pointer at `path`, if it holds one.
    pub fn pointer_target(&self, path: &[FieldKey]) -> Option<&Address> {
        self.field(path).and_then(|(_, node)| node.as_target())
    }

    /// Every pointer field holding a target, as `(source, target)` pairs in
    /// schema order.
    pub fn outgoing(&self) -> Vec<(Address, Address)> {
        let mut out = Vec::new();
        field::walk(self.schema().fields, &self.fields, &mut |path, _, node| {
            if let Some(target) = node.as_target() {
                out.push((Address::new(self.id, path), target.clone()));
            }
        });
        out
    }

    /// Every pointer field of the box (targets or not) with its schema.
    pub fn pointer_fields(&self) -> Vec<(Address, &'static FieldSchema, Option<Address>)> {
        let mut out = Vec::new();
        field::walk(self.schema().fields, &self.fields, &mut |path, schema, node| {
            if let FieldNode::Pointer(target) = node {
                out.push((Address::new(self.id, path), schema, target.clone()));
            }
        });
        out
    }

    /// Every targetable field of the box with its schema.
    pub fn targetable_fields(&self) -> Vec<(Address, &'static FieldSchema)> {
        let mut out = Vec::new();
        field::walk(self.schema().fields, &self.fields, &mut |path, schema, _| {
            if schema.rules.is_targetable() {
                out.push((Address::new(self.id, path), schema));
            }
        });
        out
    }

    /// Empties every pointer, returning the removed links.
    pub(crate) fn take_pointers(&mut self) -> Vec<(FieldPath, Address)> {
        field::take_pointers(self.kind.schema().fields, &mut self.fields)
    }

    // -----------------------------------------------------------------------
    // Serialization
    // -----------------------------------------------------------------------

    pub fn write(&self, out: &mut impl BufMut) {
        codec::write_box(out, self.schema().fields, &self.fields);
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = BytesMut::new();
        self.write(&mut out);
        out.to_vec()
    }

    /// Decodes a payload written by [`BoxNode::write`] into a box of `kind`.
    pub fn read(kind: BoxKind, id: BoxId, payload: &[u8]) -> Result<Self, CoreError> {
        let mut input = payload;
        let fields = codec::read_box(&mut input, kind.schema().fields)?;
        if !input.is_empty() {
            return Err(CoreError::corrupt(format!(
                "{} trailing bytes after {} payload",
                input.len(),
                kind.name()
            )));
        }
        Ok(BoxNode { id, kind, fields })
    }

    /// Payload with every pointer emptied. Stored in the journal so that
    /// replaying a creation never re-links anything on its own.
    pub(crate) fn unlinked_bytes(&self) -> Vec<u8> {
        let mut copy = self.clone();
        copy.take_pointers();
        copy.to_bytes()
    }

    /// Renders the box keyed by field names.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id.to_string(),
            "kind": self.kind.name(),
            "fields": fields_json(self.schema().fields, &self.fields),
        })
    }
}

fn fields_json(fields: &'static [FieldSchema], nodes: &[FieldNode]) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for (schema, node) in fields.iter().zip(nodes) {
        if matches!(schema.kind, FieldKind::Hub) {
            continue;
        }
        map.insert(schema.name.to_string(), node_json(schema, node));
    }
    serde_json::Value::Object(map)
}

fn node_json(schema: &'static FieldSchema, node: &FieldNode) -> serde_json::Value {
    match (schema.kind, node) {
        (_, FieldNode::Value(value)) => value.to_json(),
        (_, FieldNode::Pointer(target)) => match target {
            Some(target) => serde_json::Value::String(target.to_string()),
            None => serde_json::Value::Null,
        },
        (FieldKind::Object { fields }, FieldNode::Object(children)) => {
            fields_json(fields, children)
        }
        (FieldKind::Array { element, .. }, FieldNode::Array(children)) => serde_json::Value::Array(
            children.iter().map(|c| node_json(element, c)).collect(),
        ),
        _ => serde_json::Value::Null,
    }
}

/// Initial writes applied to a box created inside a transaction.
///
/// Writes are staged and applied by the graph through the same checked paths
/// as ordinary mutations, so pointers set here are indexed and notified.
#[derive(Debug)]
pub struct BoxInit {
    id: BoxId,
    pub(crate) values: Vec<(FieldPath, Value)>,
    pub(crate) pointers: Vec<(FieldPath, Address)>,
}

impl BoxInit {
    pub(crate) fn new(id: BoxId) -> Self {
        BoxInit {
            id,
            values: Vec::new(),
            pointers: Vec::new(),
        }
    }

    /// Id of the box being created.
    pub fn id(&self) -> BoxId {
        self.id
    }

    pub fn set(&mut self, path: &[FieldKey], value: impl Into<Value>) -> &mut Self {
        self.values.push((FieldPath::from_slice(path), value.into()));
        self
    }

    pub fn refer(&mut self, path: &[FieldKey], target: impl Into<Address>) -> &mut Self {
        self.pointers
            .push((FieldPath::from_slice(path), target.into()));
        self
    }
}
