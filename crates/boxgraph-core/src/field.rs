//! Field storage: primitive values, pointers and nested containers.
//!
//! A box stores its fields as a tree of [`FieldNode`]s laid out parallel to
//! its schema table. Objects keep one child per schema field, arrays one
//! child per element.

use serde::{Deserialize, Serialize};

use crate::address::{Address, FieldKey, FieldPath};
use crate::schema::{FieldKind, FieldSchema};

/// A primitive field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Int32(i32),
    Float32(f32),
    Boolean(bool),
    Text(String),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Int32(_) => "int32",
            Value::Float32(_) => "float32",
            Value::Boolean(_) => "boolean",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
        }
    }

    /// `true` if the value can be stored in a field of this kind.
    pub fn fits(&self, kind: &FieldKind) -> bool {
        matches!(
            (self, kind),
            (Value::Int32(_), FieldKind::Int32 { .. })
                | (Value::Float32(_), FieldKind::Float32 { .. })
                | (Value::Boolean(_), FieldKind::Boolean { .. })
                | (Value::Text(_), FieldKind::Text { .. })
                | (Value::Bytes(_), FieldKind::Bytes)
        )
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::Float32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Int32(v) => serde_json::json!(v),
            Value::Float32(v) => serde_json::json!(v),
            Value::Boolean(v) => serde_json::json!(v),
            Value::Text(v) => serde_json::json!(v),
            Value::Bytes(v) => serde_json::json!(v),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float32(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

/// One node of a box's field tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldNode {
    Value(Value),
    Pointer(Option<Address>),
    Hub,
    Object(Vec<FieldNode>),
    Array(Vec<FieldNode>),
}

impl FieldNode {
    /// Builds the default node for a schema field.
    pub fn with_defaults(schema: &FieldSchema) -> FieldNode {
        match schema.kind {
            FieldKind::Int32 { default } => FieldNode::Value(Value::Int32(default)),
            FieldKind::Float32 { default } => FieldNode::Value(Value::Float32(default)),
            FieldKind::Boolean { default } => FieldNode::Value(Value::Boolean(default)),
            FieldKind::Text { default } => FieldNode::Value(Value::Text(default.to_string())),
            FieldKind::Bytes => FieldNode::Value(Value::Bytes(Vec::new())),
            FieldKind::Pointer { .. } => FieldNode::Pointer(None),
            FieldKind::Hub => FieldNode::Hub,
            FieldKind::Object { fields } => FieldNode::Object(defaults(fields)),
            FieldKind::Array { length, element } => {
                FieldNode::Array((0..length).map(|_| FieldNode::with_defaults(element)).collect())
            }
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            FieldNode::Value(v) => Some(v),
            _ => None,
        }
    }

    /// The pointer target, if this is a pointer holding one.
    pub fn as_target(&self) -> Option<&Address> {
        match self {
            FieldNode::Pointer(target) => target.as_ref(),
            _ => None,
        }
    }
}

/// Default nodes for a list of schema fields.
pub fn defaults(fields: &'static [FieldSchema]) -> Vec<FieldNode> {
    fields.iter().map(FieldNode::with_defaults).collect()
}

/// Resolves `path` inside a field tree laid out after `fields`.
pub(crate) fn resolve<'a>(
    fields: &'static [FieldSchema],
    nodes: &'a [FieldNode],
    path: &[FieldKey],
) -> Option<(&'static FieldSchema, &'a FieldNode)> {
    let (first, rest) = path.split_first()?;
    let index = fields.iter().position(|f| f.key == *first)?;
    let mut schema: &'static FieldSchema = &fields[index];
    let mut node = nodes.get(index)?;
    for key in rest {
        let child = schema.child_index(*key)?;
        schema = schema.child(*key)?;
        node = match node {
            FieldNode::Object(children) | FieldNode::Array(children) => children.get(child)?,
            _ => return None,
        };
    }
    Some((schema, node))
}

pub(crate) fn resolve_mut<'a>(
    fields: &'static [FieldSchema],
    nodes: &'a mut [FieldNode],
    path: &[FieldKey],
) -> Option<(&'static FieldSchema, &'a mut FieldNode)> {
    let (first, rest) = path.split_first()?;
    let index = fields.iter().position(|f| f.key == *first)?;
    let mut schema: &'static FieldSchema = &fields[index];
    let mut node = nodes.get_mut(index)?;
    for key in rest {
        let child = schema.child_index(*key)?;
        schema = schema.child(*key)?;
        node = match node {
            FieldNode::Object(children) | FieldNode::Array(children) => children.get_mut(child)?,
            _ => return None,
        };
    }
    Some((schema, node))
}

/// Visits every node of a field tree depth-first, containers before their
/// children, with the full path of each node.
pub(crate) fn walk<'a>(
    fields: &'static [FieldSchema],
    nodes: &'a [FieldNode],
    visit: &mut dyn FnMut(&[FieldKey], &'static FieldSchema, &'a FieldNode),
) {
    let mut path = FieldPath::new();
    for (schema, node) in fields.iter().zip(nodes) {
        path.push(schema.key);
        walk_node(schema, node, &mut path, visit);
        path.pop();
    }
}

fn walk_node<'a>(
    schema: &'static FieldSchema,
    node: &'a FieldNode,
    path: &mut FieldPath,
    visit: &mut dyn FnMut(&[FieldKey], &'static FieldSchema, &'a FieldNode),
) {
    visit(path.as_slice(), schema, node);
    match (schema.kind, node) {
        (FieldKind::Object { fields }, FieldNode::Object(children)) => {
            for (child_schema, child) in fields.iter().zip(children) {
                path.push(child_schema.key);
                walk_node(child_schema, child, path, visit);
                path.pop();
            }
        }
        (FieldKind::Array { element, .. }, FieldNode::Array(children)) => {
            for (index, child) in children.iter().enumerate() {
                path.push(index as FieldKey);
                walk_node(element, child, path, visit);
                path.pop();
            }
        }
        _ => {}
    }
}

/// Empties every pointer in a field tree, returning `(path, target)` for each
/// pointer that held a target.
pub(crate) fn take_pointers(
    fields: &'static [FieldSchema],
    nodes: &mut [FieldNode],
) -> Vec<(FieldPath, Address)> {
    fn take_node(
        schema: &'static FieldSchema,
        node: &mut FieldNode,
        path: &mut FieldPath,
        out: &mut Vec<(FieldPath, Address)>,
    ) {
        if let FieldNode::Pointer(target) = node {
            if let Some(target) = target.take() {
                out.push((path.clone(), target));
            }
            return;
        }
        match (schema.kind, node) {
            (FieldKind::Object { fields }, FieldNode::Object(children)) => {
                for (child_schema, child) in fields.iter().zip(children.iter_mut()) {
                    path.push(child_schema.key);
                    take_node(child_schema, child, path, out);
                    path.pop();
                }
            }
            (FieldKind::Array { element, .. }, FieldNode::Array(children)) => {
                for (index, child) in children.iter_mut().enumerate() {
                    path.push(index as FieldKey);
                    take_node(element, child, path, out);
                    path.pop();
                }
            }
            _ => {}
        }
    }

    let mut out = Vec::new();
    let mut path = FieldPath::new();
    for (schema, node) in fields.iter().zip(nodes.iter_mut()) {
        path.push(schema.key);
        take_node(schema, node, &mut path, &mut out);
        path.pop();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::BoxId;
    use crate::catalog::{audio_region, step_sequencer, BoxKind};

    #[test]
    fn defaults_follow_schema() {
        let fields = BoxKind::AudioRegion.schema().fields;
        let nodes = defaults(fields);
        assert_eq!(nodes.len(), fields.len());
        let (_, position) = resolve(fields, &nodes, &[audio_region::POSITION]).unwrap();
        assert_eq!(position.as_value(), Some(&Value::Int32(0)));
        let (_, file) = resolve(fields, &nodes, &[audio_region::FILE]).unwrap();
        assert_eq!(file, &FieldNode::Pointer(None));
    }

    #[test]
    fn pattern_grid_has_nested_defaults() {
        let fields = BoxKind::StepSequencer.schema().fields;
        let nodes = defaults(fields);
        let path = [
            step_sequencer::PATTERNS,
            15,
            step_sequencer::pattern::STEPS,
            15,
            step_sequencer::step::VELOCITY,
        ];
        let (schema, node) = resolve(fields, &nodes, &path).unwrap();
        assert_eq!(schema.name, "velocity");
        assert_eq!(node.as_value(), Some(&Value::Float32(0.8)));
    }

    #[test]
    fn resolve_mut_writes_through() {
        let fields = BoxKind::StepSequencer.schema().fields;
        let mut nodes = defaults(fields);
        let path = [
            step_sequencer::PATTERNS,
            2,
            step_sequencer::pattern::STEPS,
            7,
            step_sequencer::step::GATE,
        ];
        let (_, node) = resolve_mut(fields, &mut nodes, &path).unwrap();
        *node = FieldNode::Value(Value::Boolean(true));
        let (_, node) = resolve(fields, &nodes, &path).unwrap();
        assert_eq!(node.as_value(), Some(&Value::Boolean(true)));
    }

    #[test]
    fn walk_visits_every_step() {
        let fields = BoxKind::StepSequencer.schema().fields;
        let nodes = defaults(fields);
        let mut gates = 0;
        walk(fields, &nodes, &mut |_, schema, _| {
            if schema.name == "gate" {
                gates += 1;
            }
        });
        assert_eq!(
            gates,
            (step_sequencer::PATTERN_COUNT * step_sequencer::STEP_COUNT) as usize
        );
    }

    #[test]
    fn take_pointers_empties_targets() {
        let fields = BoxKind::AudioRegion.schema().fields;
        let mut nodes = defaults(fields);
        let target = Address::of_box(BoxId::from_bytes([3; 16]));
        let (_, file) = resolve_mut(fields, &mut nodes, &[audio_region::FILE]).unwrap();
        *file = FieldNode::Pointer(Some(target.clone()));

        let taken = take_pointers(fields, &mut nodes);
        assert_eq!(taken.len(), 1);
        assert_eq!(taken[0].0.as_slice(), &[audio_region::FILE]);
        assert_eq!(taken[0].1, target);
        let (_, file) = resolve(fields, &nodes, &[audio_region::FILE]).unwrap();
        assert_eq!(file.as_target(), None);
    }

    #[test]
    fn value_fits_kind() {
        assert!(Value::from(3).fits(&FieldKind::Int32 { default: 0 }));
        assert!(!Value::from(3.0f32).fits(&FieldKind::Int32 { default: 0 }));
        assert!(Value::from("x").fits(&FieldKind::Text { default: "" }));
        assert!(!Value::from(true).fits(&FieldKind::Hub));
    }
}
