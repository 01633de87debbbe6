//! Compile-time schema descriptors.
//!
//! Every box kind is described by a static [`BoxSchema`]: an ordered table of
//! [`FieldSchema`]s with type tags, defaults and pointer rules. Field access,
//! validation and serialization all walk this one table; there is no runtime
//! registration.

use serde::{Deserialize, Serialize};

use crate::address::FieldKey;
use crate::catalog::{BoxKind, PointerType};

/// How a box behaves when copied between graphs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Resource {
    /// Ordinary box: copies receive a fresh identity.
    Transient,
    /// Shared asset: its identity is canonical and never duplicated.
    Preserved,
}

/// Rules for a vertex (box or field) that pointers may target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerRules {
    /// Pointer types allowed to target this vertex. Empty = not targetable.
    pub accepts: &'static [PointerType],
    /// At least one incoming pointer is required.
    pub mandatory: bool,
    /// At most one incoming pointer is allowed.
    pub exclusive: bool,
}

impl PointerRules {
    pub const NONE: PointerRules = PointerRules {
        accepts: &[],
        mandatory: false,
        exclusive: false,
    };

    pub const fn accepts(accepts: &'static [PointerType]) -> Self {
        PointerRules {
            accepts,
            mandatory: false,
            exclusive: false,
        }
    }

    pub const fn mandatory(self) -> Self {
        PointerRules {
            mandatory: true,
            ..self
        }
    }

    pub const fn exclusive(self) -> Self {
        PointerRules {
            exclusive: true,
            ..self
        }
    }

    pub fn is_targetable(&self) -> bool {
        !self.accepts.is_empty()
    }

    pub fn accepts_type(&self, pointer_type: PointerType) -> bool {
        self.accepts.contains(&pointer_type)
    }
}

/// Type tag and default of a field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldKind {
    Int32 { default: i32 },
    Float32 { default: f32 },
    Boolean { default: bool },
    Text { default: &'static str },
    Bytes,
    /// A single outgoing edge. `mandatory` pointers must hold a target, and
    /// their box is deleted together with the target.
    Pointer {
        pointer_type: PointerType,
        mandatory: bool,
    },
    /// A slot without a value that exists only to be pointed at.
    Hub,
    Object { fields: &'static [FieldSchema] },
    Array {
        length: u16,
        element: &'static FieldSchema,
    },
}

impl FieldKind {
    /// One-byte tag written in front of every encoded field.
    pub fn tag(&self) -> u8 {
        match self {
            FieldKind::Int32 { .. } => 1,
            FieldKind::Float32 { .. } => 2,
            FieldKind::Boolean { .. } => 3,
            FieldKind::Text { .. } => 4,
            FieldKind::Bytes => 5,
            FieldKind::Pointer { .. } => 6,
            FieldKind::Hub => 7,
            FieldKind::Object { .. } => 8,
            FieldKind::Array { .. } => 9,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::Int32 { .. } => "int32",
            FieldKind::Float32 { .. } => "float32",
            FieldKind::Boolean { .. } => "boolean",
            FieldKind::Text { .. } => "text",
            FieldKind::Bytes => "bytes",
            FieldKind::Pointer { .. } => "pointer",
            FieldKind::Hub => "hub",
            FieldKind::Object { .. } => "object",
            FieldKind::Array { .. } => "array",
        }
    }
}

/// Static description of one field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSchema {
    pub key: FieldKey,
    pub name: &'static str,
    pub kind: FieldKind,
    pub rules: PointerRules,
}

impl FieldSchema {
    /// Schema of the child reached through `key`, for objects and arrays.
    pub fn child(&self, key: FieldKey) -> Option<&'static FieldSchema> {
        match self.kind {
            FieldKind::Object { fields } => fields.iter().find(|f| f.key == key),
            FieldKind::Array { length, element } if key < length => Some(element),
            _ => None,
        }
    }

    /// Position of the child reached through `key` in the stored children.
    pub fn child_index(&self, key: FieldKey) -> Option<usize> {
        match self.kind {
            FieldKind::Object { fields } => fields.iter().position(|f| f.key == key),
            FieldKind::Array { length, .. } if key < length => Some(key as usize),
            _ => None,
        }
    }

    /// Pointer type and mandatory flag if this is a pointer field.
    pub fn pointer(&self) -> Option<(PointerType, bool)> {
        match self.kind {
            FieldKind::Pointer {
                pointer_type,
                mandatory,
            } => Some((pointer_type, mandatory)),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Const constructors used by the catalog tables
// ---------------------------------------------------------------------------

pub const fn int32(key: FieldKey, name: &'static str, default: i32) -> FieldSchema {
    leaf(key, name, FieldKind::Int32 { default })
}

pub const fn float32(key: FieldKey, name: &'static str, default: f32) -> FieldSchema {
    leaf(key, name, FieldKind::Float32 { default })
}

pub const fn boolean(key: FieldKey, name: &'static str, default: bool) -> FieldSchema {
    leaf(key, name, FieldKind::Boolean { default })
}

pub const fn text(key: FieldKey, name: &'static str, default: &'static str) -> FieldSchema {
    leaf(key, name, FieldKind::Text { default })
}

pub const fn bytes(key: FieldKey, name: &'static str) -> FieldSchema {
    leaf(key, name, FieldKind::Bytes)
}

pub const fn pointer(
    key: FieldKey,
    name: &'static str,
    pointer_type: PointerType,
    mandatory: bool,
) -> FieldSchema {
    leaf(
        key,
        name,
        FieldKind::Pointer {
            pointer_type,
            mandatory,
        },
    )
}

pub const fn hub(key: FieldKey, name: &'static str, rules: PointerRules) -> FieldSchema {
    FieldSchema {
        key,
        name,
        kind: FieldKind::Hub,
        rules,
    }
}

pub const fn object(
    key: FieldKey,
    name: &'static str,
    fields: &'static [FieldSchema],
) -> FieldSchema {
    leaf(key, name, FieldKind::Object { fields })
}

pub const fn array(
    key: FieldKey,
    name: &'static str,
    length: u16,
    element: &'static FieldSchema,
) -> FieldSchema {
    leaf(key, name, FieldKind::Array { length, element })
}

const fn leaf(key: FieldKey, name: &'static str, kind: FieldKind) -> FieldSchema {
    FieldSchema {
        key,
        name,
        kind,
        rules: PointerRules::NONE,
    }
}

/// Static description of a box kind.
#[derive(Debug)]
pub struct BoxSchema {
    pub kind: BoxKind,
    pub name: &'static str,
    pub resource: Resource,
    /// Rules for pointers targeting the box itself.
    pub rules: PointerRules,
    pub fields: &'static [FieldSchema],
}

impl BoxSchema {
    /// Top-level field by key.
    pub fn field(&self, key: FieldKey) -> Option<&'static FieldSchema> {
        self.fields.iter().find(|f| f.key == key)
    }

    /// Resolves a field path. Returns `None` for the empty path (the box
    /// itself) and for unknown keys.
    pub fn resolve(&self, path: &[FieldKey]) -> Option<&'static FieldSchema> {
        let (first, rest) = path.split_first()?;
        let mut schema = self.field(*first)?;
        for key in rest {
            schema = schema.child(*key)?;
        }
        Some(schema)
    }

    /// Human-readable path, e.g. `StepSequencer.patterns[2].steps[5].gate`.
    pub fn describe(&self, path: &[FieldKey]) -> String {
        let mut out = String::from(self.name);
        let mut current: Option<&'static FieldSchema> = None;
        for key in path {
            let next = match current {
                None => self.field(*key),
                Some(parent) => parent.child(*key),
            };
            match (current.map(|p| p.kind), next) {
                (Some(FieldKind::Array { .. }), Some(_)) => out.push_str(&format!("[{}]", key)),
                (_, Some(schema)) => {
                    out.push('.');
                    out.push_str(schema.name);
                }
                (_, None) => {
                    out.push_str(&format!(".#{}", key));
                    return out;
                }
            }
            current = next;
        }
        out
    }

    /// Rules for the vertex at `path` (the box's own rules for the empty path).
    pub fn rules_at(&self, path: &[FieldKey]) -> Option<PointerRules> {
        if path.is_empty() {
            return Some(self.rules);
        }
        self.resolve(path).map(|f| f.rules)
    }
}
