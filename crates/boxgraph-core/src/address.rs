//! Stable identities for boxes and fields.
//!
//! A [`BoxId`] is a 128-bit UUID wrapped in a newtype so that it cannot be
//! confused with other UUIDs flowing through the application. An [`Address`]
//! names either a whole box (empty path) or a field nested inside it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use uuid::Uuid;

use crate::error::CoreError;

/// Key of a field within its parent; array elements use their index.
pub type FieldKey = u16;

/// Ordered list of field keys leading from a box to a nested field.
pub type FieldPath = SmallVec<[FieldKey; 4]>;

/// Stable box identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BoxId(pub Uuid);

impl BoxId {
    /// Generates a fresh random (v4) identifier.
    pub fn generate() -> Self {
        BoxId(Uuid::new_v4())
    }

    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        BoxId(Uuid::from_bytes(bytes))
    }

    /// Returns the canonical byte representation of this id.
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl fmt::Display for BoxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for BoxId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(BoxId)
            .map_err(|_| CoreError::InvalidAddress {
                text: s.to_string(),
            })
    }
}

/// Identity of a box or of a field within a box.
///
/// Two addresses are equal iff both the id and the path are equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address {
    pub id: BoxId,
    pub path: FieldPath,
}

impl Address {
    /// Address of the box itself.
    pub fn of_box(id: BoxId) -> Self {
        Address {
            id,
            path: FieldPath::new(),
        }
    }

    pub fn new(id: BoxId, path: &[FieldKey]) -> Self {
        Address {
            id,
            path: FieldPath::from_slice(path),
        }
    }

    /// Returns a new address one level deeper.
    pub fn field(&self, key: FieldKey) -> Self {
        let mut path = self.path.clone();
        path.push(key);
        Address { id: self.id, path }
    }

    /// `true` if this address names a whole box.
    pub fn is_box(&self) -> bool {
        self.path.is_empty()
    }

    /// The address of the box owning this vertex.
    pub fn box_address(&self) -> Self {
        Address::of_box(self.id)
    }

    /// Same path, different box. Used when remapping identities.
    pub fn with_id(&self, id: BoxId) -> Self {
        Address {
            id,
            path: self.path.clone(),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)?;
        for key in &self.path {
            write!(f, "/{}", key)?;
        }
        Ok(())
    }
}

impl FromStr for Address {
    type Err = CoreError;

    /// Parses `<uuid>` or `<uuid>/<key>/<key>...`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CoreError::InvalidAddress {
            text: s.to_string(),
        };
        let mut parts = s.split('/');
        let id: BoxId = parts.next().ok_or_else(invalid)?.parse()?;
        let mut path = FieldPath::new();
        for part in parts {
            path.push(part.parse::<FieldKey>().map_err(|_| invalid())?);
        }
        Ok(Address { id, path })
    }
}

impl From<BoxId> for Address {
    fn from(id: BoxId) -> Self {
        Address::of_box(id)
    }
}
