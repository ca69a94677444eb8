#![forbid(unsafe_code)]

//! Identifier newtypes, authoritative property values, and the crate error type.

use std::fmt;

mod error;
mod value;

pub use error::{CloseErrors, ConflictRecord, IndexError, Result};
pub use value::PropValue;

/// Graph-level identifier of a node or relationship owning an indexed document.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, serde::Serialize)]
pub struct EntityId(pub u64);

/// Property key identifier.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, serde::Serialize)]
pub struct PropId(pub u32);

/// Partition-local document identifier.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct DocId(pub u32);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for PropId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for EntityId {
    fn from(value: u64) -> Self {
        EntityId(value)
    }
}

impl From<EntityId> for u64 {
    fn from(value: EntityId) -> Self {
        value.0
    }
}

impl From<u32> for PropId {
    fn from(value: u32) -> Self {
        PropId(value)
    }
}

impl From<PropId> for u32 {
    fn from(value: PropId) -> Self {
        value.0
    }
}
