use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::types::{EntityId, PropId, PropValue, Result};

/// Authoritative, currently committed property values.
///
/// Verification consults this instead of the index encoding, which may be lossy.
pub trait PropertyAccessor {
    /// Returns the stored value of `prop` on `entity`, or `None` when absent.
    fn get_property(&self, entity: EntityId, prop: PropId) -> Result<Option<PropValue>>;
}

impl<A: PropertyAccessor + ?Sized> PropertyAccessor for &A {
    fn get_property(&self, entity: EntityId, prop: PropId) -> Result<Option<PropValue>> {
        (**self).get_property(entity, prop)
    }
}

/// Thread-safe in-memory property store.
#[derive(Default)]
pub struct MemoryPropertyStore {
    values: RwLock<FxHashMap<(EntityId, PropId), PropValue>>,
}

impl MemoryPropertyStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `prop` on `entity`, returning the previous value.
    pub fn set(&self, entity: EntityId, prop: PropId, value: PropValue) -> Option<PropValue> {
        self.values.write().insert((entity, prop), value)
    }

    /// Removes `prop` from `entity`, returning the previous value.
    pub fn remove(&self, entity: EntityId, prop: PropId) -> Option<PropValue> {
        self.values.write().remove(&(entity, prop))
    }

    /// Number of stored `(entity, prop)` pairs.
    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    /// Returns `true` when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }
}

impl PropertyAccessor for MemoryPropertyStore {
    fn get_property(&self, entity: EntityId, prop: PropId) -> Result<Option<PropValue>> {
        Ok(self.values.read().get(&(entity, prop)).cloned())
    }
}
