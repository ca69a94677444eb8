use smallvec::SmallVec;
use tracing::trace;

use crate::index::accessor::PropertyAccessor;
use crate::index::partition::{Collector, Partition, Query};
use crate::types::{DocId, EntityId, IndexError, PropId, PropValue, Result};

/// Confirms candidate duplicates against the property store.
///
/// The collector itself is scoped to one verification call. Candidate state lives
/// in a [`ValueScope`]: opening a scope forgets everything learned about the
/// previous value, while every search run through the same scope accumulates, so a
/// duplicate whose two documents sit in different partitions is still found.
pub struct DuplicateCheckingCollector<'a, A: PropertyAccessor + ?Sized> {
    accessor: &'a A,
    prop: PropId,
    seen: SmallVec<[(PropValue, EntityId); 4]>,
    resolved: u64,
}

impl<'a, A: PropertyAccessor + ?Sized> DuplicateCheckingCollector<'a, A> {
    /// Creates a collector checking `prop` through `accessor`.
    pub fn new(accessor: &'a A, prop: PropId) -> Self {
        Self {
            accessor,
            prop,
            seen: SmallVec::new(),
            resolved: 0,
        }
    }

    /// Starts checking a new indexed value.
    pub fn value_scope(&mut self) -> ValueScope<'_, 'a, A> {
        self.reset();
        ValueScope { collector: self }
    }

    /// Forgets every entity remembered for the current value.
    pub fn reset(&mut self) {
        self.seen.clear();
    }

    /// Candidates whose authoritative value was fetched so far.
    pub fn candidates_resolved(&self) -> u64 {
        self.resolved
    }

    fn check(&mut self, entity: EntityId) -> Result<()> {
        let value = match self.accessor.get_property(entity, self.prop)? {
            Some(value) if !value.is_null() => value,
            _ => {
                trace!(entity = entity.0, prop = self.prop.0, "index.verify.value_absent");
                return Ok(());
            }
        };
        self.resolved += 1;
        for (seen_value, seen_entity) in &self.seen {
            if *seen_entity == entity {
                return Ok(());
            }
            if *seen_value == value {
                return Err(IndexError::conflict(value, *seen_entity, entity));
            }
        }
        // Equal encodings but different stored values: an encoding collision.
        self.seen.push((value, entity));
        Ok(())
    }
}

/// Candidate state for one indexed value.
pub struct ValueScope<'c, 'a, A: PropertyAccessor + ?Sized> {
    collector: &'c mut DuplicateCheckingCollector<'a, A>,
}

impl<A: PropertyAccessor + ?Sized> ValueScope<'_, '_, A> {
    /// Runs `query` against `partition`, keeping what earlier searches learned.
    pub fn search<P: Partition + ?Sized>(&mut self, partition: &P, query: &Query) -> Result<()> {
        partition
            .search(query, self)
            .map_err(IndexError::unwrap_conflict)
    }

    /// Offers an already resolved candidate entity.
    pub fn offer(&mut self, entity: EntityId) -> Result<()> {
        self.collector.check(entity)
    }

    /// Distinct entities remembered for the current value.
    pub fn remembered(&self) -> usize {
        self.collector.seen.len()
    }
}

impl<A: PropertyAccessor + ?Sized> Collector for ValueScope<'_, '_, A> {
    fn collect(&mut self, partition: &dyn Partition, doc: DocId) -> Result<()> {
        let entity = partition.resolve_entity(doc)?;
        self.collector.check(entity)
    }
}
