//! In-memory partition used by the admin tooling and tests.
//!
//! Discrete fields keep a sorted term dictionary with per-term posting lists.
//! Point fields keep their entries in insertion order, grouped into fixed-size
//! leaves; a leaf is visited in sorted order but leaves are visited in insertion
//! order, so an intersection is only sorted leaf by leaf.

use std::collections::{btree_map, BTreeMap};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::types::{DocId, EntityId, IndexError, PropValue, Result};

use super::document::{encode_value, ENTITY_ID_FIELD};
use super::field::{FieldInfo, FieldKind, IndexedValue};
use super::partition::{Collector, Partition, PointVisitor, Query, TermCursor, TermEntry};

/// Default number of points per leaf.
pub const DEFAULT_LEAF_SIZE: usize = 512;

type Postings = BTreeMap<Vec<u8>, Vec<DocId>>;

/// A partition held entirely in memory.
pub struct MemoryPartition {
    leaf_size: usize,
    entities: Vec<EntityId>,
    kinds: BTreeMap<String, FieldKind>,
    terms: BTreeMap<String, Postings>,
    points: BTreeMap<String, Vec<(Vec<u8>, DocId)>>,
    online: AtomicBool,
    closed: AtomicBool,
}

impl Default for MemoryPartition {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPartition {
    /// Creates an empty, online partition.
    pub fn new() -> Self {
        Self::with_leaf_size(DEFAULT_LEAF_SIZE)
    }

    /// Creates an empty partition whose point leaves hold `leaf_size` entries.
    pub fn with_leaf_size(leaf_size: usize) -> Self {
        Self {
            leaf_size: leaf_size.max(1),
            entities: Vec::new(),
            kinds: BTreeMap::new(),
            terms: BTreeMap::new(),
            points: BTreeMap::new(),
            online: AtomicBool::new(true),
            closed: AtomicBool::new(false),
        }
    }

    /// Indexes `value` for `entity` using the standard document structure.
    pub fn add(&mut self, entity: EntityId, value: &PropValue) -> Result<DocId> {
        let encoded = encode_value(value)?;
        let info = FieldInfo {
            name: encoded.field.to_owned(),
            kind: encoded.kind,
        };
        self.add_indexed(entity, &info, encoded.value)
    }

    /// Indexes a pre-encoded value in an arbitrary field.
    pub fn add_indexed(
        &mut self,
        entity: EntityId,
        field: &FieldInfo,
        value: IndexedValue,
    ) -> Result<DocId> {
        if field.name == ENTITY_ID_FIELD {
            return Err(IndexError::Invalid("entity id field is reserved"));
        }
        if !field.kind.is_valid() {
            return Err(IndexError::Invalid("point field with zero packed width"));
        }
        match self.kinds.get(&field.name) {
            Some(kind) if *kind != field.kind => {
                return Err(IndexError::Invalid("field already indexed with another kind"));
            }
            _ => {}
        }
        if !value.fits(&field.kind) {
            return Err(IndexError::Invalid("value does not fit field kind"));
        }
        let doc = DocId(
            u32::try_from(self.entities.len())
                .map_err(|_| IndexError::Invalid("partition document limit reached"))?,
        );
        self.entities.push(entity);
        self.kinds.insert(field.name.clone(), field.kind);
        match value {
            IndexedValue::Discrete(term) => {
                self.terms
                    .entry(field.name.clone())
                    .or_default()
                    .entry(term)
                    .or_default()
                    .push(doc);
            }
            IndexedValue::Point(packed) => {
                self.points
                    .entry(field.name.clone())
                    .or_default()
                    .push((packed, doc));
            }
        }
        Ok(doc)
    }

    /// Takes the partition offline or brings it back.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Release);
    }

    fn ensure_available(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(IndexError::IndexUnavailable("partition is closed".into()));
        }
        if !self.online.load(Ordering::Acquire) {
            return Err(IndexError::IndexUnavailable("partition is not online".into()));
        }
        Ok(())
    }

    fn visit_leaves<F>(&self, entries: &[(Vec<u8>, DocId)], mut f: F) -> Result<()>
    where
        F: FnMut(&[u8], DocId) -> Result<()>,
    {
        let mut leaf: Vec<&(Vec<u8>, DocId)> = Vec::with_capacity(self.leaf_size);
        for chunk in entries.chunks(self.leaf_size) {
            leaf.clear();
            leaf.extend(chunk.iter());
            leaf.sort_by(|a, b| a.0.cmp(&b.0));
            for (packed, doc) in leaf.iter().map(|entry| (entry.0.as_slice(), entry.1)) {
                f(packed, doc)?;
            }
        }
        Ok(())
    }
}

struct MemoryTermCursor<'a> {
    iter: Option<btree_map::Iter<'a, Vec<u8>, Vec<DocId>>>,
}

impl TermCursor for MemoryTermCursor<'_> {
    fn next_term(&mut self) -> Result<Option<TermEntry>> {
        Ok(self
            .iter
            .as_mut()
            .and_then(Iterator::next)
            .map(|(term, docs)| TermEntry {
                term: term.clone(),
                doc_freq: docs.len() as u64,
            }))
    }
}

impl Partition for MemoryPartition {
    fn fields(&self) -> Result<Vec<FieldInfo>> {
        self.ensure_available()?;
        let mut fields = Vec::with_capacity(self.kinds.len() + 1);
        if !self.entities.is_empty() {
            fields.push(FieldInfo::discrete(ENTITY_ID_FIELD));
        }
        fields.extend(self.kinds.iter().map(|(name, kind)| FieldInfo {
            name: name.clone(),
            kind: *kind,
        }));
        Ok(fields)
    }

    fn terms<'a>(&'a self, field: &str) -> Result<Box<dyn TermCursor + 'a>> {
        self.ensure_available()?;
        Ok(Box::new(MemoryTermCursor {
            iter: self.terms.get(field).map(|postings| postings.iter()),
        }))
    }

    fn intersect_points(&self, field: &str, visitor: &mut dyn PointVisitor) -> Result<()> {
        self.ensure_available()?;
        let Some(entries) = self.points.get(field) else {
            return Ok(());
        };
        self.visit_leaves(entries, |packed, doc| visitor.visit(doc, packed))
    }

    fn search(&self, query: &Query, collector: &mut dyn Collector) -> Result<()> {
        self.ensure_available()?;
        match &query.value {
            IndexedValue::Discrete(term) => {
                let docs = self
                    .terms
                    .get(&query.field)
                    .and_then(|postings| postings.get(term));
                for doc in docs.into_iter().flatten() {
                    collector.collect(self, *doc)?;
                }
                Ok(())
            }
            IndexedValue::Point(target) => {
                let Some(entries) = self.points.get(&query.field) else {
                    return Ok(());
                };
                self.visit_leaves(entries, |packed, doc| {
                    if packed == target.as_slice() {
                        collector.collect(self, doc)?;
                    }
                    Ok(())
                })
            }
        }
    }

    fn resolve_entity(&self, doc: DocId) -> Result<EntityId> {
        self.ensure_available()?;
        self.entities
            .get(doc.0 as usize)
            .copied()
            .ok_or(IndexError::Invalid("unknown document"))
    }

    fn document_count(&self) -> Result<u64> {
        self.ensure_available()?;
        Ok(self.entities.len() as u64)
    }

    fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

/// Spreads `entries` over `partitions` memory partitions, round robin.
pub fn partition_round_robin<'v, I>(
    entries: I,
    partitions: usize,
    leaf_size: usize,
) -> Result<Vec<MemoryPartition>>
where
    I: IntoIterator<Item = (EntityId, &'v PropValue)>,
{
    if partitions == 0 {
        return Err(IndexError::Invalid("partition count must be positive"));
    }
    let mut out: Vec<MemoryPartition> = (0..partitions)
        .map(|_| MemoryPartition::with_leaf_size(leaf_size))
        .collect();
    for (idx, (entity, value)) in entries.into_iter().enumerate() {
        out[idx % partitions].add(entity, value)?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::document::{encode_f64, NUMBER_FIELD, STRING_FIELD};

    struct Hits(Vec<EntityId>);

    impl Collector for Hits {
        fn collect(&mut self, partition: &dyn Partition, doc: DocId) -> Result<()> {
            self.0.push(partition.resolve_entity(doc)?);
            Ok(())
        }
    }

    #[test]
    fn term_search_resolves_entities() {
        let mut partition = MemoryPartition::new();
        partition.add(EntityId(10), &PropValue::from("a")).unwrap();
        partition.add(EntityId(11), &PropValue::from("b")).unwrap();
        partition.add(EntityId(12), &PropValue::from("a")).unwrap();
        let mut hits = Hits(Vec::new());
        let query = Query::exact(STRING_FIELD, IndexedValue::Discrete(b"a".to_vec()));
        partition.search(&query, &mut hits).unwrap();
        assert_eq!(hits.0, vec![EntityId(10), EntityId(12)]);
    }

    #[test]
    fn point_intersection_is_sorted_per_leaf_only() {
        let mut partition = MemoryPartition::with_leaf_size(2);
        for (entity, value) in [(1, 5.0), (2, 3.0), (3, 4.0), (4, 1.0)] {
            partition
                .add(EntityId(entity), &PropValue::Float(value))
                .unwrap();
        }
        let mut seen = Vec::new();
        partition
            .intersect_points(NUMBER_FIELD, &mut |doc: DocId, packed: &[u8]| -> Result<()> {
                seen.push((doc.0, packed.to_vec()));
                Ok(())
            })
            .unwrap();
        let expected = vec![
            (1, encode_f64(3.0).to_vec()),
            (0, encode_f64(5.0).to_vec()),
            (3, encode_f64(1.0).to_vec()),
            (2, encode_f64(4.0).to_vec()),
        ];
        assert_eq!(seen, expected);
    }

    #[test]
    fn offline_partition_is_unavailable() {
        let partition = MemoryPartition::new();
        partition.set_online(false);
        assert!(matches!(
            partition.fields(),
            Err(IndexError::IndexUnavailable(_))
        ));
        partition.set_online(true);
        assert!(partition.fields().unwrap().is_empty());
    }

    #[test]
    fn reserved_field_cannot_be_written() {
        let mut partition = MemoryPartition::new();
        let err = partition
            .add_indexed(
                EntityId(1),
                &FieldInfo::discrete(ENTITY_ID_FIELD),
                IndexedValue::Discrete(b"1".to_vec()),
            )
            .unwrap_err();
        assert!(matches!(err, IndexError::Invalid(_)));
    }

    #[test]
    fn round_robin_spreads_entries() {
        let values: Vec<PropValue> = (0..5).map(PropValue::Int).collect();
        let parts = partition_round_robin(
            values
                .iter()
                .enumerate()
                .map(|(idx, value)| (EntityId(idx as u64), value)),
            2,
            DEFAULT_LEAF_SIZE,
        )
        .unwrap();
        let counts: Vec<u64> = parts.iter().map(|p| p.document_count().unwrap()).collect();
        assert_eq!(counts, vec![3, 2]);
        assert!(partition_round_robin(std::iter::empty(), 0, 1).is_err());
    }
}
