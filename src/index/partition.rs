//! Capability interfaces consumed from the storage engine, and the aggregate over
//! all partitions of one logical index.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::types::{CloseErrors, DocId, EntityId, IndexError, Result};

use super::document::ENTITY_ID_FIELD;
use super::field::{FieldInfo, FieldKind, IndexedValue};

/// Exact-match lookup of one encoded value in one field.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Query {
    /// Field to search.
    pub field: String,
    /// Encoded value every hit must carry.
    pub value: IndexedValue,
}

impl Query {
    /// Creates an exact-match query.
    pub fn exact(field: impl Into<String>, value: IndexedValue) -> Self {
        Self {
            field: field.into(),
            value,
        }
    }
}

/// A term together with the number of documents carrying it in one partition.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TermEntry {
    /// Encoded term bytes.
    pub term: Vec<u8>,
    /// Document frequency of the term.
    pub doc_freq: u64,
}

/// Lazy, finite, non-restartable enumeration of a discrete field's terms.
pub trait TermCursor {
    /// Advances to the next term. Terms must arrive in strictly ascending byte order.
    fn next_term(&mut self) -> Result<Option<TermEntry>>;
}

/// Receives packed values during a point intersection.
pub trait PointVisitor {
    /// Called once per matching document. Errors abort the intersection.
    fn visit(&mut self, doc: DocId, packed: &[u8]) -> Result<()>;
}

impl<F> PointVisitor for F
where
    F: FnMut(DocId, &[u8]) -> Result<()>,
{
    fn visit(&mut self, doc: DocId, packed: &[u8]) -> Result<()> {
        self(doc, packed)
    }
}

/// Receives the hits of [`Partition::search`].
pub trait Collector {
    /// Called once per matching document, in the partition's native order.
    fn collect(&mut self, partition: &dyn Partition, doc: DocId) -> Result<()>;
}

/// One independently queryable shard of a schema index.
pub trait Partition {
    /// Every indexed field, the reserved entity-id field included.
    fn fields(&self) -> Result<Vec<FieldInfo>>;

    /// Enumerates the terms of a discrete field. Unknown fields yield an empty cursor.
    fn terms<'a>(&'a self, field: &str) -> Result<Box<dyn TermCursor + 'a>>;

    /// Visits every document of a point field over its full value domain.
    ///
    /// Visitation order is chosen by the partition and is not globally sorted.
    fn intersect_points(&self, field: &str, visitor: &mut dyn PointVisitor) -> Result<()>;

    /// Runs `query`, feeding each hit to `collector`.
    fn search(&self, query: &Query, collector: &mut dyn Collector) -> Result<()>;

    /// Resolves a document to its owning entity through the reserved field.
    fn resolve_entity(&self, doc: DocId) -> Result<EntityId>;

    /// Number of live documents in the partition.
    fn document_count(&self) -> Result<u64>;

    /// Releases partition resources. Later queries fail with `IndexUnavailable`.
    fn close(&self) -> Result<()>;
}

impl<P: Partition + ?Sized> Partition for Box<P> {
    fn fields(&self) -> Result<Vec<FieldInfo>> {
        (**self).fields()
    }

    fn terms<'a>(&'a self, field: &str) -> Result<Box<dyn TermCursor + 'a>> {
        (**self).terms(field)
    }

    fn intersect_points(&self, field: &str, visitor: &mut dyn PointVisitor) -> Result<()> {
        (**self).intersect_points(field, visitor)
    }

    fn search(&self, query: &Query, collector: &mut dyn Collector) -> Result<()> {
        (**self).search(query, collector)
    }

    fn resolve_entity(&self, doc: DocId) -> Result<EntityId> {
        (**self).resolve_entity(doc)
    }

    fn document_count(&self) -> Result<u64> {
        (**self).document_count()
    }

    fn close(&self) -> Result<()> {
        (**self).close()
    }
}

/// Ordered collection of the partitions backing one logical index.
///
/// The set never creates partitions; it only aggregates queries over them and
/// closes them on request.
pub struct PartitionSet<P> {
    partitions: Vec<P>,
}

impl<P: Partition> PartitionSet<P> {
    /// Wraps caller-supplied partitions.
    pub fn new(partitions: Vec<P>) -> Self {
        Self { partitions }
    }

    /// Wraps a single partition.
    pub fn single(partition: P) -> Self {
        Self {
            partitions: vec![partition],
        }
    }

    /// Number of partitions.
    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    /// Returns `true` when the set holds no partitions.
    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    /// Partitions in caller order.
    pub fn iter(&self) -> std::slice::Iter<'_, P> {
        self.partitions.iter()
    }

    /// Partitions in caller order.
    pub fn as_slice(&self) -> &[P] {
        &self.partitions
    }

    /// Union of the user-visible fields across partitions, ordered by name.
    ///
    /// The reserved entity-id field is excluded. A field must carry the same kind
    /// in every partition that has it.
    pub fn indexed_fields(&self) -> Result<Vec<FieldInfo>> {
        let mut union: BTreeMap<String, FieldKind> = BTreeMap::new();
        for partition in &self.partitions {
            for info in partition.fields()? {
                if info.name == ENTITY_ID_FIELD {
                    continue;
                }
                if !info.kind.is_valid() {
                    return Err(IndexError::Corruption("point field with zero packed width"));
                }
                match union.get(&info.name) {
                    Some(kind) if *kind != info.kind => {
                        return Err(IndexError::Corruption(
                            "field kind differs across partitions",
                        ));
                    }
                    Some(_) => {}
                    None => {
                        union.insert(info.name, info.kind);
                    }
                }
            }
        }
        Ok(union
            .into_iter()
            .map(|(name, kind)| FieldInfo { name, kind })
            .collect())
    }

    /// Live documents summed across partitions.
    pub fn document_count(&self) -> Result<u64> {
        let mut total = 0u64;
        for partition in &self.partitions {
            total = total.saturating_add(partition.document_count()?);
        }
        Ok(total)
    }

    /// Closes every partition, continuing past failures.
    ///
    /// All failures are reported together once every partition was attempted.
    pub fn close(self) -> Result<()> {
        let mut failures = Vec::new();
        for (idx, partition) in self.partitions.iter().enumerate() {
            if let Err(err) = partition.close() {
                warn!(partition = idx, error = %err, "index.partition.close_failed");
                failures.push(err);
            }
        }
        if failures.is_empty() {
            debug!(partitions = self.partitions.len(), "index.partition.closed");
            Ok(())
        } else {
            Err(IndexError::Close(CloseErrors(failures)))
        }
    }

    /// Closes the set, then hands back `outcome`.
    ///
    /// The partitions are closed even when `outcome` is an error, and that error
    /// takes precedence over a close failure.
    pub fn close_after<T, E: From<IndexError>>(
        self,
        outcome: std::result::Result<T, E>,
    ) -> std::result::Result<T, E> {
        let closed = self.close();
        let value = outcome?;
        closed?;
        Ok(value)
    }

    /// Releases ownership of the partitions without closing them.
    pub fn into_inner(self) -> Vec<P> {
        self.partitions
    }
}
