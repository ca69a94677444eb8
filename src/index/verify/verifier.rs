use serde::Serialize;
use smallvec::SmallVec;
use tracing::{debug, info, trace, warn};

use crate::index::accessor::PropertyAccessor;
use crate::index::control::TaskControl;
use crate::index::document::seek_query;
use crate::index::field::{FieldInfo, FieldKind, IndexedValue};
use crate::index::partition::{Partition, PartitionSet, Query};
use crate::index::terms::MergedTerms;
use crate::types::{DocId, IndexError, PropId, PropValue, Result};

use super::collector::DuplicateCheckingCollector;

type PackedPoint = SmallVec<[u8; 16]>;

/// Counters describing the most recent verification call.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct VerifyStats {
    /// User-visible fields enumerated.
    pub fields_scanned: u64,
    /// Indexed values whose candidates were checked against the property store.
    pub values_checked: u64,
    /// Candidate documents whose authoritative value was fetched.
    pub candidates_resolved: u64,
}

/// Verifies that no two entities share a value for a uniqueness-constrained key.
///
/// The verifier runs the same algorithm over one partition or many: discrete
/// fields are enumerated as the merged union of all partitions, and every
/// candidate value is searched in every partition before it is declared clean.
/// The first confirmed duplicate aborts the call with
/// [`IndexError::ConstraintViolation`].
pub struct UniquenessVerifier<'p, P> {
    partitions: &'p PartitionSet<P>,
    control: TaskControl,
    stats: VerifyStats,
}

impl<'p, P: Partition> UniquenessVerifier<'p, P> {
    /// Creates a verifier over `partitions`.
    pub fn new(partitions: &'p PartitionSet<P>) -> Self {
        Self {
            partitions,
            control: TaskControl::new(),
            stats: VerifyStats::default(),
        }
    }

    /// Polls `control` between values; a cancelled scan fails with `Cancelled`.
    pub fn with_control(mut self, control: TaskControl) -> Self {
        self.control = control;
        self
    }

    /// Counters of the last `verify*` call, complete or not.
    pub fn stats(&self) -> VerifyStats {
        self.stats
    }

    /// Scans every value in the index.
    pub fn verify<A: PropertyAccessor + ?Sized>(&mut self, accessor: &A, prop: PropId) -> Result<()> {
        self.stats = VerifyStats::default();
        debug!(
            partitions = self.partitions.len(),
            prop = prop.0,
            "index.verify.started"
        );
        let mut collector = DuplicateCheckingCollector::new(accessor, prop);
        let result = self.scan_fields(&mut collector);
        self.stats.candidates_resolved = collector.candidates_resolved();
        self.finish(prop, "full", result)
    }

    /// Checks only `values`, typically the ones touched by a recent write.
    pub fn verify_values<A: PropertyAccessor + ?Sized>(
        &mut self,
        accessor: &A,
        prop: PropId,
        values: &[PropValue],
    ) -> Result<()> {
        self.stats = VerifyStats::default();
        debug!(
            partitions = self.partitions.len(),
            prop = prop.0,
            values = values.len(),
            "index.verify.started"
        );
        let mut collector = DuplicateCheckingCollector::new(accessor, prop);
        let result = self.scan_values(&mut collector, values);
        self.stats.candidates_resolved = collector.candidates_resolved();
        self.finish(prop, "targeted", result)
    }

    fn scan_fields<A: PropertyAccessor + ?Sized>(
        &mut self,
        collector: &mut DuplicateCheckingCollector<'_, A>,
    ) -> Result<()> {
        for field in self.partitions.indexed_fields()? {
            self.check_cancelled()?;
            self.stats.fields_scanned += 1;
            match field.kind {
                FieldKind::Discrete => self.scan_terms(&field, collector)?,
                FieldKind::Point { .. } => self.scan_points(&field, collector)?,
            }
        }
        Ok(())
    }

    fn scan_values<A: PropertyAccessor + ?Sized>(
        &mut self,
        collector: &mut DuplicateCheckingCollector<'_, A>,
        values: &[PropValue],
    ) -> Result<()> {
        for value in values {
            self.check_cancelled()?;
            let query = seek_query(value)?;
            self.search_for_duplicates(&query, collector)?;
        }
        Ok(())
    }

    fn scan_terms<A: PropertyAccessor + ?Sized>(
        &mut self,
        field: &FieldInfo,
        collector: &mut DuplicateCheckingCollector<'_, A>,
    ) -> Result<()> {
        let partitions = self.partitions;
        let mut terms = MergedTerms::open(partitions.as_slice(), &field.name)?;
        while let Some(entry) = terms.next_term()? {
            self.check_cancelled()?;
            if entry.doc_freq <= 1 {
                continue;
            }
            let query = Query::exact(field.name.as_str(), IndexedValue::Discrete(entry.term));
            self.search_for_duplicates(&query, collector)?;
        }
        Ok(())
    }

    /// Points are captured from every partition and sorted before equal neighbours
    /// are compared, since a range intersection is not globally ordered.
    ///
    /// The capture holds every point of the field at once, so memory grows with
    /// the field's document count rather than with one value's candidates.
    fn scan_points<A: PropertyAccessor + ?Sized>(
        &mut self,
        field: &FieldInfo,
        collector: &mut DuplicateCheckingCollector<'_, A>,
    ) -> Result<()> {
        let packed_len = field.kind.packed_len();
        let set = self.partitions;
        let partitions = set.as_slice();
        let control = &self.control;
        let mut captured: Vec<(PackedPoint, usize, DocId)> = Vec::new();
        for (idx, partition) in partitions.iter().enumerate() {
            partition.intersect_points(&field.name, &mut |doc: DocId, packed: &[u8]| -> Result<()> {
                if control.is_cancelled() {
                    return Err(IndexError::Cancelled);
                }
                if Some(packed.len()) != packed_len {
                    return Err(IndexError::Corruption("packed point width mismatch"));
                }
                captured.push((PackedPoint::from_slice(packed), idx, doc));
                Ok(())
            })?;
        }
        // Stable: equal points keep partition order, then native visit order.
        captured.sort_by(|a, b| a.0.cmp(&b.0));

        let mut start = 0;
        while start < captured.len() {
            let mut end = start + 1;
            while end < captured.len() && captured[end].0 == captured[start].0 {
                end += 1;
            }
            if end - start > 1 {
                self.check_cancelled()?;
                self.stats.values_checked += 1;
                let mut scope = collector.value_scope();
                for (_, idx, doc) in &captured[start..end] {
                    let entity = partitions[*idx].resolve_entity(*doc)?;
                    scope.offer(entity)?;
                }
            }
            start = end;
        }
        Ok(())
    }

    fn search_for_duplicates<A: PropertyAccessor + ?Sized>(
        &mut self,
        query: &Query,
        collector: &mut DuplicateCheckingCollector<'_, A>,
    ) -> Result<()> {
        self.stats.values_checked += 1;
        trace!(field = %query.field, value = %query.value, "index.verify.value");
        let mut scope = collector.value_scope();
        for partition in self.partitions.iter() {
            scope.search(partition, query)?;
        }
        Ok(())
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.control.is_cancelled() {
            Err(IndexError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn finish(&self, prop: PropId, mode: &'static str, result: Result<()>) -> Result<()> {
        let stats = self.stats;
        match &result {
            Ok(()) => info!(
                mode,
                prop = prop.0,
                partitions = self.partitions.len(),
                fields_scanned = stats.fields_scanned,
                values_checked = stats.values_checked,
                candidates_resolved = stats.candidates_resolved,
                "index.verify.completed"
            ),
            Err(IndexError::ConstraintViolation(conflict)) => warn!(
                mode,
                prop = prop.0,
                entity_a = conflict.entity_a.0,
                entity_b = conflict.entity_b.0,
                value = %conflict.value,
                "index.verify.conflict"
            ),
            Err(IndexError::Cancelled) => info!(
                mode,
                prop = prop.0,
                values_checked = stats.values_checked,
                "index.verify.cancelled"
            ),
            Err(err) => warn!(mode, prop = prop.0, error = %err, "index.verify.failed"),
        }
        result
    }
}
