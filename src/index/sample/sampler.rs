use tracing::{debug, info};

use crate::index::config::{SamplingConfig, SamplingMode};
use crate::index::control::TaskControl;
use crate::index::document::{decode_f64, dimension, ENTITY_ID_FIELD};
use crate::index::field::{FieldInfo, FieldKind};
use crate::index::partition::{Partition, PartitionSet};
use crate::types::{DocId, IndexError, Result};

use super::accumulator::{CardinalityAccumulator, IndexSample, NonUniqueSampler};

/// Produces an approximate selectivity statistic for a schema index.
///
/// Values are streamed from every partition into a [`CardinalityAccumulator`]; no
/// value is confirmed against the property store. Cancellation is cooperative and
/// yields the estimate built so far.
pub struct SelectivitySampler<'p, P> {
    partitions: &'p PartitionSet<P>,
    config: SamplingConfig,
    control: TaskControl,
    cancelled: bool,
}

impl<'p, P: Partition> SelectivitySampler<'p, P> {
    /// Creates a sampler over `partitions`.
    pub fn new(partitions: &'p PartitionSet<P>, config: SamplingConfig) -> Self {
        Self {
            partitions,
            config,
            control: TaskControl::new(),
            cancelled: false,
        }
    }

    /// Polls `control` between values.
    pub fn with_control(mut self, control: TaskControl) -> Self {
        self.control = control;
        self
    }

    /// Whether the last run stopped early.
    pub fn was_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Samples the index according to the configured mode.
    pub fn sample(&mut self) -> Result<IndexSample> {
        match self.config.mode {
            SamplingMode::Unique => {
                self.cancelled = false;
                let size = self.partitions.document_count()?;
                let sample = IndexSample::new(size, size, size);
                self.log_completed("unique", &sample);
                Ok(sample)
            }
            SamplingMode::NonUnique => {
                let mut accumulator = NonUniqueSampler::new(self.config.sample_size_limit);
                self.sample_with(&mut accumulator)
            }
        }
    }

    /// Streams every value into `accumulator` and finalizes it with the total
    /// document count.
    pub fn sample_with<C>(&mut self, accumulator: &mut C) -> Result<IndexSample>
    where
        C: CardinalityAccumulator + ?Sized,
    {
        self.cancelled = false;
        match self.feed(accumulator) {
            Ok(()) => {}
            Err(IndexError::Cancelled) => self.cancelled = true,
            Err(err) => return Err(err),
        }
        let sample = accumulator.result(self.partitions.document_count()?);
        if self.cancelled {
            info!(
                partitions = self.partitions.len(),
                index_size = sample.index_size,
                sample_size = sample.sample_size,
                unique_values = sample.unique_values,
                "index.sample.cancelled"
            );
        } else {
            self.log_completed("non_unique", &sample);
        }
        Ok(sample)
    }

    fn feed<C>(&self, accumulator: &mut C) -> Result<()>
    where
        C: CardinalityAccumulator + ?Sized,
    {
        for (idx, partition) in self.partitions.iter().enumerate() {
            for field in partition.fields()? {
                if field.name == ENTITY_ID_FIELD {
                    continue;
                }
                self.check_cancelled()?;
                debug!(partition = idx, field = %field.name, "index.sample.field");
                match field.kind {
                    FieldKind::Discrete => self.feed_terms(partition, &field, accumulator)?,
                    FieldKind::Point { .. } => self.feed_points(partition, &field, accumulator)?,
                }
            }
        }
        Ok(())
    }

    fn feed_terms<C>(&self, partition: &P, field: &FieldInfo, accumulator: &mut C) -> Result<()>
    where
        C: CardinalityAccumulator + ?Sized,
    {
        let mut terms = partition.terms(&field.name)?;
        while let Some(entry) = terms.next_term()? {
            accumulator.include(&entry.term, entry.doc_freq);
            self.check_cancelled()?;
        }
        Ok(())
    }

    fn feed_points<C>(&self, partition: &P, field: &FieldInfo, accumulator: &mut C) -> Result<()>
    where
        C: CardinalityAccumulator + ?Sized,
    {
        let kind = field.kind;
        let control = &self.control;
        partition.intersect_points(&field.name, &mut |_doc: DocId, packed: &[u8]| -> Result<()> {
            match decimal_point(packed, &kind) {
                Some(text) => accumulator.include(text.as_bytes(), 1),
                None => accumulator.include(packed, 1),
            }
            if control.is_cancelled() {
                return Err(IndexError::Cancelled);
            }
            Ok(())
        })
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.control.is_cancelled() {
            Err(IndexError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn log_completed(&self, mode: &'static str, sample: &IndexSample) {
        info!(
            mode,
            partitions = self.partitions.len(),
            index_size = sample.index_size,
            sample_size = sample.sample_size,
            unique_values = sample.unique_values,
            "index.sample.completed"
        );
    }
}

/// Renders an eight-byte-per-dimension point as comma-separated decimals.
fn decimal_point(packed: &[u8], kind: &FieldKind) -> Option<String> {
    let FieldKind::Point {
        dimensions,
        bytes_per_dimension: 8,
    } = *kind
    else {
        return None;
    };
    let mut text = String::new();
    for dim in 0..dimensions {
        let number = decode_f64(dimension(packed, kind, dim)?)?;
        if dim > 0 {
            text.push(',');
        }
        text.push_str(&number.to_string());
    }
    Some(text)
}
