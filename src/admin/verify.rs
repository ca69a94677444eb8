use std::time::Instant;

use serde::Serialize;
use tracing::info;

use crate::admin::Result;
use crate::index::{Partition, PartitionSet, PropertyAccessor, TaskControl, UniquenessVerifier};
use crate::types::{ConflictRecord, IndexError, PropId, PropValue};

/// Which values a verification run inspects.
#[derive(Clone, Debug, Default)]
pub enum VerifyScope {
    /// Every value in the index.
    #[default]
    Full,
    /// Only the listed values.
    Values(Vec<PropValue>),
}

/// A confirmed duplicate in report form.
#[derive(Clone, Debug, Serialize)]
pub struct ConflictReport {
    /// The shared value.
    pub value: PropValue,
    /// Entity observed first.
    pub entity_a: u64,
    /// Entity that collided with `entity_a`.
    pub entity_b: u64,
    /// Human-readable description.
    pub message: String,
}

impl From<&ConflictRecord> for ConflictReport {
    fn from(record: &ConflictRecord) -> Self {
        Self {
            value: record.value.clone(),
            entity_a: record.entity_a.0,
            entity_b: record.entity_b.0,
            message: record.to_string(),
        }
    }
}

/// Outcome of a uniqueness verification run.
#[derive(Clone, Debug, Serialize)]
pub struct VerifyIndexReport {
    /// Whether no duplicate was found.
    pub success: bool,
    /// Partitions inspected.
    pub partitions: usize,
    /// Fields enumerated by a full scan.
    pub fields_scanned: u64,
    /// Values whose candidates were checked.
    pub values_checked: u64,
    /// First duplicate found, if any.
    pub conflict: Option<ConflictReport>,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: f64,
}

/// Verifies that `prop` holds unique values across `partitions`.
///
/// A constraint violation is reported through [`VerifyIndexReport::conflict`];
/// every other failure, cancellation included, is returned as an error.
pub fn verify_index<P, A>(
    partitions: &PartitionSet<P>,
    accessor: &A,
    prop: PropId,
    scope: &VerifyScope,
    control: Option<TaskControl>,
) -> Result<VerifyIndexReport>
where
    P: Partition,
    A: PropertyAccessor + ?Sized,
{
    let start = Instant::now();
    let mut verifier = UniquenessVerifier::new(partitions);
    if let Some(control) = control {
        verifier = verifier.with_control(control);
    }
    let outcome = match scope {
        VerifyScope::Full => verifier.verify(accessor, prop),
        VerifyScope::Values(values) => verifier.verify_values(accessor, prop, values),
    };
    let conflict = match outcome {
        Ok(()) => None,
        Err(IndexError::ConstraintViolation(record)) => Some(ConflictReport::from(&*record)),
        Err(err) => return Err(err.into()),
    };
    let stats = verifier.stats();
    let report = VerifyIndexReport {
        success: conflict.is_none(),
        partitions: partitions.len(),
        fields_scanned: stats.fields_scanned,
        values_checked: stats.values_checked,
        conflict,
        duration_ms: start.elapsed().as_secs_f64() * 1000.0,
    };
    info!(
        success = report.success,
        partitions = report.partitions,
        duration_ms = report.duration_ms,
        "admin.verify_index.completed"
    );
    Ok(report)
}
