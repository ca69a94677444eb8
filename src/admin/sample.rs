use std::time::Instant;

use serde::Serialize;
use tracing::info;

use crate::admin::Result;
use crate::index::{Partition, PartitionSet, SamplingConfig, SelectivitySampler, TaskControl};

/// Outcome of a selectivity sampling run.
#[derive(Clone, Debug, Serialize)]
pub struct SampleIndexReport {
    /// Total documents in the index.
    pub index_size: u64,
    /// Value occurrences the estimate is based on.
    pub sample_size: u64,
    /// Estimated distinct values.
    pub unique_values: u64,
    /// `unique_values / sample_size`, `1.0` for an empty sample.
    pub selectivity: f64,
    /// Whether sampling stopped early and the figures are partial.
    pub cancelled: bool,
    /// Partitions inspected.
    pub partitions: usize,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: f64,
}

/// Samples the selectivity of the index spread over `partitions`.
pub fn sample_index<P: Partition>(
    partitions: &PartitionSet<P>,
    config: &SamplingConfig,
    control: Option<TaskControl>,
) -> Result<SampleIndexReport> {
    let start = Instant::now();
    let mut sampler = SelectivitySampler::new(partitions, config.clone());
    if let Some(control) = control {
        sampler = sampler.with_control(control);
    }
    let sample = sampler.sample()?;
    let report = SampleIndexReport {
        index_size: sample.index_size,
        sample_size: sample.sample_size,
        unique_values: sample.unique_values,
        selectivity: sample.selectivity(),
        cancelled: sampler.was_cancelled(),
        partitions: partitions.len(),
        duration_ms: start.elapsed().as_secs_f64() * 1000.0,
    };
    info!(
        cancelled = report.cancelled,
        selectivity = report.selectivity,
        duration_ms = report.duration_ms,
        "admin.sample_index.completed"
    );
    Ok(report)
}
