use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Approximate distinct-value statistics of an index.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct IndexSample {
    /// Estimated number of distinct values.
    pub unique_values: u64,
    /// Number of value occurrences the estimate is based on.
    pub sample_size: u64,
    /// Total documents in the index.
    pub index_size: u64,
}

impl IndexSample {
    /// Builds a sample, clamping so that `unique_values <= sample_size <= index_size`.
    pub fn new(index_size: u64, unique_values: u64, sample_size: u64) -> Self {
        let sample_size = sample_size.min(index_size);
        Self {
            unique_values: unique_values.min(sample_size),
            sample_size,
            index_size,
        }
    }

    /// Distinct values per sampled occurrence, `1.0` for an empty sample.
    pub fn selectivity(&self) -> f64 {
        if self.sample_size == 0 {
            1.0
        } else {
            self.unique_values as f64 / self.sample_size as f64
        }
    }
}

/// Online approximate-cardinality estimator fed by the selectivity sampler.
pub trait CardinalityAccumulator {
    /// Records `frequency` occurrences of `value`.
    fn include(&mut self, value: &[u8], frequency: u64);

    /// Withdraws occurrences previously recorded in the current step.
    fn exclude(&mut self, value: &[u8], frequency: u64);

    /// Finalizes the estimate for an index holding `index_size` documents.
    fn result(&mut self, index_size: u64) -> IndexSample;
}

/// Multiset accumulator that subsamples in steps once its retained values reach a
/// byte budget.
///
/// Each step counts its distinct values and occurrences before the multiset is
/// cleared; the final estimate averages over all steps.
#[derive(Debug)]
pub struct NonUniqueSampler {
    limit: usize,
    values: FxHashMap<Vec<u8>, u64>,
    sample_size: usize,
    steps: u64,
    acc_unique: u64,
    acc_size: u64,
}

impl NonUniqueSampler {
    /// Creates an accumulator retaining at most about `limit` bytes of values per step.
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            values: FxHashMap::default(),
            sample_size: 0,
            steps: 0,
            acc_unique: 0,
            acc_size: 0,
        }
    }

    /// Completed subsampling steps.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    fn next_step(&mut self) {
        self.acc_unique += self.values.len() as u64;
        self.acc_size = self.acc_size.saturating_add(self.values.values().sum::<u64>());
        self.values.clear();
        self.sample_size = 0;
        self.steps += 1;
    }
}

impl CardinalityAccumulator for NonUniqueSampler {
    fn include(&mut self, value: &[u8], frequency: u64) {
        if frequency == 0 {
            return;
        }
        if self.sample_size >= self.limit {
            self.next_step();
        }
        match self.values.get_mut(value) {
            Some(count) => *count = count.saturating_add(frequency),
            None => {
                self.values.insert(value.to_vec(), frequency);
                self.sample_size += value.len();
            }
        }
    }

    fn exclude(&mut self, value: &[u8], frequency: u64) {
        let Some(count) = self.values.get_mut(value) else {
            return;
        };
        if *count > frequency {
            *count -= frequency;
        } else {
            self.values.remove(value);
            self.sample_size = self.sample_size.saturating_sub(value.len());
        }
    }

    fn result(&mut self, index_size: u64) -> IndexSample {
        if !self.values.is_empty() {
            self.next_step();
        }
        if self.steps == 0 {
            return IndexSample::new(index_size, 0, 0);
        }
        IndexSample::new(
            index_size,
            self.acc_unique / self.steps,
            self.acc_size / self.steps,
        )
    }
}
