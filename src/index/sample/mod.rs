//! Approximate selectivity sampling.

mod accumulator;
mod sampler;

pub use accumulator::{CardinalityAccumulator, IndexSample, NonUniqueSampler};
pub use sampler::SelectivitySampler;
