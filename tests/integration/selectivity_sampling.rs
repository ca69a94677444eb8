#![allow(missing_docs)]

use std::thread;

use sombra_schema_index::{
    admin::{load_csv_reader, sample_index},
    index::{
        partition_round_robin, CardinalityAccumulator, IndexSample, MemoryPartition,
        NonUniqueSampler, PartitionSet, SamplingConfig, SamplingMode, SelectivitySampler,
        TaskControl,
    },
    types::{EntityId, IndexError, PropId, PropValue},
};

fn set(values: &[PropValue], partitions: usize) -> PartitionSet<MemoryPartition> {
    let parts = partition_round_robin(
        values
            .iter()
            .enumerate()
            .map(|(idx, value)| (EntityId(idx as u64), value)),
        partitions,
        16,
    )
    .expect("partition");
    PartitionSet::new(parts)
}

fn low_cardinality(n: usize) -> Vec<PropValue> {
    (0..n).map(|i| PropValue::from(format!("v{}", i % 10))).collect()
}

#[test]
fn low_cardinality_index_has_low_selectivity() {
    let values = low_cardinality(1000);
    let sample = SelectivitySampler::new(&set(&values, 3), SamplingConfig::default())
        .sample()
        .expect("sample");
    assert_eq!(sample, IndexSample::new(1000, 10, 1000));
    assert!((sample.selectivity() - 0.01).abs() < 1e-9);
}

#[test]
fn small_budget_still_bounds_the_estimate() {
    let values: Vec<PropValue> = (0..500).map(|i| PropValue::Int(i % 50)).collect();
    let config = SamplingConfig {
        sample_size_limit: 16,
        mode: SamplingMode::NonUnique,
    };
    let sample = SelectivitySampler::new(&set(&values, 2), config)
        .sample()
        .expect("sample");
    assert_eq!(sample.index_size, 500);
    assert!(sample.unique_values > 0);
    assert!(sample.unique_values <= sample.sample_size);
    assert!(sample.sample_size <= sample.index_size);
}

#[test]
fn mixed_fields_are_all_sampled() {
    let values = vec![
        PropValue::from("a"),
        PropValue::Bool(true),
        PropValue::Bool(true),
        PropValue::Int(3),
        PropValue::Array(vec![PropValue::from("a")]),
    ];
    let sample = SelectivitySampler::new(&set(&values, 2), SamplingConfig::default())
        .sample()
        .expect("sample");
    assert_eq!(sample, IndexSample::new(5, 4, 5));
}

#[test]
fn empty_index_samples_to_zero() {
    let sample = SelectivitySampler::new(&set(&[], 2), SamplingConfig::default())
        .sample()
        .expect("sample");
    assert_eq!(sample, IndexSample::default());
    assert_eq!(sample.selectivity(), 1.0);
}

#[test]
fn cancellation_from_another_thread_yields_partial_sample() {
    let values = low_cardinality(200);
    let set = set(&values, 2);
    let control = TaskControl::new();
    let remote = control.clone();
    thread::spawn(move || remote.cancel()).join().expect("cancel thread");
    let mut sampler = SelectivitySampler::new(&set, SamplingConfig::default()).with_control(control);
    let sample = sampler.sample().expect("partial sample");
    assert!(sampler.was_cancelled());
    assert_eq!(sample.index_size, 200);
    assert!(sample.unique_values <= sample.sample_size);
}

#[test]
fn unavailable_partition_surfaces() {
    let set = set(&low_cardinality(4), 2);
    set.as_slice()[0].set_online(false);
    let err = SelectivitySampler::new(&set, SamplingConfig::default())
        .sample()
        .unwrap_err();
    assert!(matches!(err, IndexError::IndexUnavailable(_)));
}

struct CountingAccumulator {
    observations: u64,
}

impl CardinalityAccumulator for CountingAccumulator {
    fn include(&mut self, _value: &[u8], frequency: u64) {
        self.observations += frequency;
    }

    fn exclude(&mut self, _value: &[u8], frequency: u64) {
        self.observations -= frequency;
    }

    fn result(&mut self, index_size: u64) -> IndexSample {
        IndexSample::new(index_size, 1, self.observations)
    }
}

#[test]
fn accumulator_is_pluggable() {
    let values = low_cardinality(30);
    let set = set(&values, 3);
    let mut accumulator = CountingAccumulator { observations: 0 };
    let sample = SelectivitySampler::new(&set, SamplingConfig::default())
        .sample_with(&mut accumulator)
        .expect("sample");
    assert_eq!(sample, IndexSample::new(30, 1, 30));
}

#[test]
fn incremental_exclude_matches_fresh_sample() {
    let mut incremental = NonUniqueSampler::new(1024);
    incremental.include(b"a", 1);
    incremental.include(b"b", 1);
    incremental.include(b"c", 1);
    incremental.exclude(b"c", 1);
    let mut fresh = NonUniqueSampler::new(1024);
    fresh.include(b"a", 1);
    fresh.include(b"b", 1);
    assert_eq!(incremental.result(2), fresh.result(2));
}

#[test]
fn admin_report_carries_selectivity() {
    let snapshot = load_csv_reader(
        "entity,value,type\n1,1,int\n2,1,int\n3,2,int\n4,x,\n".as_bytes(),
        PropId(1),
        2,
        8,
    )
    .expect("snapshot");
    let report = sample_index(&snapshot.partitions, &SamplingConfig::default(), None)
        .expect("report");
    assert_eq!(report.index_size, 4);
    assert_eq!(report.unique_values, 3);
    assert_eq!(report.sample_size, 4);
    assert!(!report.cancelled);
}
