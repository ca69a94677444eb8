#![forbid(unsafe_code)]

//! Schema-index verification and sampling over partitioned inverted indexes.

pub mod accessor;
pub mod config;
pub mod control;
pub mod document;
pub mod field;
pub mod memory;
pub mod partition;
pub mod sample;
pub mod terms;
pub mod verify;

pub use accessor::{MemoryPropertyStore, PropertyAccessor};
pub use config::{ConfigError, SamplingConfig, SamplingMode, SchemaIndexConfig, UniqueConstraint};
pub use control::TaskControl;
pub use field::{FieldInfo, FieldKind, IndexedValue};
pub use memory::{partition_round_robin, MemoryPartition};
pub use partition::{Collector, Partition, PartitionSet, PointVisitor, Query, TermCursor, TermEntry};
pub use sample::{CardinalityAccumulator, IndexSample, NonUniqueSampler, SelectivitySampler};
pub use terms::MergedTerms;
pub use verify::{DuplicateCheckingCollector, UniquenessVerifier, ValueScope, VerifyStats};
