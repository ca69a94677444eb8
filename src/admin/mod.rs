#![forbid(unsafe_code)]

//! Administrative entry points for schema-index maintenance.
//!
//! These wrap the verifier and the sampler into serializable reports and load
//! index snapshots from CSV for offline inspection.

mod error;
mod load;
mod sample;
mod verify;

/// Error types for administrative operations.
pub use error::{AdminError, Result};

/// Snapshot loading from CSV files.
///
/// Rebuilds a property store and a partitioned in-memory index from `entity,value[,type]` rows.
pub use load::{load_csv, load_csv_reader, parse_value, IndexSnapshot};

/// Selectivity sampling report.
pub use sample::{sample_index, SampleIndexReport};

/// Uniqueness verification report.
///
/// A duplicate is reported as a finding rather than raised.
pub use verify::{verify_index, ConflictReport, VerifyIndexReport, VerifyScope};
