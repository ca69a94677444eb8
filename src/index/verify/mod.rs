//! Uniqueness verification over one or many partitions.

mod collector;
mod verifier;

pub use collector::{DuplicateCheckingCollector, ValueScope};
pub use verifier::{UniquenessVerifier, VerifyStats};
