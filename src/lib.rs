//! Uniqueness verification and selectivity sampling for the schema indexes of
//! a property graph database.
//!
//! A schema index is spread over one or more [`index::Partition`]s. The
//! [`index::UniquenessVerifier`] proves that no two entities share a value for a
//! constrained property, confirming every candidate against the authoritative
//! [`index::PropertyAccessor`]. The [`index::SelectivitySampler`] estimates the
//! distinct-value density a query planner needs.

#![warn(missing_docs)]

pub mod admin;
pub mod index;
pub mod types;
