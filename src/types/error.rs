use std::fmt;

use serde::Serialize;

use super::{EntityId, PropValue};

/// Two distinct entities proven to share an authoritative value for a
/// uniqueness-constrained property key.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ConflictRecord {
    /// The shared authoritative value.
    pub value: PropValue,
    /// Entity observed first for the value.
    pub entity_a: EntityId,
    /// Entity whose value collided with `entity_a`.
    pub entity_b: EntityId,
}

impl fmt::Display for ConflictRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "both entity {} and entity {} share the property value {}",
            self.entity_a, self.entity_b, self.value
        )
    }
}

/// Failures collected while closing every partition of an index.
#[derive(Debug, Default)]
pub struct CloseErrors(pub Vec<IndexError>);

impl fmt::Display for CloseErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} partition(s) failed to close", self.0.len())?;
        for err in &self.0 {
            write!(f, "; {err}")?;
        }
        Ok(())
    }
}

/// Error type for schema index verification and sampling.
#[derive(thiserror::Error, Debug)]
pub enum IndexError {
    /// I/O fault while reading a partition.
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    /// The index, or one of its partitions, cannot be queried.
    #[error("index unavailable: {0}")]
    IndexUnavailable(String),
    /// A confirmed duplicate under a uniqueness constraint.
    #[error("constraint violation: {0}")]
    ConstraintViolation(Box<ConflictRecord>),
    /// One or more partitions failed to close.
    #[error("close failed: {0}")]
    Close(CloseErrors),
    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,
    /// Index contents violate a structural invariant.
    #[error("corruption: {0}")]
    Corruption(&'static str),
    /// Caller supplied an argument the index cannot handle.
    #[error("invalid argument: {0}")]
    Invalid(&'static str),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, IndexError>;

impl IndexError {
    pub(crate) fn conflict(value: PropValue, entity_a: EntityId, entity_b: EntityId) -> Self {
        IndexError::ConstraintViolation(Box::new(ConflictRecord {
            value,
            entity_a,
            entity_b,
        }))
    }

    /// Returns the conflict carried by this error, if any.
    pub fn as_conflict(&self) -> Option<&ConflictRecord> {
        match self {
            IndexError::ConstraintViolation(conflict) => Some(conflict),
            _ => None,
        }
    }

    /// Re-raises a constraint violation that a storage engine wrapped into an
    /// I/O error while unwinding out of a search callback.
    pub fn unwrap_conflict(self) -> IndexError {
        match self {
            IndexError::Io(err) => {
                let wrapped = err
                    .get_ref()
                    .and_then(|inner| inner.downcast_ref::<IndexError>())
                    .and_then(IndexError::as_conflict)
                    .cloned();
                match wrapped {
                    Some(conflict) => IndexError::ConstraintViolation(Box::new(conflict)),
                    None => IndexError::Io(err),
                }
            }
            other => other,
        }
    }
}
