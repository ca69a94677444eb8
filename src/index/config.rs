//! Caller-supplied configuration: sampling limits and uniqueness constraints.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::index::memory::DEFAULT_LEAF_SIZE;
use crate::types::{IndexError, PropId};

/// Default byte budget of retained sample values per subsampling step.
pub const DEFAULT_SAMPLE_SIZE_LIMIT: usize = 8 * 1024 * 1024;

/// How an index is sampled.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingMode {
    /// Scan every value through the subsampling accumulator.
    #[default]
    NonUnique,
    /// Every document holds a distinct value; only the document count is read.
    Unique,
}

/// Selectivity sampling settings.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Upper bound, in bytes, on distinct values retained per subsampling step.
    pub sample_size_limit: usize,
    /// Sampling mode.
    pub mode: SamplingMode,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            sample_size_limit: DEFAULT_SAMPLE_SIZE_LIMIT,
            mode: SamplingMode::NonUnique,
        }
    }
}

/// A property key under a uniqueness constraint.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct UniqueConstraint {
    /// Human-readable property name.
    pub property: String,
    /// Property key identifier used with the property store.
    pub prop_id: u32,
}

impl UniqueConstraint {
    /// The constrained key as a [`PropId`].
    pub fn prop(&self) -> PropId {
        PropId(self.prop_id)
    }
}

/// Configuration of one schema index, as read from a TOML file.
///
/// ```toml
/// partitions = 4
///
/// [sampling]
/// sample_size_limit = 1048576
/// mode = "non_unique"
///
/// [[constraints]]
/// property = "email"
/// prop_id = 1
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaIndexConfig {
    /// Sampling settings.
    pub sampling: SamplingConfig,
    /// Uniqueness constraints enforced by verification.
    pub constraints: Vec<UniqueConstraint>,
    /// Number of partitions a loaded snapshot is spread over.
    pub partitions: usize,
    /// Points per leaf of the in-memory point tree.
    pub leaf_size: usize,
}

impl Default for SchemaIndexConfig {
    fn default() -> Self {
        Self {
            sampling: SamplingConfig::default(),
            constraints: Vec::new(),
            partitions: 1,
            leaf_size: DEFAULT_LEAF_SIZE,
        }
    }
}

impl SchemaIndexConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: None,
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses, and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: Some(path.to_path_buf()),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects zero limits and sizes.
    pub fn validate(&self) -> crate::types::Result<()> {
        if self.sampling.sample_size_limit == 0 {
            return Err(IndexError::Invalid("sample_size_limit must be positive"));
        }
        if self.partitions == 0 {
            return Err(IndexError::Invalid("partitions must be positive"));
        }
        if self.leaf_size == 0 {
            return Err(IndexError::Invalid("leaf_size must be positive"));
        }
        Ok(())
    }

    /// Looks up a constraint by property name.
    pub fn constraint(&self, property: &str) -> Option<&UniqueConstraint> {
        self.constraints.iter().find(|c| c.property == property)
    }
}

/// Failure to obtain a usable [`SchemaIndexConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read index config {path}: {source}")]
    Read {
        /// File that was read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The document is not valid TOML for this schema.
    #[error("failed to parse index config: {source}")]
    Parse {
        /// File that was parsed, if any.
        path: Option<PathBuf>,
        /// Underlying TOML error.
        source: toml::de::Error,
    },
    /// The configuration parsed but holds unusable values.
    #[error(transparent)]
    Invalid(#[from] IndexError),
}
