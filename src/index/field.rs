use std::fmt;

/// How an indexed field encodes its values.
///
/// Verification and sampling dispatch on this tag instead of probing the
/// partition for point metadata.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum FieldKind {
    /// Opaque term with a posting list (strings, booleans, arrays).
    Discrete,
    /// Fixed-width packed tuple whose byte order matches value order.
    Point {
        /// Number of dimensions in the packed tuple.
        dimensions: u32,
        /// Width of each dimension in bytes.
        bytes_per_dimension: u32,
    },
}

impl FieldKind {
    /// One-dimensional eight-byte point, the layout used for numbers.
    pub const NUMBER: FieldKind = FieldKind::Point {
        dimensions: 1,
        bytes_per_dimension: 8,
    };

    /// Total packed width for point fields, `None` for discrete fields.
    pub fn packed_len(&self) -> Option<usize> {
        match self {
            FieldKind::Discrete => None,
            FieldKind::Point {
                dimensions,
                bytes_per_dimension,
            } => Some(*dimensions as usize * *bytes_per_dimension as usize),
        }
    }

    /// Validates point geometry. Zero-width points are rejected.
    pub fn is_valid(&self) -> bool {
        self.packed_len() != Some(0)
    }
}

/// Indexed field as advertised by a partition.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct FieldInfo {
    /// Field name.
    pub name: String,
    /// Value encoding of the field.
    pub kind: FieldKind,
}

impl FieldInfo {
    /// Describes a discrete field.
    pub fn discrete(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Discrete,
        }
    }

    /// Describes a point field.
    pub fn point(name: impl Into<String>, dimensions: u32, bytes_per_dimension: u32) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Point {
                dimensions,
                bytes_per_dimension,
            },
        }
    }
}

/// Index encoding of a property value.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum IndexedValue {
    /// Opaque term bytes.
    Discrete(Vec<u8>),
    /// Packed point bytes, `dimensions * bytes_per_dimension` long.
    Point(Vec<u8>),
}

impl IndexedValue {
    /// Raw encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            IndexedValue::Discrete(bytes) | IndexedValue::Point(bytes) => bytes,
        }
    }

    /// Returns `true` when this value can live in a field of `kind`.
    pub fn fits(&self, kind: &FieldKind) -> bool {
        match (self, kind) {
            (IndexedValue::Discrete(_), FieldKind::Discrete) => true,
            (IndexedValue::Point(bytes), FieldKind::Point { .. }) => {
                kind.packed_len() == Some(bytes.len())
            }
            _ => false,
        }
    }
}

impl fmt::Display for IndexedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexedValue::Discrete(bytes) => write!(f, "{}", String::from_utf8_lossy(bytes)),
            IndexedValue::Point(bytes) => {
                write!(f, "point(")?;
                for byte in bytes {
                    write!(f, "{byte:02x}")?;
                }
                write!(f, ")")
            }
        }
    }
}
