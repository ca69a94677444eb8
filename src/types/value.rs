use std::fmt;

use serde::Serialize;

/// Authoritative property value as held by the property store.
///
/// Equality follows value semantics rather than representation: an `Int` and a
/// `Float` denoting the same number are equal, and `NaN` equals nothing.
#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum PropValue {
    /// Null value. Never indexed.
    Null,
    /// Boolean value.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit floating point number.
    Float(f64),
    /// Owned string.
    Str(String),
    /// Owned byte vector.
    Bytes(Vec<u8>),
    /// Homogeneous or mixed array of values.
    Array(Vec<PropValue>),
}

impl PropValue {
    /// Returns `true` for [`PropValue::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, PropValue::Null)
    }

    /// Returns `true` when the value indexes as an ordered numeric point.
    pub fn is_number(&self) -> bool {
        matches!(self, PropValue::Int(_) | PropValue::Float(_))
    }

    /// Numeric view used by the point encoding. Integers beyond 2^53 lose precision.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropValue::Int(v) => Some(*v as f64),
            PropValue::Float(v) => Some(*v),
            _ => None,
        }
    }
}

fn int_float_eq(int: i64, float: f64) -> bool {
    // 2^63 is exactly representable; anything at or above it cannot be an i64.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    float.fract() == 0.0 && (-LIMIT..LIMIT).contains(&float) && float as i64 == int
}

impl PartialEq for PropValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PropValue::Null, PropValue::Null) => true,
            (PropValue::Bool(a), PropValue::Bool(b)) => a == b,
            (PropValue::Int(a), PropValue::Int(b)) => a == b,
            (PropValue::Float(a), PropValue::Float(b)) => a == b,
            (PropValue::Int(a), PropValue::Float(b)) | (PropValue::Float(b), PropValue::Int(a)) => {
                int_float_eq(*a, *b)
            }
            (PropValue::Str(a), PropValue::Str(b)) => a == b,
            (PropValue::Bytes(a), PropValue::Bytes(b)) => a == b,
            (PropValue::Array(a), PropValue::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x == y)
            }
            _ => false,
        }
    }
}

impl fmt::Display for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Null => write!(f, "null"),
            PropValue::Bool(v) => write!(f, "{v}"),
            PropValue::Int(v) => write!(f, "{v}"),
            PropValue::Float(v) => write!(f, "{v}"),
            PropValue::Str(v) => write!(f, "{v}"),
            PropValue::Bytes(v) => write!(f, "bytes(len={})", v.len()),
            PropValue::Array(items) => {
                write!(f, "[")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::Str(value.to_owned())
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        PropValue::Str(value)
    }
}

impl From<i64> for PropValue {
    fn from(value: i64) -> Self {
        PropValue::Int(value)
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        PropValue::Float(value)
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        PropValue::Bool(value)
    }
}
