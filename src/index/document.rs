//! Document structure of the schema index.
//!
//! Every indexed document carries the reserved [`ENTITY_ID_FIELD`] plus exactly one
//! value field chosen by the value's type:
//!
//! | value | field | encoding |
//! |---|---|---|
//! | `Int`, `Float` | [`NUMBER_FIELD`] | 1-D, 8-byte sortable double point |
//! | `Str` | [`STRING_FIELD`] | UTF-8 term |
//! | `Bool` | [`BOOL_FIELD`] | `true` / `false` term |
//! | `Array`, `Bytes` | [`ARRAY_FIELD`] | typed textual term |
//!
//! The encodings are lossy: integers beyond 2^53 share a double, and the array term
//! does not distinguish a top-level byte string from a one-element array holding it.
//! Verification therefore never trusts an equal encoding without asking the
//! property store.

use std::fmt::Write as _;

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::types::{IndexError, PropValue, Result};

use super::field::{FieldKind, IndexedValue};
use super::partition::Query;

/// Reserved field holding the owning entity of a document.
pub const ENTITY_ID_FIELD: &str = "id";
/// Point field for numeric values.
pub const NUMBER_FIELD: &str = "number";
/// Term field for string values.
pub const STRING_FIELD: &str = "string";
/// Term field for boolean values.
pub const BOOL_FIELD: &str = "bool";
/// Term field for arrays and byte strings.
pub const ARRAY_FIELD: &str = "array";

const SIGN_BIT: u64 = 1 << 63;

/// A value ready to be written into, or looked up from, a partition.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IndexedField {
    /// Target field name.
    pub field: &'static str,
    /// Encoding of the target field.
    pub kind: FieldKind,
    /// Encoded value.
    pub value: IndexedValue,
}

/// Encodes `value` the way the index stores it.
pub fn encode_value(value: &PropValue) -> Result<IndexedField> {
    let field = match value {
        PropValue::Null => return Err(IndexError::Invalid("null values are not indexed")),
        PropValue::Int(_) | PropValue::Float(_) => {
            let number = value.as_f64().unwrap_or(f64::NAN);
            IndexedField {
                field: NUMBER_FIELD,
                kind: FieldKind::NUMBER,
                value: IndexedValue::Point(encode_f64(number).to_vec()),
            }
        }
        PropValue::Str(s) => IndexedField {
            field: STRING_FIELD,
            kind: FieldKind::Discrete,
            value: IndexedValue::Discrete(s.as_bytes().to_vec()),
        },
        PropValue::Bool(b) => IndexedField {
            field: BOOL_FIELD,
            kind: FieldKind::Discrete,
            value: IndexedValue::Discrete(if *b { b"true".to_vec() } else { b"false".to_vec() }),
        },
        PropValue::Bytes(_) | PropValue::Array(_) => {
            let mut term = String::new();
            match value {
                PropValue::Array(items) => encode_array(items, &mut term),
                other => encode_element(other, &mut term),
            }
            IndexedField {
                field: ARRAY_FIELD,
                kind: FieldKind::Discrete,
                value: IndexedValue::Discrete(term.into_bytes()),
            }
        }
    };
    Ok(field)
}

/// Builds the exact-match lookup for `value`.
pub fn seek_query(value: &PropValue) -> Result<Query> {
    let encoded = encode_value(value)?;
    Ok(Query::exact(encoded.field, encoded.value))
}

/// Order-preserving eight-byte encoding of a double.
///
/// `-0.0` folds onto `0.0` and every NaN onto the canonical NaN so that values
/// equal under [`PropValue`] semantics share an encoding.
pub fn encode_f64(value: f64) -> [u8; 8] {
    let value = if value == 0.0 {
        0.0
    } else if value.is_nan() {
        f64::NAN
    } else {
        value
    };
    let bits = value.to_bits() as i64;
    let sortable = bits ^ ((bits >> 63) & i64::MAX);
    ((sortable as u64) ^ SIGN_BIT).to_be_bytes()
}

/// Inverse of [`encode_f64`]. Returns `None` when `packed` is not eight bytes.
pub fn decode_f64(packed: &[u8]) -> Option<f64> {
    let raw: [u8; 8] = packed.try_into().ok()?;
    let sortable = (u64::from_be_bytes(raw) ^ SIGN_BIT) as i64;
    let bits = sortable ^ ((sortable >> 63) & i64::MAX);
    Some(f64::from_bits(bits as u64))
}

/// Slices dimension `dim` out of a packed point.
pub fn dimension<'a>(packed: &'a [u8], kind: &FieldKind, dim: u32) -> Option<&'a [u8]> {
    match kind {
        FieldKind::Discrete => None,
        FieldKind::Point {
            dimensions,
            bytes_per_dimension,
        } => {
            if dim >= *dimensions || kind.packed_len() != Some(packed.len()) {
                return None;
            }
            let width = *bytes_per_dimension as usize;
            let start = dim as usize * width;
            packed.get(start..start + width)
        }
    }
}

fn encode_array(items: &[PropValue], out: &mut String) {
    for item in items {
        encode_element(item, out);
    }
}

fn encode_element(value: &PropValue, out: &mut String) {
    match value {
        PropValue::Null => out.push('N'),
        PropValue::Bool(b) => {
            out.push('Z');
            out.push(if *b { '1' } else { '0' });
        }
        PropValue::Int(_) | PropValue::Float(_) => {
            let number = value.as_f64().unwrap_or(f64::NAN);
            let number = if number == 0.0 { 0.0 } else { number };
            let _ = write!(out, "D{number:?}");
        }
        PropValue::Str(s) => {
            out.push('S');
            out.push_str(&STANDARD.encode(s.as_bytes()));
        }
        PropValue::Bytes(bytes) => {
            out.push('B');
            out.push_str(&STANDARD.encode(bytes));
        }
        PropValue::Array(items) => {
            out.push_str("A[");
            encode_array(items, out);
            out.push(']');
        }
    }
    out.push('|');
}
