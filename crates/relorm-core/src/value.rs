//! Dynamic SQL values.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One bound parameter or result cell.
///
/// Builders collect these in placeholder order; rows carry them back
/// from the driver untouched until a record decodes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// NULL value
    Null,

    /// Boolean value
    Bool(bool),

    /// 16-bit signed integer
    SmallInt(i16),

    /// 32-bit signed integer
    Int(i32),

    /// 64-bit signed integer
    BigInt(i64),

    /// 32-bit floating point
    Float(f32),

    /// 64-bit floating point
    Double(f64),

    /// Arbitrary precision decimal (stored as string)
    Decimal(String),

    /// Text string
    Text(String),

    /// Binary data, also what many drivers hand back for untyped text columns
    Bytes(Vec<u8>),

    /// UUID (as 16 bytes)
    Uuid([u8; 16]),

    /// JSON value
    Json(serde_json::Value),
}

/// Hashable projection of a [`Value`] used to match foreign keys to parents.
///
/// All integer widths collapse to `Int` so an `INTEGER` parent id matches a
/// `BIGINT` foreign key. Textual values that parse as integers do the same,
/// since drivers often return untyped columns as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueKey {
    Int(i64),
    Text(String),
    Bytes(Vec<u8>),
    Uuid([u8; 16]),
}

impl Value {
    /// Check if this value is NULL.
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get the type name of this value.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Bool(_) => "BOOLEAN",
            Value::SmallInt(_) => "SMALLINT",
            Value::Int(_) => "INTEGER",
            Value::BigInt(_) => "BIGINT",
            Value::Float(_) => "REAL",
            Value::Double(_) => "DOUBLE",
            Value::Decimal(_) => "DECIMAL",
            Value::Text(_) => "TEXT",
            Value::Bytes(_) => "BLOB",
            Value::Uuid(_) => "UUID",
            Value::Json(_) => "JSON",
        }
    }

    /// Try to convert this value to a bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            Value::SmallInt(v) => Some(*v != 0),
            Value::Int(v) => Some(*v != 0),
            Value::BigInt(v) => Some(*v != 0),
            _ => None,
        }
    }

    /// Try to convert this value to an i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::SmallInt(v) => Some(i64::from(*v)),
            Value::Int(v) => Some(i64::from(*v)),
            Value::BigInt(v) => Some(*v),
            Value::Bool(v) => Some(if *v { 1 } else { 0 }),
            _ => None,
        }
    }

    /// Try to convert this value to an f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(f64::from(*v)),
            Value::Double(v) => Some(*v),
            Value::SmallInt(v) => Some(f64::from(*v)),
            Value::Int(v) => Some(f64::from(*v)),
            Value::BigInt(v) => Some(*v as f64),
            Value::Decimal(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Try to get this value as a string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            Value::Decimal(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get this value as a byte slice.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            Value::Text(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    /// Whether this value is the zero value of its type.
    ///
    /// Empty strings and byte strings, `false`, numeric zero and NULL are zero.
    pub fn is_zero(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Bool(v) => !v,
            Value::SmallInt(v) => *v == 0,
            Value::Int(v) => *v == 0,
            Value::BigInt(v) => *v == 0,
            Value::Float(v) => *v == 0.0,
            Value::Double(v) => *v == 0.0,
            Value::Decimal(s) | Value::Text(s) => s.is_empty(),
            Value::Bytes(b) => b.is_empty(),
            Value::Uuid(u) => u.iter().all(|b| *b == 0),
            Value::Json(j) => j.is_null(),
        }
    }

    /// Project this value onto a hashable grouping key.
    ///
    /// Returns `None` for NULL and for values with no stable equality
    /// (floats, JSON).
    pub fn key(&self) -> Option<ValueKey> {
        match self {
            Value::SmallInt(_) | Value::Int(_) | Value::BigInt(_) | Value::Bool(_) => {
                self.as_i64().map(ValueKey::Int)
            }
            Value::Text(s) | Value::Decimal(s) => Some(
                s.trim()
                    .parse::<i64>()
                    .map_or_else(|_| ValueKey::Text(s.clone()), ValueKey::Int),
            ),
            Value::Bytes(b) => match std::str::from_utf8(b) {
                Ok(s) => Some(
                    s.trim()
                        .parse::<i64>()
                        .map_or_else(|_| ValueKey::Text(s.to_string()), ValueKey::Int),
                ),
                Err(_) => Some(ValueKey::Bytes(b.clone())),
            },
            Value::Uuid(u) => Some(ValueKey::Uuid(*u)),
            Value::Null | Value::Float(_) | Value::Double(_) | Value::Json(_) => None,
        }
    }

    /// Render this value as an inline SQL literal.
    ///
    /// Text is single-quoted with embedded quotes doubled. This is only used by
    /// the builder's non-parameterized helpers, which splice caller-supplied
    /// values straight into statement text; never feed untrusted input there.
    pub fn to_sql_literal(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(v) => if *v { "TRUE" } else { "FALSE" }.to_string(),
            Value::SmallInt(v) => v.to_string(),
            Value::Int(v) => v.to_string(),
            Value::BigInt(v) => v.to_string(),
            Value::Float(v) => v.to_string(),
            Value::Double(v) => v.to_string(),
            Value::Decimal(s) => s.clone(),
            Value::Text(s) => format!("'{}'", s.replace('\'', "''")),
            Value::Bytes(b) => format!("'{}'", String::from_utf8_lossy(b).replace('\'', "''")),
            Value::Uuid(u) => format!("'{}'", format_uuid(u)),
            Value::Json(j) => format!("'{}'", j.to_string().replace('\'', "''")),
        }
    }
}

fn format_uuid(bytes: &[u8; 16]) -> String {
    let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) | Value::Decimal(s) => write!(f, "{}", s),
            Value::Bytes(b) => write!(f, "{}", String::from_utf8_lossy(b)),
            other => write!(f, "{}", other.to_sql_literal()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::SmallInt(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::BigInt(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::BigInt(i64::from(v))
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl From<[u8; 16]> for Value {
    fn from(v: [u8; 16]) -> Self {
        Value::Uuid(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

macro_rules! impl_from_ref {
    ($($ty:ty),*) => {
        $(
            impl From<&$ty> for Value {
                fn from(v: &$ty) -> Self {
                    Value::from(*v)
                }
            }
        )*
    };
}

impl_from_ref!(bool, i16, i32, i64, u32, f32, f64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_values_are_type_aware() {
        assert!(Value::Null.is_zero());
        assert!(Value::Bool(false).is_zero());
        assert!(Value::Int(0).is_zero());
        assert!(Value::BigInt(0).is_zero());
        assert!(Value::Double(0.0).is_zero());
        assert!(Value::Text(String::new()).is_zero());
        assert!(Value::Bytes(Vec::new()).is_zero());

        assert!(!Value::Bool(true).is_zero());
        assert!(!Value::BigInt(-1).is_zero());
        assert!(!Value::Text("a".into()).is_zero());
    }

    #[test]
    fn integer_keys_collapse_across_widths_and_text() {
        assert_eq!(Value::Int(7).key(), Value::BigInt(7).key());
        assert_eq!(Value::Text("7".into()).key(), Some(ValueKey::Int(7)));
        assert_eq!(Value::Bytes(b"7".to_vec()).key(), Some(ValueKey::Int(7)));
        assert_eq!(
            Value::Text("abc".into()).key(),
            Some(ValueKey::Text("abc".into()))
        );
        assert_eq!(Value::Null.key(), None);
        assert_eq!(Value::Double(1.5).key(), None);
    }

    #[test]
    fn sql_literals_quote_text() {
        assert_eq!(Value::Int(3).to_sql_literal(), "3");
        assert_eq!(Value::Text("O'Neil".into()).to_sql_literal(), "'O''Neil'");
        assert_eq!(Value::Null.to_sql_literal(), "NULL");
        assert_eq!(Value::Bool(true).to_sql_literal(), "TRUE");
    }

    #[test]
    fn uuid_literal_is_hyphenated() {
        let bytes = [
            0x55, 0x0e, 0x84, 0x00, 0xe2, 0x9b, 0x41, 0xd4, 0xa7, 0x16, 0x44, 0x66, 0x55, 0x44,
            0x00, 0x00,
        ];
        assert_eq!(
            Value::Uuid(bytes).to_sql_literal(),
            "'550e8400-e29b-41d4-a716-446655440000'"
        );
    }

    #[test]
    fn option_conversion() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some("x")), Value::Text("x".into()));
        assert_eq!(Value::from(&5_i64), Value::BigInt(5));
    }

    #[test]
    fn display_is_unquoted_for_text() {
        assert_eq!(Value::Text("john".into()).to_string(), "john");
        assert_eq!(Value::BigInt(4).to_string(), "4");
    }
}
