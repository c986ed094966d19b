//! Value types for distkv
//!
//! This module defines the typed value envelope stored against every key.
//! The [`Value`] enum is closed: it has exactly six variants, one per
//! [`ValueType`] code.
//!
//! ## Contract
//!
//! - No implicit type coercions on storage: a value reads back with the
//!   variant it was written with
//! - `String` and `ByteArray` are distinct types
//! - Strict equality (`==`) compares variant and payload; numeric
//!   cross-kind comparison goes through [`Value::loosely_equals`]

use serde::{Deserialize, Serialize};

/// Numeric type codes of the value envelope.
///
/// These codes are part of the wire contract and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ValueType {
    /// UTF-8 string
    String = 0,
    /// 64-bit signed integer
    Integer = 1,
    /// 32-bit IEEE-754 float
    Float = 2,
    /// Arbitrary binary data
    ByteArray = 3,
    /// Boolean
    Boolean = 4,
    /// 64-bit IEEE-754 float
    Double = 5,
}

impl ValueType {
    /// Wire code of this type.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Resolve a wire code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(ValueType::String),
            1 => Some(ValueType::Integer),
            2 => Some(ValueType::Float),
            3 => Some(ValueType::ByteArray),
            4 => Some(ValueType::Boolean),
            5 => Some(ValueType::Double),
            _ => None,
        }
    }

    /// Name used in error messages and query diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            ValueType::String => "STRING",
            ValueType::Integer => "INTEGER",
            ValueType::Float => "FLOAT",
            ValueType::ByteArray => "BYTE_ARRAY",
            ValueType::Boolean => "BOOLEAN",
            ValueType::Double => "DOUBLE",
        }
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A typed value stored against a key.
///
/// ## The Six Types
///
/// 1. `String` - UTF-8 encoded string (may be empty)
/// 2. `Integer` - 64-bit signed integer
/// 3. `Float` - 32-bit IEEE-754 floating point
/// 4. `ByteArray` - arbitrary binary data (distinct from String)
/// 5. `Boolean` - true or false
/// 6. `Double` - 64-bit IEEE-754 floating point
///
/// ## Equality Rules
///
/// - Different variants are never `==`
/// - Floats use IEEE-754 equality: `NaN != NaN`, `-0.0 == 0.0`
/// - [`Value::loosely_equals`] compares numeric variants by value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    /// UTF-8 encoded string
    String(String),
    /// 64-bit signed integer
    Integer(i64),
    /// 32-bit IEEE-754 floating point
    Float(f32),
    /// Arbitrary binary data
    ByteArray(Vec<u8>),
    /// Boolean true or false
    Boolean(bool),
    /// 64-bit IEEE-754 floating point
    Double(f64),
}

impl Value {
    /// The [`ValueType`] tag of this value.
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::String(_) => ValueType::String,
            Value::Integer(_) => ValueType::Integer,
            Value::Float(_) => ValueType::Float,
            Value::ByteArray(_) => ValueType::ByteArray,
            Value::Boolean(_) => ValueType::Boolean,
            Value::Double(_) => ValueType::Double,
        }
    }

    /// Returns the type name as a string (for error messages)
    pub fn type_name(&self) -> &'static str {
        self.value_type().name()
    }

    /// Size of the payload in bytes, as counted against the value limit.
    pub fn payload_len(&self) -> usize {
        match self {
            Value::String(s) => s.len(),
            Value::ByteArray(b) => b.len(),
            Value::Integer(_) | Value::Double(_) => 8,
            Value::Float(_) => 4,
            Value::Boolean(_) => 1,
        }
    }

    /// Try to get as string slice
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as i64
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to get as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get as bytes slice
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::ByteArray(b) => Some(b),
            _ => None,
        }
    }

    /// Numeric view of the value.
    ///
    /// Integer, Float and Double widen to f64; other variants return `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f as f64),
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    /// Check if this is one of the numeric variants
    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Float(_) | Value::Double(_))
    }

    /// Value equality across numeric kinds.
    ///
    /// Numeric variants compare by widened value, so `Integer(5)` equals
    /// `Double(5.0)`. Non-numeric variants fall back to strict equality.
    pub fn loosely_equals(&self, other: &Value) -> bool {
        match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => self == other,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            // IEEE-754 equality: NaN != NaN, but -0.0 == 0.0
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::ByteArray(a), Value::ByteArray(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,

            // Different types: never equal
            _ => false,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i as i64)
    }
}

impl From<f32> for Value {
    fn from(f: f32) -> Self {
        Value::Float(f)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::ByteArray(b)
    }
}

impl From<&[u8]> for Value {
    fn from(b: &[u8]) -> Self {
        Value::ByteArray(b.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_codes_are_stable() {
        assert_eq!(ValueType::String.code(), 0);
        assert_eq!(ValueType::Integer.code(), 1);
        assert_eq!(ValueType::Float.code(), 2);
        assert_eq!(ValueType::ByteArray.code(), 3);
        assert_eq!(ValueType::Boolean.code(), 4);
        assert_eq!(ValueType::Double.code(), 5);
    }

    #[test]
    fn test_from_code_rejects_unknown() {
        assert_eq!(ValueType::from_code(5), Some(ValueType::Double));
        assert_eq!(ValueType::from_code(6), None);
        assert_eq!(ValueType::from_code(255), None);
    }

    #[test]
    fn test_value_type_matches_variant() {
        assert_eq!(Value::from("x").value_type(), ValueType::String);
        assert_eq!(Value::from(7i64).value_type(), ValueType::Integer);
        assert_eq!(Value::from(1.5f32).value_type(), ValueType::Float);
        assert_eq!(Value::from(vec![1u8]).value_type(), ValueType::ByteArray);
        assert_eq!(Value::from(true).value_type(), ValueType::Boolean);
        assert_eq!(Value::from(2.5f64).value_type(), ValueType::Double);
    }

    #[test]
    fn test_strict_equality_has_no_coercion() {
        assert_ne!(Value::Integer(1), Value::Double(1.0));
        assert_ne!(Value::String("abc".into()), Value::ByteArray(b"abc".to_vec()));
        assert_eq!(Value::Double(-0.0), Value::Double(0.0));
        assert_ne!(Value::Double(f64::NAN), Value::Double(f64::NAN));
    }

    #[test]
    fn test_loosely_equals_compares_numbers_by_value() {
        assert!(Value::Integer(5).loosely_equals(&Value::Double(5.0)));
        assert!(Value::Float(0.5).loosely_equals(&Value::Double(0.5)));
        assert!(!Value::Integer(5).loosely_equals(&Value::Double(5.5)));
        assert!(!Value::Boolean(true).loosely_equals(&Value::Integer(1)));
        assert!(Value::String("".into()).loosely_equals(&Value::String("".into())));
    }

    #[test]
    fn test_extreme_doubles_are_preserved() {
        let max = Value::Double(f64::MAX);
        let min = Value::Double(f64::MIN_POSITIVE * f64::EPSILON);
        assert_eq!(max.as_f64(), Some(f64::MAX));
        assert_eq!(min.clone(), min);
    }

    #[test]
    fn test_payload_len() {
        assert_eq!(Value::String("a".repeat(4095)).payload_len(), 4095);
        assert_eq!(Value::ByteArray(vec![0; 3]).payload_len(), 3);
        assert_eq!(Value::Boolean(false).payload_len(), 1);
    }
}
