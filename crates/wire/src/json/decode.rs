//! JSON decoding of distkv values
//!
//! Decoding validates that the `type` tag and the payload agree. Two input
//! shapes are accepted for byte arrays: a base64 string and an array of
//! byte numbers.

use base64::Engine;
use distkv_core::{Entry, Error, Value, ValueType};
use serde_json::Map;
use thiserror::Error;

/// Decode error types
#[derive(Debug, Error, PartialEq)]
pub enum DecodeError {
    /// Invalid JSON syntax
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    /// Required field absent
    #[error("missing field '{0}'")]
    MissingField(&'static str),

    /// Unknown `type` code
    #[error("unknown value type {0}")]
    UnknownType(i64),

    /// Payload does not match the `type` tag
    #[error("payload does not match {expected}: got {found}")]
    TypeMismatch {
        /// Type named by the tag
        expected: ValueType,
        /// JSON kind of the payload
        found: &'static str,
    },

    /// Number outside the range of the tagged type
    #[error("{0} is out of range for {1}")]
    OutOfRange(String, ValueType),

    /// Invalid base64 in a byte array payload
    #[error("invalid base64: {0}")]
    InvalidBase64(String),

    /// Invalid value in a `$f64` wrapper
    #[error("invalid $f64 value: {0}")]
    InvalidF64Wrapper(String),

    /// A value that cannot be stored, such as `null`
    #[error("unsupported value: {0}")]
    Unsupported(&'static str),
}

impl From<DecodeError> for Error {
    fn from(e: DecodeError) -> Self {
        match e {
            DecodeError::InvalidJson(msg) => Error::Serialization(msg),
            other => Error::InvalidArgument(other.to_string()),
        }
    }
}

fn kind(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Decode a JSON string holding a value envelope
pub fn decode_json(text: &str) -> Result<Value, DecodeError> {
    let parsed: serde_json::Value =
        serde_json::from_str(text.trim()).map_err(|e| DecodeError::InvalidJson(e.to_string()))?;
    decode_value(&parsed)
}

/// Decode a value envelope `{"type": <code>, "value": ...}`
pub fn decode_value(envelope: &serde_json::Value) -> Result<Value, DecodeError> {
    let object = envelope.as_object().ok_or(DecodeError::TypeMismatch {
        expected: ValueType::String,
        found: kind(envelope),
    })?;
    decode_tagged(object)
}

fn decode_tagged(object: &Map<String, serde_json::Value>) -> Result<Value, DecodeError> {
    let code = object
        .get("type")
        .ok_or(DecodeError::MissingField("type"))?
        .as_i64()
        .ok_or(DecodeError::MissingField("type"))?;
    let value_type = u8::try_from(code)
        .ok()
        .and_then(ValueType::from_code)
        .ok_or(DecodeError::UnknownType(code))?;
    let payload = object.get("value").ok_or(DecodeError::MissingField("value"))?;
    decode_payload(value_type, payload)
}

/// Decode a payload known to carry `value_type`
pub fn decode_payload(value_type: ValueType, payload: &serde_json::Value) -> Result<Value, DecodeError> {
    let mismatch = || DecodeError::TypeMismatch {
        expected: value_type,
        found: kind(payload),
    };
    match value_type {
        ValueType::String => payload
            .as_str()
            .map(|s| Value::String(s.to_string()))
            .ok_or_else(mismatch),
        ValueType::Boolean => payload.as_bool().map(Value::Boolean).ok_or_else(mismatch),
        ValueType::Integer => match payload {
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Value::Integer(i))
                } else {
                    match n.as_f64() {
                        Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => {
                            Ok(Value::Integer(f as i64))
                        }
                        _ => Err(DecodeError::OutOfRange(n.to_string(), value_type)),
                    }
                }
            }
            _ => Err(mismatch()),
        },
        ValueType::Double => decode_float(payload, value_type).map(Value::Double),
        ValueType::Float => {
            let f = decode_float(payload, value_type)?;
            let narrowed = f as f32;
            if f.is_finite() && narrowed.is_infinite() {
                return Err(DecodeError::OutOfRange(f.to_string(), value_type));
            }
            Ok(Value::Float(narrowed))
        }
        ValueType::ByteArray => decode_bytes(payload).map(Value::ByteArray),
    }
}

fn decode_float(payload: &serde_json::Value, value_type: ValueType) -> Result<f64, DecodeError> {
    match payload {
        serde_json::Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| DecodeError::OutOfRange(n.to_string(), value_type)),
        serde_json::Value::Object(map) if map.len() == 1 => match map.get("$f64") {
            Some(serde_json::Value::String(s)) => match s.as_str() {
                "NaN" => Ok(f64::NAN),
                "+Inf" | "Inf" => Ok(f64::INFINITY),
                "-Inf" => Ok(f64::NEG_INFINITY),
                "-0.0" => Ok(-0.0),
                other => Err(DecodeError::InvalidF64Wrapper(other.to_string())),
            },
            _ => Err(DecodeError::InvalidF64Wrapper(payload.to_string())),
        },
        other => Err(DecodeError::TypeMismatch {
            expected: value_type,
            found: kind(other),
        }),
    }
}

/// Decode a byte array payload: base64 text or an array of byte numbers
pub fn decode_bytes(payload: &serde_json::Value) -> Result<Vec<u8>, DecodeError> {
    match payload {
        serde_json::Value::String(s) => base64::engine::general_purpose::STANDARD
            .decode(s)
            .map_err(|e| DecodeError::InvalidBase64(e.to_string())),
        serde_json::Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_u64()
                    .and_then(|n| u8::try_from(n).ok())
                    .ok_or_else(|| DecodeError::OutOfRange(item.to_string(), ValueType::ByteArray))
            })
            .collect(),
        other => Err(DecodeError::TypeMismatch {
            expected: ValueType::ByteArray,
            found: kind(other),
        }),
    }
}

/// Decode a value from a loosely typed caller.
///
/// Envelopes are decoded strictly. Bare JSON values map to the closest
/// type: strings to STRING, booleans to BOOLEAN, every number to DOUBLE and
/// arrays of byte numbers to BYTE_ARRAY. `null` is rejected.
pub fn decode_loose(v: &serde_json::Value) -> Result<Value, DecodeError> {
    match v {
        serde_json::Value::Null => Err(DecodeError::Unsupported("null")),
        serde_json::Value::String(s) => Ok(Value::String(s.clone())),
        serde_json::Value::Bool(b) => Ok(Value::Boolean(*b)),
        serde_json::Value::Number(_) => decode_float(v, ValueType::Double).map(Value::Double),
        serde_json::Value::Array(_) => decode_bytes(v).map(Value::ByteArray),
        serde_json::Value::Object(map) if map.contains_key("type") => decode_tagged(map),
        serde_json::Value::Object(map) if map.len() == 1 && map.contains_key("$f64") => {
            decode_float(v, ValueType::Double).map(Value::Double)
        }
        serde_json::Value::Object(_) => Err(DecodeError::Unsupported("object without a type tag")),
    }
}

/// Decode an entry `{"key": ..., "value": ...}`; the value may be loose
pub fn decode_entry(v: &serde_json::Value) -> Result<Entry, DecodeError> {
    let object = v.as_object().ok_or(DecodeError::MissingField("key"))?;
    let key = object
        .get("key")
        .and_then(serde_json::Value::as_str)
        .ok_or(DecodeError::MissingField("key"))?;
    let value = object.get("value").ok_or(DecodeError::MissingField("value"))?;
    Ok(Entry {
        key: key.to_string(),
        value: decode_loose(value)?,
    })
}

/// Decode a list of entries
pub fn decode_entries(v: &serde_json::Value) -> Result<Vec<Entry>, DecodeError> {
    let items = v.as_array().ok_or(DecodeError::TypeMismatch {
        expected: ValueType::String,
        found: kind(v),
    })?;
    items.iter().map(decode_entry).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_each_type() {
        assert_eq!(decode_json(r#"{"type":0,"value":""}"#).unwrap(), Value::from(""));
        assert_eq!(
            decode_value(&json!({"type": 1, "value": i64::MAX})).unwrap(),
            Value::Integer(i64::MAX)
        );
        assert_eq!(
            decode_value(&json!({"type": 2, "value": 1.5})).unwrap(),
            Value::Float(1.5)
        );
        assert_eq!(
            decode_value(&json!({"type": 3, "value": [1, 2, 3]})).unwrap(),
            Value::ByteArray(vec![1, 2, 3])
        );
        assert_eq!(
            decode_value(&json!({"type": 3, "value": "AQID"})).unwrap(),
            Value::ByteArray(vec![1, 2, 3])
        );
        assert_eq!(
            decode_value(&json!({"type": 4, "value": true})).unwrap(),
            Value::Boolean(true)
        );
        assert_eq!(
            decode_value(&json!({"type": 5, "value": f64::MAX})).unwrap(),
            Value::Double(f64::MAX)
        );
    }

    #[test]
    fn test_tag_payload_mismatch() {
        let err = decode_value(&json!({"type": 1, "value": "12"})).unwrap_err();
        assert!(matches!(err, DecodeError::TypeMismatch { .. }));
        let err = decode_value(&json!({"type": 4, "value": 1})).unwrap_err();
        assert!(matches!(err, DecodeError::TypeMismatch { .. }));
        let err = decode_value(&json!({"type": 9, "value": 1})).unwrap_err();
        assert_eq!(err, DecodeError::UnknownType(9));
        let err = decode_value(&json!({"value": 1})).unwrap_err();
        assert_eq!(err, DecodeError::MissingField("type"));
        let err = decode_value(&json!({"type": 3, "value": [256]})).unwrap_err();
        assert!(matches!(err, DecodeError::OutOfRange(..)));
        let err = decode_value(&json!({"type": 2, "value": 1e300})).unwrap_err();
        assert!(matches!(err, DecodeError::OutOfRange(..)));
        let err = decode_value(&json!({"type": 1, "value": 1.5})).unwrap_err();
        assert!(matches!(err, DecodeError::OutOfRange(..)));
    }

    #[test]
    fn test_float_bounds_from_shortest_decimal() {
        assert_eq!(
            decode_json(&format!(r#"{{"type":2,"value":{}}}"#, f32::MAX)).unwrap(),
            Value::Float(f32::MAX)
        );
        assert_eq!(
            decode_json(r#"{"type":2,"value":-3.4028235e38}"#).unwrap(),
            Value::Float(f32::MIN)
        );
        let err = decode_json(r#"{"type":2,"value":3.5e38}"#).unwrap_err();
        assert!(matches!(err, DecodeError::OutOfRange(..)));
    }

    #[test]
    fn test_special_float_wrappers() {
        let v = decode_value(&json!({"type": 5, "value": {"$f64": "NaN"}})).unwrap();
        assert!(matches!(v, Value::Double(d) if d.is_nan()));
        let v = decode_value(&json!({"type": 2, "value": {"$f64": "+Inf"}})).unwrap();
        assert_eq!(v, Value::Float(f32::INFINITY));
        let err = decode_value(&json!({"type": 5, "value": {"$f64": "huge"}})).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidF64Wrapper(_)));
    }

    #[test]
    fn test_loose_values() {
        assert_eq!(decode_loose(&json!("s")).unwrap(), Value::from("s"));
        assert_eq!(decode_loose(&json!(3)).unwrap(), Value::Double(3.0));
        assert_eq!(decode_loose(&json!(false)).unwrap(), Value::Boolean(false));
        assert_eq!(decode_loose(&json!([9])).unwrap(), Value::ByteArray(vec![9]));
        assert_eq!(
            decode_loose(&json!({"type": 1, "value": 3})).unwrap(),
            Value::Integer(3)
        );
        assert_eq!(decode_loose(&json!(null)).unwrap_err(), DecodeError::Unsupported("null"));
        assert!(decode_loose(&json!({"a": 1})).is_err());
    }

    #[test]
    fn test_entries() {
        let entries = decode_entries(&json!([
            {"key": "a", "value": "x"},
            {"key": "b", "value": {"type": 1, "value": 2}},
        ]))
        .unwrap();
        assert_eq!(entries[1], Entry::new("b", 2i64));
        assert!(decode_entry(&json!({"value": 1})).is_err());
        assert!(decode_entry(&json!({"key": "a", "value": null})).is_err());
    }

    #[test]
    fn test_into_core_error() {
        let e: Error = DecodeError::UnknownType(7).into();
        assert!(e.is_invalid_argument());
        let e: Error = decode_json("{").unwrap_err().into();
        assert_eq!(e.code(), 501);
    }
}
