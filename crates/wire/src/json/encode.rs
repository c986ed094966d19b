//! JSON encoding of distkv values
//!
//! Every value is wrapped in the envelope `{"type": <code>, "value": ...}`:
//! - byte arrays as base64 strings
//! - non-finite floats as `{"$f64": "NaN|+Inf|-Inf"}`

use base64::Engine;
use distkv_core::{ChangeNotification, Entry, Value};
use serde_json::{json, Map, Number};

/// Encode a value as its JSON envelope
pub fn encode_value(value: &Value) -> serde_json::Value {
    let payload = match value {
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Integer(i) => serde_json::Value::Number(Number::from(*i)),
        Value::Float(f) => encode_float(*f as f64),
        Value::Double(d) => encode_float(*d),
        Value::Boolean(b) => serde_json::Value::Bool(*b),
        Value::ByteArray(b) => serde_json::Value::String(encode_bytes(b)),
    };
    let mut envelope = Map::with_capacity(2);
    envelope.insert("type".into(), json!(value.value_type().code()));
    envelope.insert("value".into(), payload);
    serde_json::Value::Object(envelope)
}

/// Encode a value as a JSON string
pub fn encode_json(value: &Value) -> String {
    encode_value(value).to_string()
}

fn encode_float(f: f64) -> serde_json::Value {
    match Number::from_f64(f) {
        Some(n) => serde_json::Value::Number(n),
        None if f.is_nan() => json!({"$f64": "NaN"}),
        None if f > 0.0 => json!({"$f64": "+Inf"}),
        None => json!({"$f64": "-Inf"}),
    }
}

/// Base64 text of a byte array
pub fn encode_bytes(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Encode an entry as `{"key": ..., "value": <envelope>}`
pub fn encode_entry(entry: &Entry) -> serde_json::Value {
    json!({
        "key": entry.key,
        "value": encode_value(&entry.value),
    })
}

/// Encode a list of entries
pub fn encode_entries(entries: &[Entry]) -> serde_json::Value {
    serde_json::Value::Array(entries.iter().map(encode_entry).collect())
}

/// Encode a change notification
pub fn encode_notification(notification: &ChangeNotification) -> serde_json::Value {
    json!({
        "insertEntries": encode_entries(&notification.insert_entries),
        "updateEntries": encode_entries(&notification.update_entries),
        "deleteEntries": encode_entries(&notification.delete_entries),
        "deviceId": notification.device_id.as_str(),
    })
}

/// Encode a `syncComplete` payload as `[[deviceId, status], ...]`
pub fn encode_sync_result(result: &[(String, i32)]) -> serde_json::Value {
    serde_json::Value::Array(result.iter().map(|(d, s)| json!([d, s])).collect())
}
