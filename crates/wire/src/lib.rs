//! Wire encoding for distkv
//!
//! This crate implements the JSON form of distkv values, entries, change
//! notifications and errors, as used by the executor and the CLI.
//!
//! ## Examples
//!
//! ```
//! use distkv_wire::{encode_json, decode_json};
//! use distkv_core::Value;
//!
//! let json = encode_json(&Value::Integer(42));
//! assert_eq!(json, r#"{"type":1,"value":42}"#);
//!
//! let decoded = decode_json(&json).unwrap();
//! assert_eq!(decoded, Value::Integer(42));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod json;

pub use json::{
    decode_bytes, decode_entries, decode_entry, decode_json, decode_loose, decode_payload,
    decode_value, encode_bytes, encode_entries, encode_entry, encode_error, encode_json,
    encode_notification, encode_sync_result, encode_value, DecodeError,
};
