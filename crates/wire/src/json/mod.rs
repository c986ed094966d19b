//! JSON wire encoding for distkv values
//!
//! Values travel as `{"type": <code>, "value": <payload>}` envelopes where
//! `code` is the [`ValueType`](distkv_core::ValueType) wire code:
//!
//! | Type | Code | Payload |
//! |------|------|---------|
//! | STRING | 0 | string |
//! | INTEGER | 1 | integer number |
//! | FLOAT | 2 | number, or `{"$f64": ...}` |
//! | BYTE_ARRAY | 3 | base64 string (array of byte numbers accepted) |
//! | BOOLEAN | 4 | boolean |
//! | DOUBLE | 5 | number, or `{"$f64": ...}` |

mod decode;
mod encode;
mod error;

pub use decode::{
    decode_bytes, decode_entries, decode_entry, decode_json, decode_loose, decode_payload,
    decode_value, DecodeError,
};
pub use encode::{
    encode_bytes, encode_entries, encode_entry, encode_json, encode_notification,
    encode_sync_result, encode_value,
};
pub use error::encode_error;
