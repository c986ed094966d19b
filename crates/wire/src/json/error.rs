//! Wire error encoding
//!
//! Errors are encoded as:
//! ```json
//! {"code": 404, "kind": "NotFound", "message": "not found: key 'k'"}
//! ```

use distkv_core::Error;
use serde_json::json;

/// Encode an error as JSON
pub fn encode_error(error: &Error) -> serde_json::Value {
    json!({
        "code": error.code(),
        "kind": error.kind_name(),
        "message": error.to_string(),
    })
}
