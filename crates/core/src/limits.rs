//! Size limits and input validation
//!
//! The constants mirror the platform SDK. [`Limits`] carries the subset
//! that is configurable per manager; the value length limit can be
//! disabled entirely.

use crate::error::{Error, Result};
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// Maximum key length in bytes for single-version stores
pub const MAX_KEY_LENGTH: usize = 1024;

/// Maximum value length in bytes
pub const MAX_VALUE_LENGTH: usize = 4_194_303;

/// Maximum key length in bytes for device-collaboration stores
pub const MAX_KEY_LENGTH_DEVICE: usize = 896;

/// Maximum store id length in bytes
pub const MAX_STORE_ID_LENGTH: usize = 128;

/// Maximum length of a query's diagnostic form
pub const MAX_QUERY_LENGTH: usize = 512_000;

/// Maximum number of entries or keys in one batch
pub const MAX_BATCH_SIZE: usize = 128;

/// Configurable limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Maximum value payload length; `None` disables the check
    pub max_value_length: Option<usize>,
    /// Maximum entries or keys per batch
    pub max_batch_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_value_length: Some(MAX_VALUE_LENGTH),
            max_batch_size: MAX_BATCH_SIZE,
        }
    }
}

impl Limits {
    /// Limits with no value length check.
    pub fn unbounded_values() -> Self {
        Self {
            max_value_length: None,
            ..Self::default()
        }
    }

    /// Validate a value against the configured length limit.
    pub fn validate_value(&self, key: &str, value: &Value) -> Result<()> {
        if let Some(max) = self.max_value_length {
            let len = value.payload_len();
            if len > max {
                return Err(Error::InvalidArgument(format!(
                    "value for key '{}' is {} bytes, limit is {}",
                    key, len, max
                )));
            }
        }
        Ok(())
    }

    /// Validate a batch size.
    pub fn validate_batch_len(&self, len: usize) -> Result<()> {
        if len > self.max_batch_size {
            return Err(Error::InvalidArgument(format!(
                "batch of {} exceeds limit of {}",
                len, self.max_batch_size
            )));
        }
        Ok(())
    }
}

/// Validate a key.
///
/// Keys must be non-empty and no longer than `max_len` bytes.
pub fn validate_key(key: &str, max_len: usize) -> Result<()> {
    if key.is_empty() {
        return Err(Error::invalid_argument("key must not be empty"));
    }
    if key.len() > max_len {
        return Err(Error::InvalidArgument(format!(
            "key is {} bytes, limit is {}",
            key.len(),
            max_len
        )));
    }
    Ok(())
}

/// Validate a store id.
///
/// Store ids are non-empty, at most [`MAX_STORE_ID_LENGTH`] bytes, and
/// consist of ASCII alphanumerics and `_`.
pub fn validate_store_id(store_id: &str) -> Result<()> {
    if store_id.is_empty() {
        return Err(Error::invalid_argument("store id must not be empty"));
    }
    if store_id.len() > MAX_STORE_ID_LENGTH {
        return Err(Error::InvalidArgument(format!(
            "store id is {} bytes, limit is {}",
            store_id.len(),
            MAX_STORE_ID_LENGTH
        )));
    }
    if !store_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(Error::InvalidArgument(format!(
            "store id '{}' contains characters other than [A-Za-z0-9_]",
            store_id
        )));
    }
    Ok(())
}
