//! Core types for distkv
//!
//! This module defines the fundamental types used throughout the system:
//! - [`DeviceId`]: identity of a device participating in sync
//! - [`Entry`]: a key and its typed value
//! - [`ChangeNotification`]: the payload of a `dataChange` event
//! - [`SyncResult`]: the payload of a `syncComplete` event

use crate::error::{Error, Result};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Identifier of a device.
///
/// Local device ids are 64 uppercase hex characters; ids received from
/// callers are accepted as any non-empty string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(String);

impl DeviceId {
    /// Create a DeviceId from a caller-supplied string.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the id is empty.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(Error::invalid_argument("device id must not be empty"));
        }
        Ok(DeviceId(id))
    }

    /// Generate a fresh local device id.
    ///
    /// The id is the SHA-256 digest of a random UUID v4, rendered as
    /// 64 uppercase hex characters.
    ///
    /// # Examples
    ///
    /// ```
    /// use distkv_core::DeviceId;
    ///
    /// let id = DeviceId::generate();
    /// assert_eq!(id.as_str().len(), 64);
    /// assert_ne!(id, DeviceId::generate());
    /// ```
    pub fn generate() -> Self {
        let digest = Sha256::digest(Uuid::new_v4().as_bytes());
        let hex: String = digest.iter().map(|b| format!("{:02X}", b)).collect();
        DeviceId(hex)
    }

    /// Get the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A key and its typed value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// The key
    pub key: String,
    /// The typed value
    pub value: Value,
}

impl Entry {
    /// Create a new entry
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Changes applied to a store by one mutation (put, batch, commit or
/// inbound sync), delivered to `dataChange` listeners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeNotification {
    /// Entries whose key did not exist before
    pub insert_entries: Vec<Entry>,
    /// Entries whose key existed and was overwritten
    pub update_entries: Vec<Entry>,
    /// Entries that were removed, with the value they held
    pub delete_entries: Vec<Entry>,
    /// The device whose data changed
    pub device_id: DeviceId,
}

impl ChangeNotification {
    /// Create an empty notification for a device
    pub fn new(device_id: DeviceId) -> Self {
        Self {
            insert_entries: Vec::new(),
            update_entries: Vec::new(),
            delete_entries: Vec::new(),
            device_id,
        }
    }

    /// True if the notification carries no change at all
    pub fn is_empty(&self) -> bool {
        self.insert_entries.is_empty()
            && self.update_entries.is_empty()
            && self.delete_entries.is_empty()
    }

    /// Total number of changed entries
    pub fn len(&self) -> usize {
        self.insert_entries.len() + self.update_entries.len() + self.delete_entries.len()
    }
}

/// Per-device outcome of one `sync()` call: `(device id, status code)`.
///
/// Status `0` means success.
pub type SyncResult = Vec<(String, i32)>;
