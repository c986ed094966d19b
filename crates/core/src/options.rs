//! Store options and the enums that parameterize the public API
//!
//! Numeric codes are part of the loosely typed surface; `from_code` is the
//! only way the executor layer resolves them.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Kind of store returned by `getKVStore`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum KvStoreType {
    /// Entries are partitioned by originating device; reads name a device
    #[default]
    DeviceCollaboration,
    /// One logical entry set shared by all devices
    SingleVersion,
    /// Versioned store; not supported
    MultiVersion,
}

impl KvStoreType {
    /// Numeric code of this store type
    pub fn code(self) -> i64 {
        match self {
            KvStoreType::DeviceCollaboration => 0,
            KvStoreType::SingleVersion => 1,
            KvStoreType::MultiVersion => 2,
        }
    }

    /// Resolve a numeric code
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(KvStoreType::DeviceCollaboration),
            1 => Some(KvStoreType::SingleVersion),
            2 => Some(KvStoreType::MultiVersion),
            _ => None,
        }
    }
}

/// Security level fixed at store creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SecurityLevel {
    /// No level set
    #[default]
    NoLevel,
    /// Public data
    S0,
    /// Low-risk data
    S1,
    /// Medium-risk data
    S2,
    /// High-risk data
    S3,
    /// Critical data
    S4,
}

impl SecurityLevel {
    /// Numeric code of this level
    pub fn code(self) -> i64 {
        match self {
            SecurityLevel::NoLevel => 0,
            SecurityLevel::S0 => 1,
            SecurityLevel::S1 => 2,
            SecurityLevel::S2 => 3,
            SecurityLevel::S3 => 5,
            SecurityLevel::S4 => 6,
        }
    }

    /// Resolve a numeric code. Code 4 is unassigned.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(SecurityLevel::NoLevel),
            1 => Some(SecurityLevel::S0),
            2 => Some(SecurityLevel::S1),
            3 => Some(SecurityLevel::S2),
            5 => Some(SecurityLevel::S3),
            6 => Some(SecurityLevel::S4),
            _ => None,
        }
    }
}

/// Direction of a `sync()` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncMode {
    /// Fetch peer data only
    PullOnly,
    /// Send local data only
    PushOnly,
    /// Both directions
    PushPull,
}

impl SyncMode {
    /// Numeric code of this mode
    pub fn code(self) -> i64 {
        match self {
            SyncMode::PullOnly => 0,
            SyncMode::PushOnly => 1,
            SyncMode::PushPull => 2,
        }
    }

    /// Resolve a numeric code
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(SyncMode::PullOnly),
            1 => Some(SyncMode::PushOnly),
            2 => Some(SyncMode::PushPull),
            _ => None,
        }
    }

    /// True if this mode sends local data
    pub fn pushes(self) -> bool {
        matches!(self, SyncMode::PushOnly | SyncMode::PushPull)
    }

    /// True if this mode fetches peer data
    pub fn pulls(self) -> bool {
        matches!(self, SyncMode::PullOnly | SyncMode::PushPull)
    }
}

/// Which changes a `dataChange` subscriber receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubscribeType {
    /// Changes made through this process
    Local,
    /// Changes received by sync
    Remote,
    /// Both
    All,
}

impl SubscribeType {
    /// Numeric code of this subscribe type
    pub fn code(self) -> i64 {
        match self {
            SubscribeType::Local => 0,
            SubscribeType::Remote => 1,
            SubscribeType::All => 2,
        }
    }

    /// Resolve a numeric code
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(SubscribeType::Local),
            1 => Some(SubscribeType::Remote),
            2 => Some(SubscribeType::All),
            _ => None,
        }
    }

    /// Whether a change of the given origin passes this filter
    pub fn accepts(self, remote: bool) -> bool {
        match self {
            SubscribeType::Local => !remote,
            SubscribeType::Remote => remote,
            SubscribeType::All => true,
        }
    }
}

/// Kind of user owning a manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum UserType {
    /// A user sharing the same account
    #[default]
    SameUserId,
}

/// User the manager acts for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserInfo {
    /// User id
    pub user_id: String,
    /// User type
    pub user_type: UserType,
}

impl Default for UserInfo {
    fn default() -> Self {
        Self {
            user_id: "0".to_string(),
            user_type: UserType::SameUserId,
        }
    }
}

/// Options fixed when a store is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Create the store if it does not exist
    pub create_if_missing: bool,
    /// Request at-rest encryption (recorded only)
    pub encrypt: bool,
    /// Include the store in backups
    pub backup: bool,
    /// Push local changes to peers after each commit
    pub auto_sync: bool,
    /// Store type
    pub kv_store_type: KvStoreType,
    /// Security level
    pub security_level: SecurityLevel,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            encrypt: false,
            backup: true,
            auto_sync: true,
            kv_store_type: KvStoreType::DeviceCollaboration,
            security_level: SecurityLevel::NoLevel,
        }
    }
}

impl Options {
    /// Options for a single-version store, other fields defaulted
    pub fn single_version() -> Self {
        Self {
            kv_store_type: KvStoreType::SingleVersion,
            ..Self::default()
        }
    }

    /// Options for a device-collaboration store, other fields defaulted
    pub fn device_collaboration() -> Self {
        Self::default()
    }

    /// Set the store type
    pub fn with_kv_store_type(mut self, kv_store_type: KvStoreType) -> Self {
        self.kv_store_type = kv_store_type;
        self
    }

    /// Set `create_if_missing`
    pub fn with_create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }

    /// Set `auto_sync`
    pub fn with_auto_sync(mut self, auto_sync: bool) -> Self {
        self.auto_sync = auto_sync;
        self
    }

    /// Set `encrypt`
    pub fn with_encrypt(mut self, encrypt: bool) -> Self {
        self.encrypt = encrypt;
        self
    }

    /// Set `security_level`
    pub fn with_security_level(mut self, level: SecurityLevel) -> Self {
        self.security_level = level;
        self
    }

    /// Reject option combinations the engine does not model.
    pub fn validate(&self) -> Result<()> {
        if self.kv_store_type == KvStoreType::MultiVersion {
            return Err(Error::invalid_argument(
                "MULTI_VERSION stores are not supported",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let o = Options::default();
        assert!(o.create_if_missing);
        assert!(!o.encrypt);
        assert!(o.backup);
        assert!(o.auto_sync);
        assert_eq!(o.kv_store_type, KvStoreType::DeviceCollaboration);
        assert_eq!(o.security_level, SecurityLevel::NoLevel);
    }

    #[test]
    fn test_security_level_codes_skip_four() {
        assert_eq!(SecurityLevel::S3.code(), 5);
        assert_eq!(SecurityLevel::from_code(4), None);
        assert_eq!(SecurityLevel::from_code(6), Some(SecurityLevel::S4));
    }

    #[test]
    fn test_subscribe_filter() {
        assert!(SubscribeType::Local.accepts(false));
        assert!(!SubscribeType::Local.accepts(true));
        assert!(SubscribeType::Remote.accepts(true));
        assert!(SubscribeType::All.accepts(true) && SubscribeType::All.accepts(false));
    }

    #[test]
    fn test_multi_version_rejected() {
        let o = Options {
            kv_store_type: KvStoreType::MultiVersion,
            ..Options::default()
        };
        assert!(o.validate().unwrap_err().is_invalid_argument());
        assert!(Options::single_version().validate().is_ok());
    }

    #[test]
    fn test_sync_mode_directions() {
        assert!(SyncMode::PushPull.pushes() && SyncMode::PushPull.pulls());
        assert!(!SyncMode::PullOnly.pushes());
        assert!(!SyncMode::PushOnly.pulls());
        assert_eq!(SyncMode::from_code(3), None);
    }
}
