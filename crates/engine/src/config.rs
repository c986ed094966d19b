//! Manager configuration
//!
//! A [`KvManagerConfig`] is built in code or loaded from TOML:
//!
//! ```toml
//! bundle_name = "com.example.kv"
//! data_dir = "/var/lib/distkv"
//!
//! [user_info]
//! user_id = "0"
//!
//! [limits]
//! max_value_length = 4194303
//! max_batch_size = 128
//!
//! [sync]
//! enabled = true
//! default_delay_ms = 0
//! ```

use crate::sync::validate_delay;
use distkv_core::{Error, Limits, Result, UserInfo};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Sync behaviour applied to every store of a manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncDefaults {
    /// Whether stores start with sync enabled
    pub enabled: bool,
    /// Allowed delay used when `sync` is called without one; 0 means none
    pub default_delay_ms: u32,
}

impl Default for SyncDefaults {
    fn default() -> Self {
        Self {
            enabled: true,
            default_delay_ms: 0,
        }
    }
}

/// Configuration of a [`KvManager`](crate::KvManager)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KvManagerConfig {
    /// Bundle (application) name scoping every store
    pub bundle_name: String,
    /// User the manager acts for
    pub user_info: UserInfo,
    /// Directory for store snapshots; `None` keeps stores in memory only
    pub data_dir: Option<PathBuf>,
    /// Size limits
    pub limits: Limits,
    /// Sync defaults
    pub sync: SyncDefaults,
}

impl Default for KvManagerConfig {
    fn default() -> Self {
        Self {
            bundle_name: String::new(),
            user_info: UserInfo::default(),
            data_dir: None,
            limits: Limits::default(),
            sync: SyncDefaults::default(),
        }
    }
}

impl KvManagerConfig {
    /// Config for a bundle with every other field defaulted
    pub fn new(bundle_name: impl Into<String>) -> Self {
        Self {
            bundle_name: bundle_name.into(),
            ..Self::default()
        }
    }

    /// Persist stores under `dir`
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    /// Replace the limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Replace the user
    pub fn with_user_info(mut self, user_info: UserInfo) -> Self {
        self.user_info = user_info;
        self
    }

    /// Replace the sync defaults
    pub fn with_sync_defaults(mut self, sync: SyncDefaults) -> Self {
        self.sync = sync;
        self
    }

    /// Parse a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Serialization(format!("invalid config: {}", e)))
    }

    /// Load a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Check the config can back a manager
    pub fn validate(&self) -> Result<()> {
        if self.bundle_name.is_empty() {
            return Err(Error::invalid_argument("bundle name must not be empty"));
        }
        if self.limits.max_batch_size == 0 {
            return Err(Error::invalid_argument("max_batch_size must be positive"));
        }
        if self.sync.default_delay_ms != 0 {
            validate_delay(self.sync.default_delay_ms)?;
        }
        Ok(())
    }
}
