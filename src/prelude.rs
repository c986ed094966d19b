//! Convenient imports for distkv.
//!
//! ```no_run
//! use distkv::prelude::*;
//! ```

// Entry points
pub use distkv_api::{create_kv_manager, KvManager};

// Handles
pub use distkv_api::{DeviceKvStore, KvStore, SingleKvStore};

// Error handling
pub use distkv_core::{Error, Result};

// Data types
pub use distkv_core::{ChangeNotification, DeviceId, Entry, Value};

// Options
pub use distkv_core::{KvStoreType, Options, SecurityLevel, SubscribeType, SyncMode};
pub use distkv_engine::{KvManagerConfig, Query, ResultSet};
