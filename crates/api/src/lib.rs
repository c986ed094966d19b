//! Async API for distkv
//!
//! The public surface of the store: a [`KvManager`] hands out typed
//! [`SingleKvStore`] and [`DeviceKvStore`] handles. Every operation is an
//! `async fn`; [`callback::invoke`] adapts any of them to callback style.
//!
//! ```ignore
//! let manager = create_kv_manager(KvManagerConfig::new("com.example")).await?;
//! let store: SingleKvStore = manager
//!     .get_kv_store("settings", Options::single_version())
//!     .await?;
//! store.put("theme", Value::from("dark")).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod callback;
pub mod manager;
pub mod store;

pub use manager::{create_kv_manager, create_kv_manager_with_transport, KvManager};
pub use store::{DeviceKvStore, KvStore, SingleKvStore};

pub use distkv_core::{
    ChangeNotification, DeviceId, Entry, Error, KvStoreType, Options, Result, SecurityLevel,
    SubscribeType, SyncMode, Value, ValueType,
};
pub use distkv_engine::{
    status, DataChangeListener, KvManagerConfig, LoopbackNetwork, Query, ResultSet,
    SyncCompleteListener, SyncTransport,
};
