//! # distkv
//!
//! Embedded key-value store with change notifications, transactions,
//! device-scoped partitions and peer-to-peer sync.
//!
//! ## Quick Start
//!
//! ```no_run
//! use distkv::prelude::*;
//!
//! # async fn demo() -> Result<()> {
//! let manager = create_kv_manager(KvManagerConfig::new("com.example.app")).await?;
//! let store: SingleKvStore = manager.get_kv_store("settings", Options::single_version()).await?;
//!
//! store.put("theme", Value::from("dark")).await?;
//! assert_eq!(store.get("theme").await?, Value::from("dark"));
//!
//! store.start_transaction().await?;
//! store.put_batch(vec![Entry::new("a", 1i64), Entry::new("b", 2i64)]).await?;
//! store.commit().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Layers
//!
//! - [`api`]: typed async handles (`SingleKvStore`, `DeviceKvStore`) and the
//!   callback adapter
//! - [`engine`]: manager, store handles, queries, result sets, sync transports
//! - [`wire`]: the JSON value envelope
//! - [`executor`]: loosely typed invocations and scenario scripts

#![warn(missing_docs)]

pub mod prelude;

pub use distkv_api as api;
pub use distkv_engine as engine;
pub use distkv_executor as executor;
pub use distkv_wire as wire;

pub use distkv_api::{
    callback, create_kv_manager, create_kv_manager_with_transport, DeviceKvStore, KvManager,
    KvStore, SingleKvStore,
};
pub use distkv_core::{
    ChangeNotification, DeviceId, Entry, Error, KvStoreType, Limits, Options, Result,
    SecurityLevel, SubscribeType, SyncMode, Value, ValueType,
};
pub use distkv_engine::{status, KvManagerConfig, Query, ResultSet, SyncDefaults};
