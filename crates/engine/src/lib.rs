//! Store engine for distkv
//!
//! This crate ties the lower layers together:
//! - [`KvManager`]: store lifecycle, persistence, the receiving side of sync
//! - [`KvStore`]: a handle with CRUD, batches, transactions, queries,
//!   result sets, subscriptions and sync
//! - [`Query`]: the predicate builder and its evaluator
//! - [`sync`]: frame codec and transports

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod manager;
pub mod notify;
pub mod query;
pub mod result_set;
pub mod store;
pub mod sync;

pub use config::{KvManagerConfig, SyncDefaults};
pub use manager::KvManager;
pub use notify::{DataChangeListener, SyncCompleteListener};
pub use query::{like_match, CompiledQuery, FieldValue, Query};
pub use result_set::ResultSet;
pub use store::KvStore;
pub use sync::{status, LoopbackNetwork, NoPeers, SyncEndpoint, SyncTransport, TransportError};
