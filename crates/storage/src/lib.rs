//! Storage layer for distkv
//!
//! This crate implements the in-memory entry storage of one store:
//! - ShardedStore: DashMap of partitions, FxHashMap within
//! - Partition: shared (single-version) or per device (device-collaboration)
//! - StoredValue: value plus version, origin device and write time
//! - BatchOutcome: inserts/updates/deletes produced by a batch

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod sharded;

pub use sharded::{BatchOutcome, Partition, Shard, ShardedStore, StoredValue};
