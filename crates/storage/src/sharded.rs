//! Sharded entry storage
//!
//! DashMap by partition, FxHashMap within.
//!
//! # Design
//!
//! - Partition: one per originating device in device-collaboration stores,
//!   a single shared partition in single-version stores
//! - DashMap: 16-way sharded by default, concurrent reads
//! - FxHashMap: O(1) lookups, fast non-crypto hash
//!
//! A batch locks its partition's shard once, so readers of that partition
//! observe either none or all of it.

use chrono::Utc;
use dashmap::DashMap;
use distkv_core::{DeviceId, Entry, Value};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Which entry set a key lives in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Partition {
    /// The single entry set of a single-version store
    Shared,
    /// Entries written by one device in a device-collaboration store
    Device(DeviceId),
}

/// A value together with its bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredValue {
    /// The typed value
    pub value: Value,
    /// Store version that wrote it
    pub version: u64,
    /// Device that wrote it
    pub origin: DeviceId,
    /// Write time, milliseconds since the Unix epoch
    pub timestamp: i64,
}

impl StoredValue {
    /// Wrap a value written now by `origin`
    pub fn new(value: Value, version: u64, origin: DeviceId) -> Self {
        Self {
            value,
            version,
            origin,
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    /// Wrap a value with an explicit write time
    pub fn with_timestamp(value: Value, version: u64, origin: DeviceId, timestamp: i64) -> Self {
        Self {
            value,
            version,
            origin,
            timestamp,
        }
    }
}

/// Net effect of one [`ShardedStore::apply_batch`].
///
/// Keys are classified against the state before the batch: keys that were
/// absent are inserts, keys that were present are updates, deletes carry
/// the value they removed. Deletes of absent keys are not reported.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    /// Newly created entries
    pub inserted: Vec<Entry>,
    /// Overwritten entries, with their new value
    pub updated: Vec<Entry>,
    /// Removed entries, with the value they held
    pub deleted: Vec<Entry>,
}

impl BatchOutcome {
    /// True if the batch changed nothing
    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }

    /// Number of changed entries
    pub fn len(&self) -> usize {
        self.inserted.len() + self.updated.len() + self.deleted.len()
    }
}

/// Per-partition shard
#[derive(Debug, Default)]
pub struct Shard {
    pub(crate) data: FxHashMap<String, StoredValue>,
}

impl Shard {
    /// Create a new empty shard
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries in this shard
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if shard is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Sharded storage for one store
///
/// # Example
///
/// ```
/// use distkv_core::{DeviceId, Value};
/// use distkv_storage::{Partition, ShardedStore, StoredValue};
///
/// let store = ShardedStore::new();
/// let me = DeviceId::generate();
/// let v = store.next_version();
/// store.apply_batch(
///     &Partition::Shared,
///     vec![("k".into(), StoredValue::new(Value::from(1i64), v, me))],
///     &[],
/// );
/// assert!(store.get(&Partition::Shared, "k").is_some());
/// ```
pub struct ShardedStore {
    shards: DashMap<Partition, Shard>,
    version: AtomicU64,
}

impl ShardedStore {
    /// Create new sharded store
    pub fn new() -> Self {
        Self {
            shards: DashMap::new(),
            version: AtomicU64::new(0),
        }
    }

    /// Get current version
    #[inline]
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Increment version and return new value
    #[inline]
    pub fn next_version(&self) -> u64 {
        self.version.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Set version (used when loading a snapshot)
    pub fn set_version(&self, version: u64) {
        self.version.store(version, Ordering::Release);
    }

    /// Number of non-empty partitions
    pub fn partition_count(&self) -> usize {
        self.shards.len()
    }

    /// Total number of entries across all partitions
    pub fn total_entries(&self) -> usize {
        self.shards.iter().map(|s| s.value().len()).sum()
    }

    /// Get a value by key
    #[inline]
    pub fn get(&self, partition: &Partition, key: &str) -> Option<StoredValue> {
        self.shards
            .get(partition)
            .and_then(|shard| shard.data.get(key).cloned())
    }

    /// Check if a key exists
    #[inline]
    pub fn contains(&self, partition: &Partition, key: &str) -> bool {
        self.shards
            .get(partition)
            .map(|shard| shard.data.contains_key(key))
            .unwrap_or(false)
    }

    /// Apply writes then deletes to one partition atomically.
    ///
    /// A key appearing more than once in `writes` is classified against the
    /// state before the batch and reported once, with its last value.
    pub fn apply_batch(
        &self,
        partition: &Partition,
        writes: Vec<(String, StoredValue)>,
        deletes: &[String],
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        if writes.is_empty() && deletes.is_empty() {
            return outcome;
        }

        let mut shard = self.shards.entry(partition.clone()).or_default();
        let mut seen: FxHashMap<String, bool> = FxHashMap::default();
        let mut order: Vec<String> = Vec::with_capacity(writes.len());

        for (key, stored) in writes {
            let existed = shard.data.insert(key.clone(), stored).is_some();
            if !seen.contains_key(&key) {
                seen.insert(key.clone(), existed);
                order.push(key);
            }
        }
        for key in order {
            let Some(stored) = shard.data.get(&key) else {
                continue;
            };
            let entry = Entry::new(key.clone(), stored.value.clone());
            if seen.get(&key).copied().unwrap_or(false) {
                outcome.updated.push(entry);
            } else {
                outcome.inserted.push(entry);
            }
        }

        for key in deletes {
            if let Some(old) = shard.data.remove(key) {
                outcome.deleted.push(Entry::new(key.clone(), old.value));
            }
        }

        let empty = shard.is_empty();
        drop(shard);
        if empty {
            self.shards.remove_if(partition, |_, s| s.is_empty());
        }
        outcome
    }

    /// List entries of a partition whose key starts with `prefix`, sorted
    /// by key. An empty prefix lists the whole partition.
    pub fn list_by_prefix(&self, partition: &Partition, prefix: &str) -> Vec<(String, StoredValue)> {
        self.shards
            .get(partition)
            .map(|shard| {
                let mut results: Vec<_> = shard
                    .data
                    .iter()
                    .filter(|(k, _)| k.starts_with(prefix))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                results.sort_by(|(a, _), (b, _)| a.cmp(b));
                results
            })
            .unwrap_or_default()
    }

    /// List entries across every partition whose key starts with `prefix`,
    /// sorted by partition then key.
    pub fn list_all_by_prefix(&self, prefix: &str) -> Vec<(Partition, String, StoredValue)> {
        let mut results: Vec<_> = self
            .shards
            .iter()
            .flat_map(|shard| {
                let partition = shard.key().clone();
                shard
                    .data
                    .iter()
                    .filter(|(k, _)| k.starts_with(prefix))
                    .map(|(k, v)| (partition.clone(), k.clone(), v.clone()))
                    .collect::<Vec<_>>()
            })
            .collect();
        results.sort_by(|(pa, ka, _), (pb, kb, _)| pa.cmp(pb).then_with(|| ka.cmp(kb)));
        results
    }

    /// List entries written by `origin` in a partition, sorted by key.
    pub fn list_by_origin(&self, partition: &Partition, origin: &DeviceId) -> Vec<(String, StoredValue)> {
        let mut all = self.list_by_prefix(partition, "");
        all.retain(|(_, v)| &v.origin == origin);
        all
    }

    /// True if any entry in any partition was written by `origin`
    pub fn has_origin(&self, origin: &DeviceId) -> bool {
        self.shards
            .iter()
            .any(|shard| shard.data.values().any(|v| &v.origin == origin))
    }

    /// Remove every entry written by `origin`, returning the removed
    /// entries per partition.
    pub fn remove_by_origin(&self, origin: &DeviceId) -> Vec<(Partition, Vec<Entry>)> {
        let partitions: Vec<Partition> = self.shards.iter().map(|s| s.key().clone()).collect();
        let mut removed = Vec::new();
        for partition in partitions {
            let keys: Vec<String> = self
                .list_by_origin(&partition, origin)
                .into_iter()
                .map(|(k, _)| k)
                .collect();
            if keys.is_empty() {
                continue;
            }
            let outcome = self.apply_batch(&partition, Vec::new(), &keys);
            if !outcome.deleted.is_empty() {
                removed.push((partition, outcome.deleted));
            }
        }
        removed
    }

    /// Partitions that currently hold data
    pub fn partitions(&self) -> Vec<Partition> {
        let mut partitions: Vec<Partition> = self.shards.iter().map(|s| s.key().clone()).collect();
        partitions.sort();
        partitions
    }

    /// Remove all data of a partition. Returns true if it held data.
    pub fn clear_partition(&self, partition: &Partition) -> bool {
        self.shards.remove(partition).is_some()
    }

    /// Copy every entry out, for persistence.
    pub fn export(&self) -> Vec<(Partition, String, StoredValue)> {
        self.list_all_by_prefix("")
    }

    /// Replace the contents with previously exported entries.
    pub fn import(&self, entries: Vec<(Partition, String, StoredValue)>, version: u64) {
        self.shards.clear();
        for (partition, key, stored) in entries {
            self.shards
                .entry(partition)
                .or_default()
                .data
                .insert(key, stored);
        }
        self.set_version(version);
    }
}

impl Default for ShardedStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ShardedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardedStore")
            .field("partition_count", &self.partition_count())
            .field("version", &self.version())
            .field("total_entries", &self.total_entries())
            .finish()
    }
}
