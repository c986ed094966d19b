//! Transaction manager for coordinating commit operations
//!
//! Every mutation of a store, whether a single put, a batch, a committed
//! transaction or replicated data from a peer, goes through
//! [`TransactionManager`]. Applying under one commit lock gives each
//! mutation a single version and makes it all-or-nothing for readers.
//!
//! ## Commit Sequence
//!
//! ```text
//! 1. Acquire commit lock
//! 2. Check the transaction is Active, take its buffer
//! 3. Allocate commit version
//! 4. Apply writes then deletes to the partition's shard
//! 5. Mark Committed, release lock
//! 6. Return the version and the net change
//! ```

use crate::{CommitError, TransactionContext, TransactionStatus, WriteSet};
use distkv_core::DeviceId;
use distkv_storage::{BatchOutcome, Partition, ShardedStore, StoredValue};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Result of applying one mutation
#[derive(Debug, Clone, Default)]
pub struct Applied {
    /// Version assigned to every write of the mutation
    pub version: u64,
    /// Net change produced
    pub outcome: BatchOutcome,
}

/// Serializes mutations of one store.
///
/// # Thread Safety
///
/// The commit lock is held from version allocation until the shard is
/// updated, so versions are applied in allocation order and no reader can
/// see part of a batch.
pub struct TransactionManager {
    next_txn_id: AtomicU64,
    commit_lock: Mutex<()>,
}

impl TransactionManager {
    /// Create a new transaction manager
    pub fn new() -> Self {
        TransactionManager {
            next_txn_id: AtomicU64::new(1),
            commit_lock: Mutex::new(()),
        }
    }

    /// Allocate next transaction ID
    pub fn next_txn_id(&self) -> u64 {
        self.next_txn_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Open a transaction
    pub fn begin(&self) -> TransactionContext {
        TransactionContext::new(self.next_txn_id())
    }

    /// Commit a transaction atomically.
    ///
    /// An empty buffer commits without touching storage and yields an
    /// empty outcome.
    pub fn commit(
        &self,
        txn: &mut TransactionContext,
        store: &ShardedStore,
        partition: &Partition,
        origin: &DeviceId,
    ) -> Result<Applied, CommitError> {
        let _commit_guard = self.commit_lock.lock();

        if !txn.is_active() {
            return Err(CommitError::InvalidState(format!(
                "transaction {} is {:?}",
                txn.txn_id, txn.status
            )));
        }
        let pending = txn.take_pending();
        let applied = Self::apply_locked(store, partition, pending, origin);
        txn.status = TransactionStatus::Committed;

        tracing::debug!(
            txn_id = txn.txn_id,
            version = applied.version,
            changes = applied.outcome.len(),
            "transaction committed"
        );
        Ok(applied)
    }

    /// Explicitly abort a transaction
    pub fn abort(&self, txn: &mut TransactionContext, reason: impl Into<String>) -> Result<(), CommitError> {
        txn.mark_aborted(reason)
    }

    /// Apply a write set outside any transaction.
    pub fn apply(
        &self,
        store: &ShardedStore,
        partition: &Partition,
        writes: WriteSet,
        origin: &DeviceId,
    ) -> Applied {
        let _commit_guard = self.commit_lock.lock();
        Self::apply_locked(store, partition, writes, origin)
    }

    /// Apply values that already carry their origin and write time, as
    /// received from a peer.
    pub fn apply_replica(
        &self,
        store: &ShardedStore,
        partition: &Partition,
        writes: Vec<(String, StoredValue)>,
        deletes: &[String],
    ) -> Applied {
        let _commit_guard = self.commit_lock.lock();
        let version = store.next_version();
        let writes = writes
            .into_iter()
            .map(|(k, mut v)| {
                v.version = version;
                (k, v)
            })
            .collect();
        let outcome = store.apply_batch(partition, writes, deletes);
        Applied { version, outcome }
    }

    /// Remove every entry written by `origin`.
    pub fn remove_origin(&self, store: &ShardedStore, origin: &DeviceId) -> Vec<(Partition, BatchOutcome)> {
        let _commit_guard = self.commit_lock.lock();
        store
            .remove_by_origin(origin)
            .into_iter()
            .map(|(partition, deleted)| {
                (
                    partition,
                    BatchOutcome {
                        deleted,
                        ..BatchOutcome::default()
                    },
                )
            })
            .collect()
    }

    fn apply_locked(
        store: &ShardedStore,
        partition: &Partition,
        writes: WriteSet,
        origin: &DeviceId,
    ) -> Applied {
        if writes.is_empty() {
            return Applied {
                version: store.version(),
                outcome: BatchOutcome::default(),
            };
        }
        let version = store.next_version();
        let (puts, deletes) = writes.into_parts();
        let puts = puts
            .into_iter()
            .map(|(k, v)| (k, StoredValue::new(v, version, origin.clone())))
            .collect();
        let outcome = store.apply_batch(partition, puts, &deletes);
        Applied { version, outcome }
    }
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use distkv_core::{Entry, Value};
    use std::sync::Arc;

    fn me() -> DeviceId {
        DeviceId::new("local").unwrap()
    }

    #[test]
    fn test_commit_applies_all_with_one_version() {
        let store = ShardedStore::new();
        let manager = TransactionManager::new();
        let mut txn = manager.begin();
        txn.put("a", Value::Integer(1)).unwrap();
        txn.put("b", Value::Integer(2)).unwrap();

        let applied = manager
            .commit(&mut txn, &store, &Partition::Shared, &me())
            .unwrap();
        assert_eq!(applied.version, 1);
        assert_eq!(applied.outcome.inserted.len(), 2);
        assert_eq!(store.get(&Partition::Shared, "a").unwrap().version, 1);
        assert_eq!(store.get(&Partition::Shared, "b").unwrap().version, 1);
        assert_eq!(txn.status, TransactionStatus::Committed);
    }

    #[test]
    fn test_commit_twice_fails() {
        let store = ShardedStore::new();
        let manager = TransactionManager::new();
        let mut txn = manager.begin();
        manager
            .commit(&mut txn, &store, &Partition::Shared, &me())
            .unwrap();
        let err = manager
            .commit(&mut txn, &store, &Partition::Shared, &me())
            .unwrap_err();
        assert!(matches!(err, CommitError::InvalidState(_)));
    }

    #[test]
    fn test_empty_commit_changes_nothing() {
        let store = ShardedStore::new();
        let manager = TransactionManager::new();
        let mut txn = manager.begin();
        let applied = manager
            .commit(&mut txn, &store, &Partition::Shared, &me())
            .unwrap();
        assert!(applied.outcome.is_empty());
        assert_eq!(store.version(), 0);
    }

    #[test]
    fn test_abort_leaves_store_untouched() {
        let store = ShardedStore::new();
        let manager = TransactionManager::new();
        let mut txn = manager.begin();
        txn.put("a", Value::from("x")).unwrap();
        manager.abort(&mut txn, "rollback").unwrap();
        assert_eq!(store.total_entries(), 0);
    }

    #[test]
    fn test_apply_replica_keeps_origin_and_timestamp() {
        let store = ShardedStore::new();
        let manager = TransactionManager::new();
        let peer = DeviceId::new("peer").unwrap();
        let applied = manager.apply_replica(
            &store,
            &Partition::Shared,
            vec![(
                "k".into(),
                StoredValue::with_timestamp(Value::Boolean(true), 0, peer.clone(), 42),
            )],
            &[],
        );
        assert_eq!(applied.outcome.inserted, vec![Entry::new("k", true)]);
        let stored = store.get(&Partition::Shared, "k").unwrap();
        assert_eq!(stored.origin, peer);
        assert_eq!(stored.timestamp, 42);
        assert_eq!(stored.version, applied.version);
    }

    #[test]
    fn test_concurrent_batches_are_serialized() {
        use std::thread;
        let store = Arc::new(ShardedStore::new());
        let manager = Arc::new(TransactionManager::new());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let store = Arc::clone(&store);
                let manager = Arc::clone(&manager);
                thread::spawn(move || {
                    for i in 0..25 {
                        let mut ws = WriteSet::new();
                        ws.put(format!("t{}-{}", t, i), Value::Integer(i));
                        manager.apply(&store, &Partition::Shared, ws, &me());
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.version(), 100);
        assert_eq!(store.total_entries(), 100);
    }
}
