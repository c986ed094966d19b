//! Store engine
//!
//! [`StoreShared`] holds everything one store owns: its entries, commit
//! serialization, listeners and sync settings. Every handle returned by
//! `get_kv_store` for the same store id points at the same `StoreShared`.
//!
//! [`KvStore`] is a handle. It carries the per-handle state: whether it is
//! closed, its open transaction and the result sets it created.
//!
//! ## Read scope
//!
//! Reads take an explicit `Option<&DeviceId>`:
//!
//! | Store type | `None` | `Some(device)` |
//! |------------|--------|----------------|
//! | single-version | the shared entry set | InvalidArgument |
//! | device-collaboration | InvalidArgument (queries: every device) | that device's entries |

use crate::manager::ManagerInner;
use crate::notify::{DataChangeListener, Dispatcher, ListenerRegistry, SyncCompleteListener};
use crate::query::{CompiledQuery, Query};
use crate::result_set::ResultSet;
use crate::sync::{
    decode_response, encode_request, status, validate_delay, ReplicaEntry, SyncRequest,
    TransportError,
};
use distkv_concurrency::{Applied, TransactionContext, TransactionManager, WriteSet};
use distkv_core::limits::{validate_key, MAX_KEY_LENGTH, MAX_KEY_LENGTH_DEVICE};
use distkv_core::{
    ChangeNotification, DeviceId, Entry, Error, KvStoreType, Limits, Options, Result,
    SecurityLevel, SubscribeType, SyncMode, Value,
};
use distkv_durability::SnapshotData;
use distkv_storage::{BatchOutcome, Partition, ShardedStore, StoredValue};
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Sync settings of one store
#[derive(Debug, Clone)]
pub(crate) struct SyncSettings {
    pub(crate) enabled: bool,
    pub(crate) local_labels: Vec<String>,
    pub(crate) remote_support_labels: Vec<String>,
    pub(crate) default_delay_ms: u32,
}

/// State shared by every handle of a store
pub(crate) struct StoreShared {
    pub(crate) bundle: String,
    pub(crate) store_id: String,
    pub(crate) options: Options,
    pub(crate) local_device: DeviceId,
    pub(crate) limits: Limits,
    pub(crate) data: ShardedStore,
    pub(crate) txn_manager: TransactionManager,
    pub(crate) listeners: RwLock<ListenerRegistry>,
    pub(crate) sync: Mutex<SyncSettings>,
    pub(crate) open_handles: AtomicUsize,
    mutation_order: Mutex<()>,
    dispatcher: Dispatcher,
}

impl StoreShared {
    pub(crate) fn new(
        bundle: &str,
        store_id: &str,
        options: Options,
        local_device: DeviceId,
        limits: Limits,
        sync: SyncSettings,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            bundle: bundle.to_string(),
            store_id: store_id.to_string(),
            options,
            local_device,
            limits,
            data: ShardedStore::new(),
            txn_manager: TransactionManager::new(),
            listeners: RwLock::new(ListenerRegistry::default()),
            sync: Mutex::new(sync),
            open_handles: AtomicUsize::new(0),
            mutation_order: Mutex::new(()),
            dispatcher,
        }
    }

    pub(crate) fn store_type(&self) -> KvStoreType {
        self.options.kv_store_type
    }

    fn is_device_store(&self) -> bool {
        self.store_type() == KvStoreType::DeviceCollaboration
    }

    fn key_limit(&self) -> usize {
        if self.is_device_store() {
            MAX_KEY_LENGTH_DEVICE
        } else {
            MAX_KEY_LENGTH
        }
    }

    fn validate_key(&self, key: &str) -> Result<()> {
        validate_key(key, self.key_limit())
    }

    fn validate_entry(&self, key: &str, value: &Value) -> Result<()> {
        self.validate_key(key)?;
        self.limits.validate_value(key, value)
    }

    /// Partition local writes go to
    fn local_partition(&self) -> Partition {
        if self.is_device_store() {
            Partition::Device(self.local_device.clone())
        } else {
            Partition::Shared
        }
    }

    /// Partition a peer's writes go to
    fn peer_partition(&self, peer: &DeviceId) -> Partition {
        if self.is_device_store() {
            Partition::Device(peer.clone())
        } else {
            Partition::Shared
        }
    }

    /// Partition a single-key read addresses
    fn read_partition(&self, scope: Option<&DeviceId>) -> Result<Partition> {
        match (self.is_device_store(), scope) {
            (false, None) => Ok(Partition::Shared),
            (false, Some(_)) => Err(Error::invalid_argument(
                "single-version stores are not read by device",
            )),
            (true, Some(device)) => Ok(Partition::Device(device.clone())),
            (true, None) => Err(Error::invalid_argument(
                "device-collaboration stores require a device id",
            )),
        }
    }

    /// Queue a notification; `always` keeps it even when nothing changed
    fn emit(&self, outcome: &BatchOutcome, device: &DeviceId, remote: bool, always: bool) {
        if outcome.is_empty() && !always {
            return;
        }
        let listeners = self.listeners.read().data_change_targets(remote);
        if listeners.is_empty() {
            return;
        }
        let notification = ChangeNotification {
            insert_entries: outcome.inserted.clone(),
            update_entries: outcome.updated.clone(),
            delete_entries: outcome.deleted.clone(),
            device_id: device.clone(),
        };
        self.dispatcher.data_change(listeners, notification);
    }

    /// Apply a local mutation and queue its notification
    fn apply_local(&self, writes: WriteSet) -> Applied {
        let _order = self.mutation_order.lock();
        let applied = self.txn_manager.apply(
            &self.data,
            &self.local_partition(),
            writes,
            &self.local_device,
        );
        self.emit(&applied.outcome, &self.local_device, false, false);
        applied
    }

    /// Commit a transaction and queue its single notification
    fn commit_local(&self, txn: &mut TransactionContext) -> Result<Applied> {
        let _order = self.mutation_order.lock();
        let applied = self.txn_manager.commit(
            txn,
            &self.data,
            &self.local_partition(),
            &self.local_device,
        )?;
        self.emit(&applied.outcome, &self.local_device, false, true);
        Ok(applied)
    }

    /// Entries this device wrote, as sent to peers
    pub(crate) fn local_contribution(&self) -> Vec<ReplicaEntry> {
        self.data
            .list_by_origin(&self.local_partition(), &self.local_device)
            .into_iter()
            .map(|(key, stored)| ReplicaEntry {
                key,
                value: stored.value,
                timestamp: stored.timestamp,
            })
            .collect()
    }

    /// Replace `from`'s contribution with `entries` and queue a remote
    /// notification for the net change.
    ///
    /// In single-version stores a key written by another device is only
    /// overwritten if the incoming write is newer (ties broken by device
    /// id).
    pub(crate) fn merge_replica(&self, from: &DeviceId, entries: Vec<ReplicaEntry>) -> BatchOutcome {
        let _order = self.mutation_order.lock();
        let partition = self.peer_partition(from);
        let incoming: FxHashSet<String> = entries.iter().map(|e| e.key.clone()).collect();

        let deletes: Vec<String> = self
            .data
            .list_by_origin(&partition, from)
            .into_iter()
            .map(|(k, _)| k)
            .filter(|k| !incoming.contains(k))
            .collect();

        let mut writes = Vec::new();
        for entry in entries {
            let accept = match self.data.get(&partition, &entry.key) {
                None => true,
                Some(existing) if &existing.origin == from => {
                    existing.value != entry.value || existing.timestamp != entry.timestamp
                }
                Some(existing) => {
                    (entry.timestamp, from) > (existing.timestamp, &existing.origin)
                }
            };
            if accept {
                writes.push((
                    entry.key,
                    StoredValue::with_timestamp(entry.value, 0, from.clone(), entry.timestamp),
                ));
            }
        }

        let applied = self
            .txn_manager
            .apply_replica(&self.data, &partition, writes, &deletes);
        debug!(
            store = %self.store_id,
            from = %from,
            changes = applied.outcome.len(),
            "merged replica"
        );
        self.emit(&applied.outcome, from, true, false);
        applied.outcome
    }

    pub(crate) fn snapshot_data(&self) -> SnapshotData {
        SnapshotData {
            store_id: self.store_id.clone(),
            options: self.options.clone(),
            version: self.data.version(),
            entries: self.data.export(),
        }
    }

    pub(crate) fn restore(&self, snapshot: SnapshotData) {
        self.data.import(snapshot.entries, snapshot.version);
    }

    /// Labels check made by the receiving side of a sync
    pub(crate) fn accepts_labels(&self, sender_remote_labels: &[String]) -> bool {
        let settings = self.sync.lock();
        if sender_remote_labels.is_empty() || settings.local_labels.is_empty() {
            return true;
        }
        sender_remote_labels
            .iter()
            .any(|l| settings.local_labels.contains(l))
    }

    pub(crate) fn sync_enabled(&self) -> bool {
        self.sync.lock().enabled
    }
}

#[derive(Default)]
struct HandleState {
    closed: bool,
    txn: Option<TransactionContext>,
    result_sets: Vec<ResultSet>,
}

struct HandleInner {
    id: u64,
    shared: Arc<StoreShared>,
    manager: Arc<ManagerInner>,
    state: Mutex<HandleState>,
}

/// Handle onto an open store
///
/// Cloning a handle yields the same handle: closing one clone closes all.
#[derive(Clone)]
pub struct KvStore {
    inner: Arc<HandleInner>,
}

impl std::fmt::Debug for KvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvStore")
            .field("store_id", &self.inner.shared.store_id)
            .field("handle", &self.inner.id)
            .field("type", &self.inner.shared.store_type())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl KvStore {
    pub(crate) fn new(id: u64, shared: Arc<StoreShared>, manager: Arc<ManagerInner>) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                id,
                shared,
                manager,
                state: Mutex::new(HandleState::default()),
            }),
        }
    }

    pub(crate) fn shared(&self) -> &Arc<StoreShared> {
        &self.inner.shared
    }

    /// Handle id, unique within the manager
    pub fn handle_id(&self) -> u64 {
        self.inner.id
    }

    /// Store id
    pub fn store_id(&self) -> &str {
        &self.inner.shared.store_id
    }

    /// Store type
    pub fn kv_store_type(&self) -> KvStoreType {
        self.inner.shared.store_type()
    }

    /// Options the store was created with
    pub fn options(&self) -> &Options {
        &self.inner.shared.options
    }

    /// Id of the device this manager runs as
    pub fn local_device_id(&self) -> &DeviceId {
        &self.inner.shared.local_device
    }

    /// True once this handle was closed
    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    fn check_open(state: &HandleState) -> Result<()> {
        if state.closed {
            Err(Error::invalid_state("store handle is closed"))
        } else {
            Ok(())
        }
    }

    fn ensure_open(&self) -> Result<()> {
        Self::check_open(&self.inner.state.lock())
    }

    /// Route a write set into the open transaction, or apply it now.
    fn write(&self, writes: WriteSet) -> Result<()> {
        let mut state = self.inner.state.lock();
        Self::check_open(&state)?;
        if let Some(txn) = state.txn.as_mut() {
            let (puts, deletes) = writes.into_parts();
            for (key, value) in puts {
                txn.put(key, value)?;
            }
            for key in deletes {
                txn.delete(key)?;
            }
            return Ok(());
        }
        drop(state);
        let applied = self.inner.shared.apply_local(writes);
        self.after_local_commit(&applied);
        Ok(())
    }

    fn after_local_commit(&self, applied: &Applied) {
        let shared = &self.inner.shared;
        if applied.outcome.is_empty() || !shared.options.auto_sync || !shared.sync_enabled() {
            return;
        }
        let manager = &self.inner.manager;
        let peers = manager.transport.peers(&manager.device_id);
        if peers.is_empty() {
            return;
        }
        let targets: Vec<String> = peers.iter().map(|p| p.to_string()).collect();
        let manager = Arc::clone(manager);
        let shared = Arc::clone(shared);
        manager.runtime.clone().spawn(async move {
            let results = run_sync(&manager, &shared, &targets, SyncMode::PushOnly).await;
            let failed = results.iter().filter(|(_, s)| *s != status::SUCCESS).count();
            if failed > 0 {
                warn!(store = %shared.store_id, failed, "auto-sync push failed for some peers");
            }
        });
    }

    /// Store a value
    pub fn put(&self, key: &str, value: Value) -> Result<()> {
        self.inner.shared.validate_entry(key, &value)?;
        let mut writes = WriteSet::new();
        writes.put(key, value);
        self.write(writes)
    }

    /// Store several values all-or-nothing
    pub fn put_batch(&self, entries: Vec<Entry>) -> Result<()> {
        let shared = &self.inner.shared;
        shared.limits.validate_batch_len(entries.len())?;
        for entry in &entries {
            shared.validate_entry(&entry.key, &entry.value)?;
        }
        let mut writes = WriteSet::new();
        for entry in entries {
            writes.put(entry.key, entry.value);
        }
        self.write(writes)
    }

    /// Remove a key; absent keys are not an error
    pub fn delete(&self, key: &str) -> Result<()> {
        self.inner.shared.validate_key(key)?;
        let mut writes = WriteSet::new();
        writes.delete(key);
        self.write(writes)
    }

    /// Remove several keys; absent keys are ignored
    pub fn delete_batch(&self, keys: Vec<String>) -> Result<()> {
        let shared = &self.inner.shared;
        shared.limits.validate_batch_len(keys.len())?;
        for key in &keys {
            shared.validate_key(key)?;
        }
        let mut writes = WriteSet::new();
        for key in keys {
            writes.delete(key);
        }
        self.write(writes)
    }

    /// Read a value
    pub fn get(&self, device: Option<&DeviceId>, key: &str) -> Result<Value> {
        self.ensure_open()?;
        let shared = &self.inner.shared;
        shared.validate_key(key)?;
        let partition = shared.read_partition(device)?;
        shared
            .data
            .get(&partition, key)
            .map(|stored| stored.value)
            .ok_or_else(|| match device {
                Some(d) => Error::NotFound(format!("key '{}' on device {}", key, d)),
                None => Error::NotFound(format!("key '{}'", key)),
            })
    }

    fn entries_in(&self, partition: Option<&Partition>, prefix: &str) -> Vec<Entry> {
        let to_entry = |(key, stored): (String, StoredValue)| Entry {
            key,
            value: stored.value,
        };
        match partition {
            Some(p) => self
                .inner
                .shared
                .data
                .list_by_prefix(p, prefix)
                .into_iter()
                .map(to_entry)
                .collect(),
            None => self
                .inner
                .shared
                .data
                .list_all_by_prefix(prefix)
                .into_iter()
                .map(|(_, k, v)| to_entry((k, v)))
                .collect(),
        }
    }

    /// Entries whose key starts with `prefix`, in key order
    pub fn get_entries(&self, device: Option<&DeviceId>, prefix: &str) -> Result<Vec<Entry>> {
        self.ensure_open()?;
        let partition = self.inner.shared.read_partition(device)?;
        Ok(self.entries_in(Some(&partition), prefix))
    }

    fn run_query(&self, device: Option<&DeviceId>, query: &Query) -> Result<Vec<Entry>> {
        self.ensure_open()?;
        let compiled: CompiledQuery = query.compile()?;
        let shared = &self.inner.shared;
        let query_device = compiled.device_id().map(DeviceId::new).transpose()?;
        let partition = if shared.is_device_store() {
            device
                .or(query_device.as_ref())
                .map(|d| Partition::Device(d.clone()))
        } else {
            if device.is_some() || query_device.is_some() {
                return Err(Error::invalid_argument(
                    "single-version stores are not queried by device",
                ));
            }
            Some(Partition::Shared)
        };
        let candidates = self.entries_in(partition.as_ref(), compiled.prefix());
        Ok(compiled.apply(candidates))
    }

    /// Entries matching a query
    pub fn get_entries_by_query(&self, device: Option<&DeviceId>, query: &Query) -> Result<Vec<Entry>> {
        self.run_query(device, query)
    }

    fn register_result_set(&self, entries: Vec<Entry>) -> Result<ResultSet> {
        let mut state = self.inner.state.lock();
        Self::check_open(&state)?;
        let rs = ResultSet::new(entries);
        state.result_sets.push(rs.clone());
        Ok(rs)
    }

    /// Snapshot cursor over entries whose key starts with `prefix`
    pub fn get_result_set(&self, device: Option<&DeviceId>, prefix: &str) -> Result<ResultSet> {
        let entries = self.get_entries(device, prefix)?;
        self.register_result_set(entries)
    }

    /// Snapshot cursor over entries matching a query
    pub fn get_result_set_by_query(&self, device: Option<&DeviceId>, query: &Query) -> Result<ResultSet> {
        let entries = self.run_query(device, query)?;
        self.register_result_set(entries)
    }

    /// Number of entries matching a query
    pub fn get_result_size(&self, device: Option<&DeviceId>, query: &Query) -> Result<usize> {
        Ok(self.run_query(device, query)?.len())
    }

    /// Close a result set created by this handle
    pub fn close_result_set(&self, result_set: &ResultSet) -> Result<()> {
        let mut state = self.inner.state.lock();
        Self::check_open(&state)?;
        let idx = state
            .result_sets
            .iter()
            .position(|rs| rs == result_set)
            .ok_or_else(|| Error::invalid_argument("result set is not open on this store"))?;
        let rs = state.result_sets.swap_remove(idx);
        if !rs.close() {
            return Err(Error::invalid_argument("result set is already closed"));
        }
        Ok(())
    }

    /// Number of result sets this handle holds open
    pub fn open_result_sets(&self) -> usize {
        self.inner.state.lock().result_sets.len()
    }

    /// Open a transaction on this handle
    pub fn start_transaction(&self) -> Result<()> {
        let mut state = self.inner.state.lock();
        Self::check_open(&state)?;
        if state.txn.is_some() {
            return Err(Error::invalid_state("a transaction is already open"));
        }
        state.txn = Some(self.inner.shared.txn_manager.begin());
        Ok(())
    }

    /// Apply the open transaction
    pub fn commit(&self) -> Result<()> {
        let mut state = self.inner.state.lock();
        Self::check_open(&state)?;
        let mut txn = state
            .txn
            .take()
            .ok_or_else(|| Error::invalid_state("no open transaction to commit"))?;
        drop(state);
        let applied = self.inner.shared.commit_local(&mut txn)?;
        self.after_local_commit(&applied);
        Ok(())
    }

    /// Discard the open transaction
    pub fn rollback(&self) -> Result<()> {
        let mut state = self.inner.state.lock();
        Self::check_open(&state)?;
        let mut txn = state
            .txn
            .take()
            .ok_or_else(|| Error::invalid_state("no open transaction to roll back"))?;
        self.inner.shared.txn_manager.abort(&mut txn, "rollback")?;
        Ok(())
    }

    /// True while a transaction is open on this handle
    pub fn in_transaction(&self) -> bool {
        self.inner.state.lock().txn.is_some()
    }

    /// Subscribe to `dataChange`
    pub fn on_data_change(&self, filter: SubscribeType, listener: DataChangeListener) -> Result<()> {
        self.ensure_open()?;
        let added = self
            .inner
            .shared
            .listeners
            .write()
            .add_data_change(self.inner.id, filter, listener);
        if !added {
            debug!(store = %self.store_id(), "dataChange listener already registered");
        }
        Ok(())
    }

    /// Unsubscribe one `dataChange` listener, or all of this handle's
    pub fn off_data_change(&self, listener: Option<&DataChangeListener>) -> Result<()> {
        self.ensure_open()?;
        self.inner
            .shared
            .listeners
            .write()
            .remove_data_change(self.inner.id, listener);
        Ok(())
    }

    /// Subscribe to `syncComplete`
    pub fn on_sync_complete(&self, listener: SyncCompleteListener) -> Result<()> {
        self.ensure_open()?;
        self.inner
            .shared
            .listeners
            .write()
            .add_sync_complete(self.inner.id, listener);
        Ok(())
    }

    /// Unsubscribe one `syncComplete` listener, or all of this handle's
    pub fn off_sync_complete(&self, listener: Option<&SyncCompleteListener>) -> Result<()> {
        self.ensure_open()?;
        self.inner
            .shared
            .listeners
            .write()
            .remove_sync_complete(self.inner.id, listener);
        Ok(())
    }

    /// Start a sync with `device_ids` in the background.
    ///
    /// Argument errors fail here; everything else is reported per device
    /// through `syncComplete`. The returned task resolves to the same
    /// payload and may be dropped.
    pub fn sync(
        &self,
        device_ids: &[String],
        mode: SyncMode,
        allowed_delay_ms: Option<u32>,
    ) -> Result<JoinHandle<Vec<(String, i32)>>> {
        self.ensure_open()?;
        if device_ids.is_empty() {
            return Err(Error::invalid_argument("sync needs at least one device id"));
        }
        if device_ids.iter().any(String::is_empty) {
            return Err(Error::invalid_argument("device id must not be empty"));
        }
        let delay = match allowed_delay_ms {
            Some(delay) => delay,
            None => self.inner.shared.sync.lock().default_delay_ms,
        };
        validate_delay(delay)?;

        let manager = Arc::clone(&self.inner.manager);
        let shared = Arc::clone(&self.inner.shared);
        let targets = device_ids.to_vec();
        debug!(store = %shared.store_id, ?mode, delay, targets = targets.len(), "sync requested");
        Ok(manager.runtime.clone().spawn(async move {
            let results = run_sync(&manager, &shared, &targets, mode).await;
            info!(
                store = %shared.store_id,
                ok = results.iter().filter(|(_, s)| *s == status::SUCCESS).count(),
                total = results.len(),
                "sync finished"
            );
            let listeners = shared.listeners.read().sync_complete_targets();
            manager.dispatcher.sync_complete(listeners, results.clone());
            results
        }))
    }

    /// Turn sync on or off for this store
    pub fn enable_sync(&self, enabled: bool) -> Result<()> {
        self.ensure_open()?;
        self.inner.shared.sync.lock().enabled = enabled;
        Ok(())
    }

    /// Set the labels this store holds and the labels it accepts
    pub fn set_sync_range(&self, local_labels: Vec<String>, remote_support_labels: Vec<String>) -> Result<()> {
        self.ensure_open()?;
        let mut settings = self.inner.shared.sync.lock();
        settings.local_labels = local_labels;
        settings.remote_support_labels = remote_support_labels;
        Ok(())
    }

    /// Set the delay used when `sync` is called without one
    pub fn set_sync_param(&self, default_allowed_delay_ms: u32) -> Result<()> {
        self.ensure_open()?;
        validate_delay(default_allowed_delay_ms)?;
        self.inner.shared.sync.lock().default_delay_ms = default_allowed_delay_ms;
        Ok(())
    }

    /// Remove every entry written by `device_id` from this replica
    pub fn remove_device_data(&self, device_id: &str) -> Result<()> {
        self.ensure_open()?;
        let device = DeviceId::new(device_id)?;
        let shared = &self.inner.shared;
        if device == shared.local_device {
            return Err(Error::invalid_argument(
                "cannot remove the local device's data",
            ));
        }
        let manager = &self.inner.manager;
        let known = shared.data.has_origin(&device)
            || manager.transport.peers(&manager.device_id).contains(&device);
        if !known {
            return Err(Error::NotFound(format!("device {}", device)));
        }
        let _order = shared.mutation_order.lock();
        let removed = shared.txn_manager.remove_origin(&shared.data, &device);
        info!(
            store = %shared.store_id,
            device = %device,
            removed = removed.iter().map(|(_, o)| o.len()).sum::<usize>(),
            "removed device data"
        );
        Ok(())
    }

    /// Security level fixed at creation
    pub fn get_security_level(&self) -> Result<SecurityLevel> {
        self.ensure_open()?;
        Ok(self.inner.shared.options.security_level)
    }

    /// Mark this handle closed and release what it holds.
    /// Returns the number of handles still open on the store.
    pub(crate) fn close_handle(&self) -> Result<usize> {
        let mut state = self.inner.state.lock();
        Self::check_open(&state)?;
        state.closed = true;
        if let Some(mut txn) = state.txn.take() {
            let _ = txn.mark_aborted("store closed");
        }
        for rs in state.result_sets.drain(..) {
            rs.close();
        }
        drop(state);
        let shared = &self.inner.shared;
        shared.listeners.write().remove_handle(self.inner.id);
        let previous = shared.open_handles.fetch_sub(1, Ordering::AcqRel);
        Ok(previous.saturating_sub(1))
    }
}

/// Exchange with each target and merge what comes back.
pub(crate) async fn run_sync(
    manager: &Arc<ManagerInner>,
    shared: &Arc<StoreShared>,
    targets: &[String],
    mode: SyncMode,
) -> Vec<(String, i32)> {
    let mut results = Vec::with_capacity(targets.len());
    let peers = manager.transport.peers(&manager.device_id);
    for target in targets {
        let code = sync_one(manager, shared, target, mode, &peers).await;
        results.push((target.clone(), code));
    }
    results
}

async fn sync_one(
    manager: &Arc<ManagerInner>,
    shared: &Arc<StoreShared>,
    target: &str,
    mode: SyncMode,
    peers: &[DeviceId],
) -> i32 {
    if !shared.sync_enabled() {
        return status::SYNC_DISABLED;
    }
    let Ok(device) = DeviceId::new(target) else {
        return status::DEVICE_UNREACHABLE;
    };
    if device == manager.device_id || !peers.contains(&device) {
        return status::DEVICE_UNREACHABLE;
    }
    let request = SyncRequest {
        bundle: shared.bundle.clone(),
        store_id: shared.store_id.clone(),
        from: manager.device_id.clone(),
        push: mode.pushes().then(|| shared.local_contribution()),
        pull: mode.pulls(),
        remote_support_labels: shared.sync.lock().remote_support_labels.clone(),
    };
    let frame = match encode_request(&request) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(error = %e, "could not encode sync request");
            return status::TRANSPORT_FAILURE;
        }
    };
    let reply = match manager
        .transport
        .exchange(&manager.device_id, &device, frame)
        .await
    {
        Ok(reply) => reply,
        Err(TransportError::Unreachable(_)) => return status::DEVICE_UNREACHABLE,
        Err(e) => {
            warn!(device = %device, error = %e, "sync exchange failed");
            return status::TRANSPORT_FAILURE;
        }
    };
    let response = match decode_response(&reply) {
        Ok(response) => response,
        Err(e) => {
            warn!(device = %device, error = %e, "undecodable sync response");
            return status::TRANSPORT_FAILURE;
        }
    };
    if response.status != status::SUCCESS {
        return response.status;
    }
    if mode.pulls() {
        shared.merge_replica(&device, response.entries);
    }
    status::SUCCESS
}
