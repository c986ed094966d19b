//! Typed store handles
//!
//! The operations shared by both store types live on the [`KvStore`]
//! trait. Reads differ in how they are scoped and live on the concrete
//! types.
//!
//! ## Desugaring
//!
//! | API | Engine |
//! |-----|--------|
//! | `SingleKvStore::get(key)` | `get(None, key)` |
//! | `DeviceKvStore::get(device, key)` | `get(Some(device), key)` |
//! | `SingleKvStore::get_entries(prefix)` | `get_entries(None, prefix)` |
//! | `DeviceKvStore::get_entries(device, prefix)` | `get_entries(Some(device), prefix)` |
//! | `sync(devices, mode)` | `sync(devices, mode, None)`, task detached |
//! | `sync_wait(devices, mode, delay)` | `sync(devices, mode, delay).await` |

use async_trait::async_trait;
use distkv_core::{DeviceId, Entry, Error, KvStoreType, Result, SecurityLevel, SubscribeType, SyncMode, Value};
use distkv_engine::{DataChangeListener, Query, ResultSet, SyncCompleteListener};
use tracing::debug;

/// Operations common to every store type
///
/// All methods are async; failures are returned as `Err`, never panics.
#[async_trait]
pub trait KvStore: Send + Sync + Sized {
    /// Store type this handle serves
    const TYPE: KvStoreType;

    /// Wrap an engine handle
    fn from_engine(handle: distkv_engine::KvStore) -> Self;

    /// Underlying engine handle
    fn engine(&self) -> &distkv_engine::KvStore;

    /// Store id
    fn store_id(&self) -> &str {
        self.engine().store_id()
    }

    /// Store a value
    async fn put(&self, key: &str, value: Value) -> Result<()> {
        self.engine().put(key, value)
    }

    /// Remove a key; absent keys are not an error
    async fn delete(&self, key: &str) -> Result<()> {
        self.engine().delete(key)
    }

    /// Store several values all-or-nothing
    async fn put_batch(&self, entries: Vec<Entry>) -> Result<()> {
        self.engine().put_batch(entries)
    }

    /// Remove several keys
    async fn delete_batch(&self, keys: Vec<String>) -> Result<()> {
        self.engine().delete_batch(keys)
    }

    /// Open a transaction
    async fn start_transaction(&self) -> Result<()> {
        self.engine().start_transaction()
    }

    /// Commit the open transaction
    async fn commit(&self) -> Result<()> {
        self.engine().commit()
    }

    /// Discard the open transaction
    async fn rollback(&self) -> Result<()> {
        self.engine().rollback()
    }

    /// Close a result set created through this handle
    async fn close_result_set(&self, result_set: &ResultSet) -> Result<()> {
        self.engine().close_result_set(result_set)
    }

    /// Subscribe to `dataChange`
    fn on_data_change(&self, filter: SubscribeType, listener: DataChangeListener) -> Result<()> {
        self.engine().on_data_change(filter, listener)
    }

    /// Unsubscribe from `dataChange`
    fn off_data_change(&self, listener: Option<&DataChangeListener>) -> Result<()> {
        self.engine().off_data_change(listener)
    }

    /// Subscribe to `syncComplete`
    fn on_sync_complete(&self, listener: SyncCompleteListener) -> Result<()> {
        self.engine().on_sync_complete(listener)
    }

    /// Unsubscribe from `syncComplete`
    fn off_sync_complete(&self, listener: Option<&SyncCompleteListener>) -> Result<()> {
        self.engine().off_sync_complete(listener)
    }

    /// Start a sync; the outcome is reported through `syncComplete`
    fn sync(&self, device_ids: &[String], mode: SyncMode) -> Result<()> {
        self.sync_with_delay(device_ids, mode, None)
    }

    /// Start a sync with an allowed delay
    fn sync_with_delay(&self, device_ids: &[String], mode: SyncMode, allowed_delay_ms: Option<u32>) -> Result<()> {
        let task = self.engine().sync(device_ids, mode, allowed_delay_ms)?;
        debug!(store = %self.store_id(), "sync detached");
        drop(task);
        Ok(())
    }

    /// Sync and wait for the per-device statuses
    async fn sync_wait(
        &self,
        device_ids: &[String],
        mode: SyncMode,
        allowed_delay_ms: Option<u32>,
    ) -> Result<Vec<(String, i32)>> {
        let task = self.engine().sync(device_ids, mode, allowed_delay_ms)?;
        task.await
            .map_err(|e| Error::Internal(format!("sync task failed: {}", e)))
    }

    /// Turn sync on or off
    async fn enable_sync(&self, enabled: bool) -> Result<()> {
        self.engine().enable_sync(enabled)
    }

    /// Set the sync labels
    async fn set_sync_range(&self, local_labels: Vec<String>, remote_support_labels: Vec<String>) -> Result<()> {
        self.engine().set_sync_range(local_labels, remote_support_labels)
    }

    /// Set the delay used when `sync` is called without one
    async fn set_sync_param(&self, default_allowed_delay_ms: u32) -> Result<()> {
        self.engine().set_sync_param(default_allowed_delay_ms)
    }

    /// Remove every entry written by a device
    async fn remove_device_data(&self, device_id: &str) -> Result<()> {
        self.engine().remove_device_data(device_id)
    }

    /// Security level fixed at creation
    async fn get_security_level(&self) -> Result<SecurityLevel> {
        self.engine().get_security_level()
    }
}

/// Handle onto a single-version store
#[derive(Debug, Clone)]
pub struct SingleKvStore {
    inner: distkv_engine::KvStore,
}

impl KvStore for SingleKvStore {
    const TYPE: KvStoreType = KvStoreType::SingleVersion;

    fn from_engine(handle: distkv_engine::KvStore) -> Self {
        Self { inner: handle }
    }

    fn engine(&self) -> &distkv_engine::KvStore {
        &self.inner
    }
}

impl SingleKvStore {
    /// Read a value
    pub async fn get(&self, key: &str) -> Result<Value> {
        self.inner.get(None, key)
    }

    /// Entries whose key starts with `prefix`
    pub async fn get_entries(&self, prefix: &str) -> Result<Vec<Entry>> {
        self.inner.get_entries(None, prefix)
    }

    /// Entries matching a query
    pub async fn get_entries_by_query(&self, query: &Query) -> Result<Vec<Entry>> {
        self.inner.get_entries_by_query(None, query)
    }

    /// Result set over entries whose key starts with `prefix`
    pub async fn get_result_set(&self, prefix: &str) -> Result<ResultSet> {
        self.inner.get_result_set(None, prefix)
    }

    /// Result set over entries matching a query
    pub async fn get_result_set_by_query(&self, query: &Query) -> Result<ResultSet> {
        self.inner.get_result_set_by_query(None, query)
    }

    /// Number of entries matching a query
    pub async fn get_result_size(&self, query: &Query) -> Result<usize> {
        self.inner.get_result_size(None, query)
    }
}

/// Handle onto a device-collaboration store
#[derive(Debug, Clone)]
pub struct DeviceKvStore {
    inner: distkv_engine::KvStore,
}

impl KvStore for DeviceKvStore {
    const TYPE: KvStoreType = KvStoreType::DeviceCollaboration;

    fn from_engine(handle: distkv_engine::KvStore) -> Self {
        Self { inner: handle }
    }

    fn engine(&self) -> &distkv_engine::KvStore {
        &self.inner
    }
}

fn device(id: &str) -> Result<DeviceId> {
    DeviceId::new(id)
}

fn scope(id: Option<&str>) -> Result<Option<DeviceId>> {
    id.map(device).transpose()
}

impl DeviceKvStore {
    /// Id of this device
    pub fn local_device_id(&self) -> &DeviceId {
        self.inner.local_device_id()
    }

    /// Read a value written by `device_id`
    pub async fn get(&self, device_id: &str, key: &str) -> Result<Value> {
        let d = device(device_id)?;
        self.inner.get(Some(&d), key)
    }

    /// Entries of `device_id` whose key starts with `prefix`
    pub async fn get_entries(&self, device_id: &str, prefix: &str) -> Result<Vec<Entry>> {
        let d = device(device_id)?;
        self.inner.get_entries(Some(&d), prefix)
    }

    /// Entries matching a query, on `device_id` or, when `None`, on the
    /// device the query names (or every device)
    pub async fn get_entries_by_query(&self, device_id: Option<&str>, query: &Query) -> Result<Vec<Entry>> {
        let d = scope(device_id)?;
        self.inner.get_entries_by_query(d.as_ref(), query)
    }

    /// Result set over the entries of `device_id` starting with `prefix`
    pub async fn get_result_set(&self, device_id: &str, prefix: &str) -> Result<ResultSet> {
        let d = device(device_id)?;
        self.inner.get_result_set(Some(&d), prefix)
    }

    /// Result set over entries matching a query
    pub async fn get_result_set_by_query(&self, device_id: Option<&str>, query: &Query) -> Result<ResultSet> {
        let d = scope(device_id)?;
        self.inner.get_result_set_by_query(d.as_ref(), query)
    }

    /// Number of entries matching a query
    pub async fn get_result_size(&self, device_id: Option<&str>, query: &Query) -> Result<usize> {
        let d = scope(device_id)?;
        self.inner.get_result_size(d.as_ref(), query)
    }
}
