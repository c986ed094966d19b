//! Store manager
//!
//! A [`KvManager`] owns every store of one bundle on one device. It opens
//! handles, persists stores when their last handle closes and answers sync
//! requests from peers.
//!
//! Stores stay loaded after their last handle closes; only
//! `delete_kv_store` drops them.

use crate::config::KvManagerConfig;
use crate::notify::Dispatcher;
use crate::store::{KvStore, StoreShared, SyncSettings};
use crate::sync::{
    decode_request, encode_response, status, NoPeers, SyncEndpoint, SyncRequest, SyncResponse,
    SyncTransport,
};
use distkv_core::limits::validate_store_id;
use distkv_core::{DeviceId, Error, Options, Result};
use distkv_durability::{SnapshotData, SnapshotDiscovery, SnapshotReader, SnapshotWriter};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

pub(crate) struct ManagerInner {
    pub(crate) config: KvManagerConfig,
    pub(crate) device_id: DeviceId,
    pub(crate) runtime: tokio::runtime::Handle,
    pub(crate) dispatcher: Dispatcher,
    pub(crate) transport: Arc<dyn SyncTransport>,
    stores: Mutex<FxHashMap<String, Arc<StoreShared>>>,
    next_handle_id: AtomicU64,
}

impl ManagerInner {
    fn store(&self, store_id: &str) -> Option<Arc<StoreShared>> {
        self.stores.lock().get(store_id).cloned()
    }

    fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            enabled: self.config.sync.enabled,
            local_labels: Vec::new(),
            remote_support_labels: Vec::new(),
            default_delay_ms: self.config.sync.default_delay_ms,
        }
    }

    fn new_store(&self, store_id: &str, options: Options) -> StoreShared {
        StoreShared::new(
            &self.config.bundle_name,
            store_id,
            options,
            self.device_id.clone(),
            self.config.limits.clone(),
            self.sync_settings(),
            self.dispatcher.clone(),
        )
    }

    fn handle_request(&self, request: SyncRequest) -> SyncResponse {
        if request.bundle != self.config.bundle_name {
            return SyncResponse::status(status::STORE_NOT_OPEN);
        }
        let Some(shared) = self.store(&request.store_id) else {
            return SyncResponse::status(status::STORE_NOT_OPEN);
        };
        if shared.open_handles.load(Ordering::Acquire) == 0 {
            return SyncResponse::status(status::STORE_NOT_OPEN);
        }
        if !shared.sync_enabled() {
            return SyncResponse::status(status::SYNC_DISABLED);
        }
        if !shared.accepts_labels(&request.remote_support_labels) {
            return SyncResponse::status(status::RANGE_MISMATCH);
        }
        if let Some(entries) = request.push {
            shared.merge_replica(&request.from, entries);
        }
        let entries = if request.pull {
            shared.local_contribution()
        } else {
            Vec::new()
        };
        SyncResponse {
            status: status::SUCCESS,
            entries,
        }
    }
}

impl SyncEndpoint for ManagerInner {
    fn handle_frame(&self, frame: &[u8]) -> Vec<u8> {
        let response = match decode_request(frame) {
            Ok(request) => {
                debug!(
                    store = %request.store_id,
                    from = %request.from,
                    pull = request.pull,
                    "sync request"
                );
                self.handle_request(request)
            }
            Err(e) => {
                warn!(error = %e, "undecodable sync request");
                SyncResponse::status(status::TRANSPORT_FAILURE)
            }
        };
        // A status-only response always encodes; an empty frame reads as a
        // transport failure on the sender.
        encode_response(&response).unwrap_or_default()
    }
}

impl Drop for ManagerInner {
    fn drop(&mut self) {
        self.transport.detach(&self.device_id);
    }
}

/// Manager of the stores of one bundle
///
/// Must be created inside a tokio runtime: notifications and syncs run as
/// tasks on it.
#[derive(Clone)]
pub struct KvManager {
    inner: Arc<ManagerInner>,
}

impl std::fmt::Debug for KvManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvManager")
            .field("bundle", &self.inner.config.bundle_name)
            .field("device", &self.inner.device_id)
            .finish()
    }
}

impl KvManager {
    /// Create a manager that has no peers
    pub fn new(config: KvManagerConfig) -> Result<Self> {
        Self::with_transport(config, Arc::new(NoPeers))
    }

    /// Create a manager reachable through `transport`
    pub fn with_transport(config: KvManagerConfig, transport: Arc<dyn SyncTransport>) -> Result<Self> {
        config.validate()?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| Error::invalid_state("KvManager must be created inside a tokio runtime"))?;
        let dispatcher = Dispatcher::spawn(&runtime);
        let device_id = DeviceId::generate();
        let inner = Arc::new(ManagerInner {
            config,
            device_id,
            runtime,
            dispatcher,
            transport,
            stores: Mutex::new(FxHashMap::default()),
            next_handle_id: AtomicU64::new(1),
        });
        let weak: Weak<ManagerInner> = Arc::downgrade(&inner);
        let endpoint: Weak<dyn SyncEndpoint> = weak;
        inner.transport.attach(&inner.device_id, endpoint);
        info!(
            bundle = %inner.config.bundle_name,
            device = %inner.device_id,
            persistent = inner.config.data_dir.is_some(),
            "kv manager created"
        );
        Ok(Self { inner })
    }

    /// Bundle this manager serves
    pub fn bundle_name(&self) -> &str {
        &self.inner.config.bundle_name
    }

    /// Id of this device
    pub fn local_device_id(&self) -> &DeviceId {
        &self.inner.device_id
    }

    /// Configuration in use
    pub fn config(&self) -> &KvManagerConfig {
        &self.inner.config
    }

    /// Wait until every notification queued so far has been delivered
    pub async fn flush_notifications(&self) {
        self.inner.dispatcher.flush().await;
    }

    fn snapshot_path(&self, store_id: &str) -> Option<PathBuf> {
        self.inner.config.data_dir.as_ref().map(|dir| {
            SnapshotDiscovery::store_path(dir, &self.inner.config.bundle_name, store_id)
        })
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        self.inner
            .runtime
            .spawn_blocking(f)
            .await
            .map_err(|e| Error::Internal(format!("blocking task failed: {}", e)))?
    }

    /// Must be called with `stores` locked so a delete cannot race the count
    fn open_handle(&self, shared: Arc<StoreShared>) -> KvStore {
        shared.open_handles.fetch_add(1, Ordering::AcqRel);
        let id = self.inner.next_handle_id.fetch_add(1, Ordering::Relaxed);
        KvStore::new(id, shared, Arc::clone(&self.inner))
    }

    /// Open (or create) a store and return a new handle to it
    pub async fn get_kv_store(&self, store_id: &str, options: Options) -> Result<KvStore> {
        validate_store_id(store_id)?;
        options.validate()?;

        if let Some(handle) = self.open_loaded(store_id, &options)? {
            return Ok(handle);
        }

        let loaded = match self.snapshot_path(store_id) {
            Some(path) => self.blocking(move || Ok(SnapshotReader::read(&path)?)).await?,
            None => None,
        };

        let shared = match loaded {
            Some(snapshot) => {
                if snapshot.options.kv_store_type != options.kv_store_type {
                    return Err(Error::InvalidArgument(format!(
                        "store '{}' exists as {:?}",
                        store_id, snapshot.options.kv_store_type
                    )));
                }
                let shared = self.inner.new_store(store_id, snapshot.options.clone());
                let entries = snapshot.entries.len();
                shared.restore(snapshot);
                info!(store = %store_id, entries, "loaded store snapshot");
                shared
            }
            None if options.create_if_missing => {
                info!(store = %store_id, kind = ?options.kv_store_type, "created store");
                self.inner.new_store(store_id, options.clone())
            }
            None => {
                return Err(Error::NotFound(format!("store '{}'", store_id)));
            }
        };

        let mut stores = self.inner.stores.lock();
        let shared = Arc::clone(
            stores
                .entry(store_id.to_string())
                .or_insert_with(|| Arc::new(shared)),
        );
        if shared.options.kv_store_type != options.kv_store_type {
            return Err(Error::InvalidArgument(format!(
                "store '{}' is open as {:?}",
                store_id, shared.options.kv_store_type
            )));
        }
        Ok(self.open_handle(shared))
    }

    fn open_loaded(&self, store_id: &str, options: &Options) -> Result<Option<KvStore>> {
        let stores = self.inner.stores.lock();
        let Some(shared) = stores.get(store_id).cloned() else {
            return Ok(None);
        };
        if shared.options.kv_store_type != options.kv_store_type {
            return Err(Error::InvalidArgument(format!(
                "store '{}' is open as {:?}",
                store_id, shared.options.kv_store_type
            )));
        }
        Ok(Some(self.open_handle(shared)))
    }

    fn check_bundle(&self, bundle: &str) -> Result<()> {
        if bundle != self.inner.config.bundle_name {
            return Err(Error::InvalidArgument(format!(
                "bundle '{}' is not served by this manager",
                bundle
            )));
        }
        Ok(())
    }

    /// Close a handle; persist the store when it was the last one
    pub async fn close_kv_store(&self, bundle: &str, store_id: &str, store: &KvStore) -> Result<()> {
        self.check_bundle(bundle)?;
        if store.store_id() != store_id {
            return Err(Error::InvalidArgument(format!(
                "handle belongs to store '{}', not '{}'",
                store.store_id(),
                store_id
            )));
        }
        let registered = self
            .inner
            .store(store_id)
            .map_or(false, |shared| Arc::ptr_eq(&shared, store.shared()));
        if !registered {
            return Err(Error::InvalidArgument(format!(
                "handle does not belong to an open store '{}'",
                store_id
            )));
        }

        let remaining = {
            let _stores = self.inner.stores.lock();
            store.close_handle()?
        };
        debug!(store = %store_id, handle = store.handle_id(), remaining, "closed store handle");

        if remaining == 0 {
            if let Some(path) = self.snapshot_path(store_id) {
                let data: SnapshotData = store.shared().snapshot_data();
                let entries = data.entries.len();
                self.blocking(move || Ok(SnapshotWriter::write(&path, &data)?))
                    .await?;
                info!(store = %store_id, entries, "persisted store");
            }
        }
        Ok(())
    }

    /// Delete a store that has no open handles
    pub async fn delete_kv_store(&self, bundle: &str, store_id: &str) -> Result<()> {
        self.check_bundle(bundle)?;
        validate_store_id(store_id)?;
        let in_memory = {
            let mut stores = self.inner.stores.lock();
            match stores.get(store_id) {
                Some(shared) if shared.open_handles.load(Ordering::Acquire) > 0 => {
                    return Err(Error::InvalidState(format!(
                        "store '{}' still has open handles",
                        store_id
                    )));
                }
                Some(_) => {
                    stores.remove(store_id);
                    true
                }
                None => false,
            }
        };
        let on_disk = match self.inner.config.data_dir.clone() {
            Some(dir) => {
                let bundle = bundle.to_string();
                let id = store_id.to_string();
                self.blocking(move || Ok(SnapshotDiscovery::remove(&dir, &bundle, &id)?))
                    .await?
            }
            None => false,
        };
        if !in_memory && !on_disk {
            return Err(Error::NotFound(format!("store '{}'", store_id)));
        }
        info!(store = %store_id, "deleted store");
        Ok(())
    }

    /// Ids of every store of the bundle, loaded or persisted
    pub async fn get_all_kv_store_id(&self, bundle: &str) -> Result<Vec<String>> {
        self.check_bundle(bundle)?;
        let mut ids: BTreeSet<String> = self.inner.stores.lock().keys().cloned().collect();
        if let Some(dir) = self.inner.config.data_dir.clone() {
            let bundle = bundle.to_string();
            let persisted = self
                .blocking(move || Ok(SnapshotDiscovery::list_store_ids(&dir, &bundle)?))
                .await?;
            ids.extend(persisted);
        }
        Ok(ids.into_iter().collect())
    }
}
