//! Store manager
//!
//! ## Desugaring
//!
//! | API | Engine |
//! |-----|--------|
//! | `create_kv_manager(config)` | `KvManager::new(config)` |
//! | `get_kv_store::<T>(id, options)` | type check, then `get_kv_store(id, options)` |
//! | `close_kv_store(bundle, id, &store)` | `close_kv_store(bundle, id, store.engine())` |

use crate::store::KvStore;
use distkv_core::{DeviceId, Error, Options, Result};
use distkv_engine::{KvManagerConfig, SyncTransport};
use std::sync::Arc;

/// Create a manager with no peers
pub async fn create_kv_manager(config: KvManagerConfig) -> Result<KvManager> {
    Ok(KvManager {
        inner: distkv_engine::KvManager::new(config)?,
    })
}

/// Create a manager reachable through `transport`
pub async fn create_kv_manager_with_transport(
    config: KvManagerConfig,
    transport: Arc<dyn SyncTransport>,
) -> Result<KvManager> {
    Ok(KvManager {
        inner: distkv_engine::KvManager::with_transport(config, transport)?,
    })
}

/// Manager of the stores of one bundle
#[derive(Debug, Clone)]
pub struct KvManager {
    inner: distkv_engine::KvManager,
}

impl KvManager {
    /// Underlying engine manager
    pub fn engine(&self) -> &distkv_engine::KvManager {
        &self.inner
    }

    /// Bundle this manager serves
    pub fn bundle_name(&self) -> &str {
        self.inner.bundle_name()
    }

    /// Id of this device
    pub fn local_device_id(&self) -> &DeviceId {
        self.inner.local_device_id()
    }

    /// Open a store as `T`; `options.kv_store_type` must name `T`'s type
    pub async fn get_kv_store<T: KvStore>(&self, store_id: &str, options: Options) -> Result<T> {
        if options.kv_store_type != T::TYPE {
            return Err(Error::InvalidArgument(format!(
                "options request {:?} but the handle type is {:?}",
                options.kv_store_type,
                T::TYPE
            )));
        }
        let handle = self.inner.get_kv_store(store_id, options).await?;
        Ok(T::from_engine(handle))
    }

    /// Close a handle
    pub async fn close_kv_store<T: KvStore>(&self, bundle: &str, store_id: &str, store: &T) -> Result<()> {
        self.inner.close_kv_store(bundle, store_id, store.engine()).await
    }

    /// Delete a closed store
    pub async fn delete_kv_store(&self, bundle: &str, store_id: &str) -> Result<()> {
        self.inner.delete_kv_store(bundle, store_id).await
    }

    /// Ids of every store of the bundle
    pub async fn get_all_kv_store_id(&self, bundle: &str) -> Result<Vec<String>> {
        self.inner.get_all_kv_store_id(bundle).await
    }

    /// Wait until queued notifications have been delivered
    pub async fn flush_notifications(&self) {
        self.inner.flush_notifications().await;
    }
}
