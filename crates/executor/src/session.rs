//! Sessions
//!
//! A [`Session`] owns a manager and the aliases that invocations refer to:
//! store handles bound by `getKVStore`, and result sets bound by
//! `getResultSet`. Every store alias has an inbox recording the
//! notifications its listeners received, so callers without closures can
//! observe `dataChange` and `syncComplete`.

use distkv_core::{ChangeNotification, Error, Result};
use distkv_engine::{DataChangeListener, KvManager, KvStore, ResultSet, SyncCompleteListener};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::command::{Command, EventKind, Invocation};
use crate::handlers;
use crate::Output;

/// Notifications received by one store alias
#[derive(Debug, Default)]
struct Inbox {
    data_changes: usize,
    sync_completes: usize,
    last_notification: Option<ChangeNotification>,
    last_sync: Option<Vec<(String, i32)>>,
}

struct StoreSlot {
    handle: KvStore,
    inbox: Arc<Mutex<Inbox>>,
}

/// Alias table and manager behind an invocation stream
pub struct Session {
    manager: KvManager,
    stores: FxHashMap<String, StoreSlot>,
    result_sets: FxHashMap<String, ResultSet>,
    pending_syncs: Vec<JoinHandle<Vec<(String, i32)>>>,
    next_result_set: u64,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("bundle", &self.manager.bundle_name())
            .field("stores", &self.stores.len())
            .field("result_sets", &self.result_sets.len())
            .finish()
    }
}

impl Session {
    /// Start a session over a manager
    pub fn new(manager: KvManager) -> Self {
        Self {
            manager,
            stores: FxHashMap::default(),
            result_sets: FxHashMap::default(),
            pending_syncs: Vec::new(),
            next_result_set: 1,
        }
    }

    /// The manager this session drives
    pub fn manager(&self) -> &KvManager {
        &self.manager
    }

    /// Engine handle bound to a store alias
    pub fn store(&self, alias: &str) -> Result<&KvStore> {
        self.slot(alias).map(|s| &s.handle)
    }

    /// Result set bound to an alias
    pub fn result_set(&self, alias: &str) -> Result<&ResultSet> {
        self.result_sets
            .get(alias)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown result set '{}'", alias)))
    }

    fn slot(&self, alias: &str) -> Result<&StoreSlot> {
        self.stores
            .get(alias)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown store '{}'", alias)))
    }

    /// Parse and execute an invocation
    pub async fn invoke(&mut self, invocation: &Invocation) -> Result<Output> {
        let command = Command::parse(invocation)?;
        self.execute(command).await
    }

    /// Wait for started syncs and queued notifications
    pub async fn flush(&mut self) {
        for task in self.pending_syncs.drain(..) {
            if let Err(e) = task.await {
                warn!(error = %e, "sync task did not finish");
            }
        }
        self.manager.flush_notifications().await;
    }

    /// Execute a validated command
    pub async fn execute(&mut self, command: Command) -> Result<Output> {
        match command {
            Command::GetKvStore { store_id, options, bind } => {
                let handle = self.manager.get_kv_store(&store_id, options).await?;
                debug!(alias = %bind, store = %store_id, handle = handle.handle_id(), "store bound");
                let slot = StoreSlot {
                    handle,
                    inbox: Arc::new(Mutex::new(Inbox::default())),
                };
                if self.stores.insert(bind.clone(), slot).is_some() {
                    warn!(alias = %bind, "store alias rebound");
                }
                Ok(Output::Store { alias: bind, store_id })
            }
            Command::CloseKvStore { bundle, store_id, store } => {
                let handle = self.slot(&store)?.handle.clone();
                self.manager.close_kv_store(&bundle, &store_id, &handle).await?;
                Ok(Output::Unit)
            }
            Command::DeleteKvStore { bundle, store_id } => {
                self.manager.delete_kv_store(&bundle, &store_id).await?;
                Ok(Output::Unit)
            }
            Command::GetAllKvStoreId { bundle } => {
                Ok(Output::StoreIds(self.manager.get_all_kv_store_id(&bundle).await?))
            }

            Command::Put { store, key, value } => handlers::store::put(self.store(&store)?, &key, value),
            Command::Get { store, device, key } => {
                handlers::store::get(self.store(&store)?, device.as_deref(), &key)
            }
            Command::Delete { store, key } => handlers::store::delete(self.store(&store)?, &key),
            Command::PutBatch { store, entries } => handlers::store::put_batch(self.store(&store)?, entries),
            Command::DeleteBatch { store, keys } => handlers::store::delete_batch(self.store(&store)?, keys),
            Command::GetEntries { store, device, selector } => {
                handlers::store::get_entries(self.store(&store)?, device.as_deref(), &selector)
            }
            Command::GetResultSet { store, device, selector, bind } => {
                let rs = handlers::store::get_result_set(self.store(&store)?, device.as_deref(), &selector)?;
                let alias = match bind {
                    Some(alias) => alias,
                    None => {
                        let alias = format!("rs{}", self.next_result_set);
                        self.next_result_set += 1;
                        alias
                    }
                };
                let count = rs.get_count();
                self.result_sets.insert(alias.clone(), rs);
                Ok(Output::ResultSet { alias, count })
            }
            Command::GetResultSize { store, device, query } => {
                handlers::store::get_result_size(self.store(&store)?, device.as_deref(), &query)
            }
            Command::CloseResultSet { store, result_set } => {
                let rs = self.result_set(&result_set)?.clone();
                self.store(&store)?.close_result_set(&rs)?;
                Ok(Output::Unit)
            }
            Command::StartTransaction { store } => {
                self.store(&store)?.start_transaction()?;
                Ok(Output::Unit)
            }
            Command::Commit { store } => {
                self.store(&store)?.commit()?;
                Ok(Output::Unit)
            }
            Command::Rollback { store } => {
                self.store(&store)?.rollback()?;
                Ok(Output::Unit)
            }
            Command::On { store, event, filter } => {
                let slot = self.slot(&store)?;
                let inbox = Arc::clone(&slot.inbox);
                match event {
                    EventKind::DataChange => {
                        let listener: DataChangeListener = Arc::new(move |n: &ChangeNotification| {
                            let mut inbox = inbox.lock();
                            inbox.data_changes += 1;
                            inbox.last_notification = Some(n.clone());
                        });
                        slot.handle.on_data_change(filter, listener)?;
                    }
                    EventKind::SyncComplete => {
                        let listener: SyncCompleteListener = Arc::new(move |r: &[(String, i32)]| {
                            let mut inbox = inbox.lock();
                            inbox.sync_completes += 1;
                            inbox.last_sync = Some(r.to_vec());
                        });
                        slot.handle.on_sync_complete(listener)?;
                    }
                }
                Ok(Output::Unit)
            }
            Command::Off { store, event } => {
                let handle = self.store(&store)?;
                match event {
                    EventKind::DataChange => handle.off_data_change(None)?,
                    EventKind::SyncComplete => handle.off_sync_complete(None)?,
                }
                Ok(Output::Unit)
            }
            Command::Sync { store, devices, mode, delay_ms } => {
                let task = self.store(&store)?.sync(&devices, mode, delay_ms)?;
                self.pending_syncs.push(task);
                Ok(Output::Unit)
            }
            Command::EnableSync { store, enabled } => handlers::store::enable_sync(self.store(&store)?, enabled),
            Command::SetSyncRange { store, local, remote } => {
                handlers::store::set_sync_range(self.store(&store)?, local, remote)
            }
            Command::SetSyncParam { store, delay_ms } => {
                handlers::store::set_sync_param(self.store(&store)?, delay_ms)
            }
            Command::RemoveDeviceData { store, device } => {
                handlers::store::remove_device_data(self.store(&store)?, &device)
            }
            Command::GetSecurityLevel { store } => handlers::store::get_security_level(self.store(&store)?),

            Command::Cursor { result_set, op } => handlers::cursor::cursor(self.result_set(&result_set)?, op),

            Command::Sleep { ms } => {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok(Output::Unit)
            }
            Command::Flush => {
                self.flush().await;
                Ok(Output::Unit)
            }
            Command::NotificationCount { store, event } => {
                self.flush().await;
                let inbox = self.slot(&store)?.inbox.lock();
                Ok(Output::Count(match event {
                    EventKind::DataChange => inbox.data_changes,
                    EventKind::SyncComplete => inbox.sync_completes,
                }))
            }
            Command::LastNotification { store } => {
                self.flush().await;
                let inbox = self.slot(&store)?.inbox.lock();
                Ok(Output::Notification(inbox.last_notification.clone()))
            }
            Command::LastSyncResult { store } => {
                self.flush().await;
                let inbox = self.slot(&store)?.inbox.lock();
                Ok(Output::SyncResult(inbox.last_sync.clone()))
            }
            Command::LocalDeviceId => Ok(Output::DeviceId(self.manager.local_device_id().to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use distkv_core::Value;
    use distkv_engine::KvManagerConfig;
    use serde_json::json;

    async fn session() -> Session {
        Session::new(KvManager::new(KvManagerConfig::new("com.example.session")).unwrap())
    }

    fn open(alias: &str, store_type: i64) -> Invocation {
        Invocation::new("manager", "getKVStore", vec![json!(alias), json!({"kvStoreType": store_type})])
            .bind(alias)
    }

    #[tokio::test]
    async fn test_aliases() {
        let mut s = session().await;
        s.invoke(&open("s", 1)).await.unwrap();
        s.invoke(&Invocation::new("s", "put", vec![json!("k"), json!("v")])).await.unwrap();
        let out = s.invoke(&Invocation::new("s", "get", vec![json!("k")])).await.unwrap();
        assert_eq!(out, Output::Value(Value::from("v")));

        let err = s.invoke(&Invocation::new("nope", "get", vec![json!("k")])).await.unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[tokio::test]
    async fn test_inbox_counts_notifications() {
        let mut s = session().await;
        s.invoke(&open("s", 1)).await.unwrap();
        s.invoke(&Invocation::new("s", "on", vec![json!("dataChange"), json!(2)])).await.unwrap();
        s.invoke(&Invocation::new("s", "put", vec![json!("a"), json!(1)])).await.unwrap();
        s.invoke(&Invocation::new("s", "delete", vec![json!("a")])).await.unwrap();
        let out = s
            .invoke(&Invocation::new("session", "notificationCount", vec![json!("s")]))
            .await
            .unwrap();
        assert_eq!(out, Output::Count(2));
        match s.invoke(&Invocation::new("session", "lastNotification", vec![json!("s")])).await.unwrap() {
            Output::Notification(Some(n)) => assert_eq!(n.delete_entries.len(), 1),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_result_set_binding() {
        let mut s = session().await;
        s.invoke(&open("s", 1)).await.unwrap();
        s.invoke(&Invocation::new("s", "putBatch", vec![json!([
            {"key": "a", "value": {"type": 0, "value": "x"}},
            {"key": "b", "value": {"type": 0, "value": "y"}}
        ])]))
        .await
        .unwrap();
        let out = s
            .invoke(&Invocation::new("s", "getResultSet", vec![json!("")]).bind("rs"))
            .await
            .unwrap();
        assert_eq!(out, Output::ResultSet { alias: "rs".into(), count: 2 });
        assert_eq!(
            s.invoke(&Invocation::new("rs", "moveToNext", vec![])).await.unwrap(),
            Output::Bool(true)
        );
        s.invoke(&Invocation::new("s", "closeResultSet", vec![json!("rs")])).await.unwrap();
        let err = s.invoke(&Invocation::new("rs", "getEntry", vec![])).await.unwrap_err();
        assert!(err.is_invalid_state());
    }
}
