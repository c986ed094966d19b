//! Conformance suite
//!
//! Checks the observable properties of distkv through its public layers:
//! the typed API, the executor and scenario scripts.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --test conformance
//! cargo test --test conformance scenarios::
//! ```

use std::sync::Arc;

use distkv::api::{create_kv_manager, create_kv_manager_with_transport};
use distkv::engine::{LoopbackNetwork, SyncTransport};
use distkv::prelude::*;
use parking_lot::Mutex;

pub mod lifecycle;
pub mod properties;
pub mod scenarios;
pub mod scripts;
pub mod sync;

// =============================================================================
// SHARED TEST UTILITIES
// =============================================================================

/// Bundle used by every test manager
pub const BUNDLE: &str = "com.example.conformance";

/// In-memory manager
pub async fn manager() -> KvManager {
    create_kv_manager(KvManagerConfig::new(BUNDLE)).await.unwrap()
}

/// Manager attached to a loopback network
pub async fn networked_manager(net: &Arc<LoopbackNetwork>) -> KvManager {
    let transport: Arc<dyn SyncTransport> = Arc::clone(net) as Arc<dyn SyncTransport>;
    create_kv_manager_with_transport(KvManagerConfig::new(BUNDLE), transport)
        .await
        .unwrap()
}

/// Fresh single-version store
pub async fn single_store(m: &KvManager, id: &str) -> SingleKvStore {
    m.get_kv_store(id, Options::single_version()).await.unwrap()
}

/// Fresh device-collaboration store with auto-sync off
pub async fn device_store(m: &KvManager, id: &str) -> DeviceKvStore {
    m.get_kv_store(id, Options::device_collaboration().with_auto_sync(false))
        .await
        .unwrap()
}

/// Notifications received by a listener
#[derive(Clone, Default)]
pub struct Recorder {
    seen: Arc<Mutex<Vec<ChangeNotification>>>,
}

impl Recorder {
    /// Subscribe on `store` with `filter`
    pub fn attach<S: KvStore>(store: &S, filter: SubscribeType) -> Self {
        let rec = Recorder::default();
        let seen = Arc::clone(&rec.seen);
        let listener: distkv::engine::DataChangeListener =
            Arc::new(move |n: &ChangeNotification| seen.lock().push(n.clone()));
        store.on_data_change(filter, listener).unwrap();
        rec
    }

    /// Number of notifications so far
    pub fn count(&self) -> usize {
        self.seen.lock().len()
    }

    /// Copy of every notification so far
    pub fn all(&self) -> Vec<ChangeNotification> {
        self.seen.lock().clone()
    }
}

/// Ten `p0..p9` string entries
pub fn batch_entries() -> Vec<Entry> {
    (0..10)
        .map(|i| Entry::new(format!("p{}", i), "batch_test_string_value"))
        .collect()
}
