//! Change notification
//!
//! Listeners are registered per store handle and kept in a
//! [`ListenerRegistry`] shared by all handles of a store. Emitting takes a
//! snapshot of the matching listeners and queues it on the manager's
//! [`Dispatcher`], a single tokio task that calls listeners in the order
//! mutations were queued.

use distkv_core::{ChangeNotification, SubscribeType};
use smallvec::SmallVec;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// Listener for `dataChange` events
pub type DataChangeListener = Arc<dyn Fn(&ChangeNotification) + Send + Sync>;

/// Listener for `syncComplete` events: `(device id, status)` per device
pub type SyncCompleteListener = Arc<dyn Fn(&[(String, i32)]) + Send + Sync>;

fn same_listener<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

struct DataChangeRegistration {
    handle_id: u64,
    filter: SubscribeType,
    listener: DataChangeListener,
}

struct SyncCompleteRegistration {
    handle_id: u64,
    listener: SyncCompleteListener,
}

/// Registrations of one store, in registration order
#[derive(Default)]
pub struct ListenerRegistry {
    data_change: SmallVec<[DataChangeRegistration; 4]>,
    sync_complete: SmallVec<[SyncCompleteRegistration; 4]>,
}

impl ListenerRegistry {
    /// Register a `dataChange` listener for a handle.
    ///
    /// Returns false if the same listener is already registered on that
    /// handle; the existing registration is kept.
    pub fn add_data_change(
        &mut self,
        handle_id: u64,
        filter: SubscribeType,
        listener: DataChangeListener,
    ) -> bool {
        if self
            .data_change
            .iter()
            .any(|r| r.handle_id == handle_id && same_listener(&r.listener, &listener))
        {
            return false;
        }
        self.data_change.push(DataChangeRegistration {
            handle_id,
            filter,
            listener,
        });
        true
    }

    /// Register a `syncComplete` listener for a handle
    pub fn add_sync_complete(&mut self, handle_id: u64, listener: SyncCompleteListener) -> bool {
        if self
            .sync_complete
            .iter()
            .any(|r| r.handle_id == handle_id && same_listener(&r.listener, &listener))
        {
            return false;
        }
        self.sync_complete.push(SyncCompleteRegistration {
            handle_id,
            listener,
        });
        true
    }

    /// Remove one `dataChange` listener of a handle, or all of them when
    /// `listener` is `None`. Returns how many were removed.
    pub fn remove_data_change(&mut self, handle_id: u64, listener: Option<&DataChangeListener>) -> usize {
        let before = self.data_change.len();
        self.data_change.retain(|r| {
            r.handle_id != handle_id || listener.map_or(false, |l| !same_listener(&r.listener, l))
        });
        before - self.data_change.len()
    }

    /// Remove one `syncComplete` listener of a handle, or all of them
    pub fn remove_sync_complete(
        &mut self,
        handle_id: u64,
        listener: Option<&SyncCompleteListener>,
    ) -> usize {
        let before = self.sync_complete.len();
        self.sync_complete.retain(|r| {
            r.handle_id != handle_id || listener.map_or(false, |l| !same_listener(&r.listener, l))
        });
        before - self.sync_complete.len()
    }

    /// Drop every registration of a handle
    pub fn remove_handle(&mut self, handle_id: u64) {
        self.data_change.retain(|r| r.handle_id != handle_id);
        self.sync_complete.retain(|r| r.handle_id != handle_id);
    }

    /// `dataChange` listeners interested in a local or remote change
    pub fn data_change_targets(&self, remote: bool) -> Vec<DataChangeListener> {
        self.data_change
            .iter()
            .filter(|r| r.filter.accepts(remote))
            .map(|r| Arc::clone(&r.listener))
            .collect()
    }

    /// All `syncComplete` listeners
    pub fn sync_complete_targets(&self) -> Vec<SyncCompleteListener> {
        self.sync_complete
            .iter()
            .map(|r| Arc::clone(&r.listener))
            .collect()
    }

    /// Number of `dataChange` registrations
    pub fn data_change_len(&self) -> usize {
        self.data_change.len()
    }

    /// Number of `syncComplete` registrations
    pub fn sync_complete_len(&self) -> usize {
        self.sync_complete.len()
    }
}

enum Job {
    DataChange {
        listeners: Vec<DataChangeListener>,
        notification: Arc<ChangeNotification>,
    },
    SyncComplete {
        listeners: Vec<SyncCompleteListener>,
        result: Arc<Vec<(String, i32)>>,
    },
    Flush(oneshot::Sender<()>),
}

/// Queue in front of the delivery task
#[derive(Clone)]
pub struct Dispatcher {
    tx: mpsc::UnboundedSender<Job>,
}

impl Dispatcher {
    /// Spawn the delivery task on `runtime`
    pub fn spawn(runtime: &tokio::runtime::Handle) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        runtime.spawn(async move {
            while let Some(job) = rx.recv().await {
                deliver(job);
            }
            debug!("notification dispatcher stopped");
        });
        Self { tx }
    }

    /// Queue a `dataChange` delivery
    pub fn data_change(&self, listeners: Vec<DataChangeListener>, notification: ChangeNotification) {
        if listeners.is_empty() {
            return;
        }
        self.send(Job::DataChange {
            listeners,
            notification: Arc::new(notification),
        });
    }

    /// Queue a `syncComplete` delivery
    pub fn sync_complete(&self, listeners: Vec<SyncCompleteListener>, result: Vec<(String, i32)>) {
        if listeners.is_empty() {
            return;
        }
        self.send(Job::SyncComplete {
            listeners,
            result: Arc::new(result),
        });
    }

    /// Wait until everything queued so far has been delivered
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        self.send(Job::Flush(tx));
        let _ = rx.await;
    }

    fn send(&self, job: Job) {
        if self.tx.send(job).is_err() {
            warn!("notification dispatcher is gone; dropping delivery");
        }
    }
}

fn deliver(job: Job) {
    match job {
        Job::DataChange {
            listeners,
            notification,
        } => {
            for listener in listeners {
                if catch_unwind(AssertUnwindSafe(|| listener(&notification))).is_err() {
                    warn!(device = %notification.device_id, "dataChange listener panicked");
                }
            }
        }
        Job::SyncComplete { listeners, result } => {
            for listener in listeners {
                if catch_unwind(AssertUnwindSafe(|| listener(&result))).is_err() {
                    warn!("syncComplete listener panicked");
                }
            }
        }
        Job::Flush(done) => {
            let _ = done.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use distkv_core::{DeviceId, Entry};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting() -> (DataChangeListener, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let listener: DataChangeListener = Arc::new(move |_n: &ChangeNotification| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        (listener, count)
    }

    #[test]
    fn test_same_listener_registered_once() {
        let mut registry = ListenerRegistry::default();
        let (l, _) = counting();
        assert!(registry.add_data_change(1, SubscribeType::All, Arc::clone(&l)));
        assert!(!registry.add_data_change(1, SubscribeType::Local, Arc::clone(&l)));
        assert_eq!(registry.data_change_len(), 1);
        // another handle may register the same listener
        assert!(registry.add_data_change(2, SubscribeType::All, l));
        assert_eq!(registry.data_change_len(), 2);
    }

    #[test]
    fn test_remove_by_identity_and_all() {
        let mut registry = ListenerRegistry::default();
        let (a, _) = counting();
        let (b, _) = counting();
        registry.add_data_change(1, SubscribeType::All, Arc::clone(&a));
        registry.add_data_change(1, SubscribeType::All, Arc::clone(&b));
        registry.add_data_change(2, SubscribeType::All, Arc::clone(&a));

        assert_eq!(registry.remove_data_change(1, Some(&a)), 1);
        assert_eq!(registry.data_change_len(), 2);
        assert_eq!(registry.remove_data_change(1, None), 1);
        assert_eq!(registry.data_change_len(), 1);
        registry.remove_handle(2);
        assert_eq!(registry.data_change_len(), 0);
    }

    #[test]
    fn test_targets_respect_filter() {
        let mut registry = ListenerRegistry::default();
        let (local, _) = counting();
        let (remote, _) = counting();
        let (all, _) = counting();
        registry.add_data_change(1, SubscribeType::Local, local);
        registry.add_data_change(1, SubscribeType::Remote, remote);
        registry.add_data_change(1, SubscribeType::All, all);
        assert_eq!(registry.data_change_targets(false).len(), 2);
        assert_eq!(registry.data_change_targets(true).len(), 2);
    }

    #[tokio::test]
    async fn test_dispatch_in_order_and_survives_panics() {
        let dispatcher = Dispatcher::spawn(&tokio::runtime::Handle::current());
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        let recorder: DataChangeListener = Arc::new(move |n: &ChangeNotification| {
            s.lock().push(n.insert_entries[0].key.clone());
        });
        let panicker: DataChangeListener = Arc::new(|_n: &ChangeNotification| panic!("boom"));

        for key in ["a", "b", "c"] {
            let mut n = ChangeNotification::new(DeviceId::new("d").unwrap());
            n.insert_entries.push(Entry::new(key, 1i64));
            dispatcher.data_change(vec![Arc::clone(&panicker), Arc::clone(&recorder)], n);
        }
        dispatcher.flush().await;
        assert_eq!(*seen.lock(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_sync_complete_delivery() {
        let dispatcher = Dispatcher::spawn(&tokio::runtime::Handle::current());
        let got = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let g = Arc::clone(&got);
        let listener: SyncCompleteListener = Arc::new(move |r: &[(String, i32)]| {
            g.lock().extend_from_slice(r);
        });
        dispatcher.sync_complete(vec![listener], vec![("peer".into(), 1)]);
        dispatcher.flush().await;
        assert_eq!(*got.lock(), vec![("peer".to_string(), 1)]);
    }
}
