//! Store handle semantics: CRUD, batches, transactions, notifications,
//! queries and result sets.

use distkv_core::{ChangeNotification, DeviceId, Entry, Options, SubscribeType, Value};
use distkv_engine::{DataChangeListener, KvManager, KvManagerConfig, KvStore, Query};
use parking_lot::Mutex;
use std::sync::Arc;

async fn open(options: Options) -> (KvManager, KvStore) {
    let manager = KvManager::new(KvManagerConfig::new("com.example.engine")).unwrap();
    let store = manager.get_kv_store("store1", options).await.unwrap();
    (manager, store)
}

fn recorder() -> (DataChangeListener, Arc<Mutex<Vec<ChangeNotification>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = Arc::clone(&seen);
    let listener: DataChangeListener = Arc::new(move |n: &ChangeNotification| {
        s.lock().push(n.clone());
    });
    (listener, seen)
}

fn batch(prefix: &str, n: usize) -> Vec<Entry> {
    (0..n)
        .map(|i| Entry::new(format!("{}{}", prefix, i), "batch_test_string_value"))
        .collect()
}

#[tokio::test]
async fn put_get_preserves_type() {
    let (_m, store) = open(Options::single_version()).await;
    let values = vec![
        Value::from(""),
        Value::from("x".repeat(4095)),
        Value::Integer(i64::MAX),
        Value::Integer(i64::MIN),
        Value::Float(f32::MAX),
        Value::Double(f64::MAX),
        Value::Double(f64::MIN_POSITIVE),
        Value::Boolean(true),
        Value::ByteArray(vec![0, 1, 255]),
    ];
    for (i, value) in values.into_iter().enumerate() {
        let key = format!("k{}", i);
        store.put(&key, value.clone()).unwrap();
        assert_eq!(store.get(None, &key).unwrap(), value);
    }
}

#[tokio::test]
async fn missing_key_and_idempotent_delete() {
    let (_m, store) = open(Options::single_version()).await;
    assert!(store.get(None, "nope").unwrap_err().is_not_found());
    store.delete("nope").unwrap();
    store
        .delete_batch(vec!["a".into(), "b".into()])
        .unwrap();
    assert!(store.put("", Value::from(1i64)).unwrap_err().is_invalid_argument());
}

#[tokio::test]
async fn batch_is_all_or_nothing() {
    let (_m, store) = open(Options::single_version()).await;
    store.put_batch(batch("p", 10)).unwrap();
    let entries = store.get_entries(None, "p").unwrap();
    assert_eq!(entries.len(), 10);
    assert!(entries
        .iter()
        .all(|e| e.value == Value::from("batch_test_string_value")));

    let mut bad = batch("q", 3);
    bad.push(Entry::new("", 1i64));
    assert!(store.put_batch(bad).unwrap_err().is_invalid_argument());
    assert!(store.get_entries(None, "q").unwrap().is_empty());

    assert!(store.put_batch(batch("r", 129)).unwrap_err().is_invalid_argument());
    assert!(store.get_entries(None, "r").unwrap().is_empty());
}

#[tokio::test]
async fn transaction_commit_notifies_once() {
    let (manager, store) = open(Options::single_version()).await;
    let (listener, seen) = recorder();
    store.on_data_change(SubscribeType::All, listener).unwrap();

    store.start_transaction().unwrap();
    store.put_batch(batch("t", 10)).unwrap();
    store
        .delete_batch((0..5).map(|i| format!("t{}", i)).collect())
        .unwrap();
    // buffered writes are not visible before commit
    assert!(store.get_entries(None, "t").unwrap().is_empty());
    store.commit().unwrap();
    manager.flush_notifications().await;

    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].insert_entries.len(), 5);
    assert_eq!(&seen[0].device_id, manager.local_device_id());
    assert_eq!(store.get_entries(None, "t").unwrap().len(), 5);
}

#[tokio::test]
async fn commit_without_net_change_still_notifies() {
    let (manager, store) = open(Options::single_version()).await;
    let (listener, seen) = recorder();
    store.on_data_change(SubscribeType::All, listener).unwrap();

    store.start_transaction().unwrap();
    store.delete("absent").unwrap();
    store.commit().unwrap();

    store.start_transaction().unwrap();
    store.put("x", Value::Integer(1)).unwrap();
    store.delete("x").unwrap();
    store.commit().unwrap();

    // plain deletes of missing keys stay silent
    store.delete("absent").unwrap();
    manager.flush_notifications().await;

    let seen = seen.lock();
    assert_eq!(seen.len(), 2);
    for n in seen.iter() {
        assert!(n.insert_entries.is_empty());
        assert!(n.update_entries.is_empty());
        assert!(n.delete_entries.is_empty());
        assert_eq!(&n.device_id, manager.local_device_id());
    }
    assert!(store.get(None, "x").unwrap_err().is_not_found());
}

#[tokio::test]
async fn transaction_rollback_notifies_nothing() {
    let (manager, store) = open(Options::single_version()).await;
    let (listener, seen) = recorder();
    store.on_data_change(SubscribeType::All, listener).unwrap();

    store.start_transaction().unwrap();
    store.put_batch(batch("t", 10)).unwrap();
    store.rollback().unwrap();
    manager.flush_notifications().await;

    assert!(seen.lock().is_empty());
    assert!(store.get_entries(None, "t").unwrap().is_empty());
}

#[tokio::test]
async fn transaction_state_errors() {
    let (_m, store) = open(Options::single_version()).await;
    assert!(store.commit().unwrap_err().is_invalid_state());
    assert!(store.rollback().unwrap_err().is_invalid_state());
    store.start_transaction().unwrap();
    assert!(store.start_transaction().unwrap_err().is_invalid_state());
    store.commit().unwrap();
    assert!(!store.in_transaction());
}

#[tokio::test]
async fn listeners_see_other_handles_and_filter() {
    let (manager, a) = open(Options::single_version()).await;
    let b = manager.get_kv_store("store1", Options::single_version()).await.unwrap();
    let (local, local_seen) = recorder();
    let (remote, remote_seen) = recorder();
    a.on_data_change(SubscribeType::Local, local).unwrap();
    a.on_data_change(SubscribeType::Remote, remote).unwrap();

    b.put("k", Value::from("v")).unwrap();
    b.put("k", Value::from("w")).unwrap();
    b.delete("k").unwrap();
    manager.flush_notifications().await;

    let local_seen = local_seen.lock();
    assert_eq!(local_seen.len(), 3);
    assert_eq!(local_seen[0].insert_entries.len(), 1);
    assert_eq!(local_seen[1].update_entries.len(), 1);
    assert_eq!(local_seen[2].delete_entries[0].value, Value::from("w"));
    assert!(remote_seen.lock().is_empty());
}

#[tokio::test]
async fn off_removes_by_identity_or_all() {
    let (manager, store) = open(Options::single_version()).await;
    let (first, first_seen) = recorder();
    let (second, second_seen) = recorder();
    store.on_data_change(SubscribeType::All, Arc::clone(&first)).unwrap();
    store.on_data_change(SubscribeType::All, Arc::clone(&first)).unwrap();
    store.on_data_change(SubscribeType::All, Arc::clone(&second)).unwrap();

    store.put("a", Value::from(1i64)).unwrap();
    store.off_data_change(Some(&first)).unwrap();
    store.put("b", Value::from(1i64)).unwrap();
    store.off_data_change(None).unwrap();
    store.put("c", Value::from(1i64)).unwrap();
    manager.flush_notifications().await;

    assert_eq!(first_seen.lock().len(), 1);
    assert_eq!(second_seen.lock().len(), 2);
}

#[tokio::test]
async fn result_sets_are_snapshots() {
    let (_m, store) = open(Options::single_version()).await;
    store.put_batch(batch("r", 4)).unwrap();

    let rs = store.get_result_set(None, "r").unwrap();
    store.put("r9", Value::from("later")).unwrap();
    assert_eq!(rs.get_count(), 4);
    assert!(rs.move_to_first());
    assert_eq!(rs.get_entry().unwrap().key, "r0");

    let query = Query::new().prefix_key("r");
    assert_eq!(
        store.get_result_size(None, &query).unwrap(),
        store.get_result_set_by_query(None, &query).unwrap().get_count()
    );

    let empty = store.get_result_set(None, "nonexistent_prefix").unwrap();
    assert_eq!(empty.get_count(), 0);
    store.close_result_set(&empty).unwrap();
    assert!(store.close_result_set(&empty).unwrap_err().is_invalid_argument());
}

#[tokio::test]
async fn closing_handle_releases_result_sets() {
    let (manager, store) = open(Options::single_version()).await;
    let rs = store.get_result_set(None, "").unwrap();
    assert_eq!(store.open_result_sets(), 1);
    manager
        .close_kv_store(manager.bundle_name(), "store1", &store)
        .await
        .unwrap();
    assert!(rs.is_closed());
    assert!(store.get(None, "k").unwrap_err().is_invalid_state());
}

#[tokio::test]
async fn field_queries_over_json_values() {
    let (_m, store) = open(Options::single_version()).await;
    store.put("u1", Value::from(r#"{"name":"ann","age":31}"#)).unwrap();
    store.put("u2", Value::from(r#"{"name":"bob","age":25}"#)).unwrap();
    store.put("u3", Value::from(r#"{"name":"cid","age":40}"#)).unwrap();

    let query = Query::new()
        .prefix_key("u")
        .greater_than("$.age", 30i64)
        .order_by_desc("$.age");
    let keys: Vec<String> = store
        .get_entries_by_query(None, &query)
        .unwrap()
        .into_iter()
        .map(|e| e.key)
        .collect();
    assert_eq!(keys, vec!["u3", "u1"]);

    let broken = Query::new().equal_to("$.age", 1i64).and();
    assert!(store
        .get_entries_by_query(None, &broken)
        .unwrap_err()
        .is_invalid_argument());
}

#[tokio::test]
async fn device_store_scopes_reads() {
    let (manager, store) = open(Options::device_collaboration()).await;
    let local = manager.local_device_id().clone();
    store.put("k", Value::from("v")).unwrap();

    assert_eq!(store.get(Some(&local), "k").unwrap(), Value::from("v"));
    assert!(store.get(None, "k").unwrap_err().is_invalid_argument());
    let other = DeviceId::new("OTHER").unwrap();
    assert!(store.get(Some(&other), "k").unwrap_err().is_not_found());
    assert!(store.get_entries(Some(&other), "").unwrap().is_empty());

    let all = Query::new().prefix_key("k");
    assert_eq!(store.get_result_size(None, &all).unwrap(), 1);
    let scoped = Query::new().device_id(local.as_str());
    assert_eq!(store.get_entries_by_query(None, &scoped).unwrap().len(), 1);

    assert!(store.put(&"x".repeat(897), Value::from(1i64)).is_err());
    store.put(&"x".repeat(896), Value::from(1i64)).unwrap();
}

#[tokio::test]
async fn remove_device_data_leaves_local_entries() {
    let (manager, store) = open(Options::device_collaboration()).await;
    let local = manager.local_device_id().clone();
    store.put("k", Value::from("v")).unwrap();

    assert!(store.remove_device_data("").unwrap_err().is_invalid_argument());
    assert!(store
        .remove_device_data(local.as_str())
        .unwrap_err()
        .is_invalid_argument());
    assert!(store.remove_device_data("UNKNOWN").unwrap_err().is_not_found());
    assert_eq!(store.get(Some(&local), "k").unwrap(), Value::from("v"));
}
