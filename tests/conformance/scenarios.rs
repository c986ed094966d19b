//! End-to-end scenarios through the typed API
//!
//! Scenario F needs an argument the typed API cannot express and runs
//! through the executor instead.

use crate::*;
use distkv::executor::{Invocation, Session};
use serde_json::json;
use std::time::Duration;

#[tokio::test]
async fn scenario_a_empty_string() {
    let m = manager().await;
    let store = single_store(&m, "a").await;
    let () = store.put("k", Value::from("")).await.unwrap();
    assert_eq!(store.get("k").await.unwrap(), Value::from(""));
}

#[tokio::test]
async fn scenario_b_batch_prefix() {
    let m = manager().await;
    let store = single_store(&m, "b").await;
    store.put_batch(batch_entries()).await.unwrap();
    let entries = store.get_entries("p").await.unwrap();
    assert_eq!(entries.len(), 10);
    for e in &entries {
        assert_eq!(e.value, Value::from("batch_test_string_value"));
    }
}

async fn transaction_then(finish_with_commit: bool) -> usize {
    let m = manager().await;
    let store = single_store(&m, "cd").await;
    let rec = Recorder::attach(&store, SubscribeType::Local);

    store.start_transaction().await.unwrap();
    store.put_batch(batch_entries()).await.unwrap();
    let doomed: Vec<String> = (0..5).map(|i| format!("p{}", i)).collect();
    store.delete_batch(doomed).await.unwrap();
    if finish_with_commit {
        store.commit().await.unwrap();
    } else {
        store.rollback().await.unwrap();
    }

    tokio::time::sleep(Duration::from_millis(50)).await;
    m.flush_notifications().await;
    rec.count()
}

#[tokio::test]
async fn scenario_c_commit_single_notification() {
    assert_eq!(transaction_then(true).await, 1);
}

#[tokio::test]
async fn scenario_d_rollback_no_notification() {
    assert_eq!(transaction_then(false).await, 0);
}

#[tokio::test]
async fn scenario_e_empty_result_set_closes() {
    let m = manager().await;
    let store = single_store(&m, "e").await;
    let rs = store.get_result_set("nonexistent_prefix").await.unwrap();
    assert_eq!(rs.get_count(), 0);
    store.close_result_set(&rs).await.unwrap();
    assert!(rs.is_closed());
}

#[tokio::test]
async fn scenario_f_start_transaction_with_argument() {
    let engine = distkv::engine::KvManager::new(KvManagerConfig::new(BUNDLE)).unwrap();
    let mut session = Session::new(engine);
    session
        .invoke(&Invocation::new("manager", "getKVStore", vec![json!("f"), json!({"kvStoreType": 1})]).bind("s"))
        .await
        .unwrap();

    let err = session
        .invoke(&Invocation::new("s", "startTransaction", vec![json!(1)]))
        .await
        .unwrap_err();
    assert!(err.is_invalid_argument());
    assert_eq!(err.code(), 401);
    assert!(!session.store("s").unwrap().in_transaction());
}
