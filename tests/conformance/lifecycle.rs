//! Manager and store lifecycle

use crate::*;

#[tokio::test]
async fn close_then_delete() {
    let m = manager().await;
    let store = single_store(&m, "life").await;
    store.put("k", Value::Integer(1)).await.unwrap();

    let err = m.delete_kv_store(BUNDLE, "life").await.unwrap_err();
    assert!(err.is_invalid_state());

    m.close_kv_store(BUNDLE, "life", &store).await.unwrap();
    assert!(m.close_kv_store(BUNDLE, "life", &store).await.unwrap_err().is_invalid_state());
    assert_eq!(m.get_all_kv_store_id(BUNDLE).await.unwrap(), vec!["life".to_string()]);

    m.delete_kv_store(BUNDLE, "life").await.unwrap();
    assert!(m.get_all_kv_store_id(BUNDLE).await.unwrap().is_empty());
    assert!(m.delete_kv_store(BUNDLE, "life").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn handles_share_one_store() {
    let m = manager().await;
    let first = single_store(&m, "shared").await;
    let second = single_store(&m, "shared").await;
    let rec = Recorder::attach(&second, SubscribeType::Local);

    first.put("k", Value::from("v")).await.unwrap();
    assert_eq!(second.get("k").await.unwrap(), Value::from("v"));

    m.close_kv_store(BUNDLE, "shared", &first).await.unwrap();
    assert_eq!(second.get("k").await.unwrap(), Value::from("v"));
    m.flush_notifications().await;
    assert_eq!(rec.count(), 1);
}

#[tokio::test]
async fn wrong_bundle_and_missing_store() {
    let m = manager().await;
    assert!(m.get_all_kv_store_id("com.other").await.unwrap_err().is_invalid_argument());
    let err = m
        .get_kv_store::<SingleKvStore>("absent", Options::single_version().with_create_if_missing(false))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    let err = m
        .get_kv_store::<SingleKvStore>("", Options::single_version())
        .await
        .unwrap_err();
    assert!(err.is_invalid_argument());
}

#[tokio::test]
async fn multi_version_is_rejected() {
    let m = manager().await;
    let err = m
        .engine()
        .get_kv_store("mv", Options::default().with_kv_store_type(KvStoreType::MultiVersion))
        .await
        .unwrap_err();
    assert!(err.is_invalid_argument());
}

#[tokio::test]
async fn stores_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = KvManagerConfig::new(BUNDLE).with_data_dir(dir.path());

    {
        let m = create_kv_manager(config.clone()).await.unwrap();
        let store: DeviceKvStore = m
            .get_kv_store("persisted", Options::device_collaboration().with_auto_sync(false))
            .await
            .unwrap();
        store
            .put_batch(vec![Entry::new("a", 1i64), Entry::new("b", Value::ByteArray(vec![9]))])
            .await
            .unwrap();
        m.close_kv_store(BUNDLE, "persisted", &store).await.unwrap();
    }

    let m = create_kv_manager(config).await.unwrap();
    assert_eq!(
        m.get_all_kv_store_id(BUNDLE).await.unwrap(),
        vec!["persisted".to_string()]
    );
    let store: DeviceKvStore = m
        .get_kv_store("persisted", Options::device_collaboration().with_create_if_missing(false))
        .await
        .unwrap();
    let entries = store.get_entries_by_query(None, &Query::new()).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].value, Value::ByteArray(vec![9]));

    m.close_kv_store(BUNDLE, "persisted", &store).await.unwrap();
    m.delete_kv_store(BUNDLE, "persisted").await.unwrap();
    assert!(m.get_all_kv_store_id(BUNDLE).await.unwrap().is_empty());
}
