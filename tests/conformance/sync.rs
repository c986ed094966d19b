//! Sync between managers on one loopback network

use crate::*;
use distkv::status;

fn ids(m: &KvManager) -> Vec<String> {
    vec![m.local_device_id().to_string()]
}

#[tokio::test]
async fn device_store_push_pull() {
    let net = LoopbackNetwork::new();
    let ma = networked_manager(&net).await;
    let mb = networked_manager(&net).await;
    let a = device_store(&ma, "shared").await;
    let b = device_store(&mb, "shared").await;
    let remote = Recorder::attach(&b, SubscribeType::Remote);

    a.put("from_a", Value::Integer(1)).await.unwrap();
    b.put("from_b", Value::Integer(2)).await.unwrap();

    let result = a.sync_wait(&ids(&mb), SyncMode::PushPull, None).await.unwrap();
    assert_eq!(result, vec![(mb.local_device_id().to_string(), status::SUCCESS)]);

    let a_id = ma.local_device_id().as_str();
    let b_id = mb.local_device_id().as_str();
    assert_eq!(b.get(a_id, "from_a").await.unwrap(), Value::Integer(1));
    assert_eq!(a.get(b_id, "from_b").await.unwrap(), Value::Integer(2));
    assert!(a.get(a_id, "from_b").await.unwrap_err().is_not_found());

    mb.flush_notifications().await;
    let seen = remote.all();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].device_id.as_str(), a_id);

    // Removing the peer's partition leaves the local one alone
    a.remove_device_data(b_id).await.unwrap();
    assert!(a.get(b_id, "from_b").await.unwrap_err().is_not_found());
    assert_eq!(a.get(a_id, "from_a").await.unwrap(), Value::Integer(1));
}

#[tokio::test]
async fn single_version_stores_converge() {
    let net = LoopbackNetwork::new();
    let ma = networked_manager(&net).await;
    let mb = networked_manager(&net).await;
    let opts = Options::single_version().with_auto_sync(false);
    let a: SingleKvStore = ma.get_kv_store("shared", opts.clone()).await.unwrap();
    let b: SingleKvStore = mb.get_kv_store("shared", opts).await.unwrap();

    a.put("k", Value::from("a")).await.unwrap();
    a.sync_wait(&ids(&mb), SyncMode::PushOnly, None).await.unwrap();
    assert_eq!(b.get("k").await.unwrap(), Value::from("a"));
}

#[tokio::test]
async fn failure_statuses_are_reported_not_raised() {
    let net = LoopbackNetwork::new();
    let ma = networked_manager(&net).await;
    let mb = networked_manager(&net).await;
    let a = device_store(&ma, "shared").await;
    let b = device_store(&mb, "shared").await;

    let r = a
        .sync_wait(&["NOT_A_PEER".to_string()], SyncMode::PushPull, None)
        .await
        .unwrap();
    assert_eq!(r[0].1, status::DEVICE_UNREACHABLE);

    b.enable_sync(false).await.unwrap();
    let r = a.sync_wait(&ids(&mb), SyncMode::PushOnly, None).await.unwrap();
    assert_eq!(r[0].1, status::SYNC_DISABLED);
    b.enable_sync(true).await.unwrap();

    a.set_sync_range(vec!["home".into()], vec!["work".into()]).await.unwrap();
    b.set_sync_range(vec!["office".into()], vec!["home".into()]).await.unwrap();
    let r = a.sync_wait(&ids(&mb), SyncMode::PushOnly, None).await.unwrap();
    assert_eq!(r[0].1, status::RANGE_MISMATCH);

    mb.close_kv_store(BUNDLE, "shared", &b).await.unwrap();
    let r = a.sync_wait(&ids(&mb), SyncMode::PushOnly, None).await.unwrap();
    assert_eq!(r[0].1, status::STORE_NOT_OPEN);
}

#[tokio::test]
async fn sync_argument_errors() {
    let m = manager().await;
    let store = device_store(&m, "s").await;
    assert!(store.sync(&[], SyncMode::PushPull).unwrap_err().is_invalid_argument());
    assert!(store
        .sync(&[String::new()], SyncMode::PushPull)
        .unwrap_err()
        .is_invalid_argument());
}
