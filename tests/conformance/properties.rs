//! Store properties that hold for every store type

use crate::*;
use proptest::prelude::*;

// =============================================================================
// ROUND-TRIP
// =============================================================================

fn boundary_values() -> Vec<(&'static str, Value)> {
    vec![
        ("int_min", Value::Integer(i64::MIN)),
        ("int_max", Value::Integer(i64::MAX)),
        ("float_min", Value::Float(f32::MIN)),
        ("float_max", Value::Float(f32::MAX)),
        ("double_min", Value::Double(f64::MIN)),
        ("double_max", Value::Double(f64::MAX)),
        ("double_tiny", Value::Double(f64::MIN_POSITIVE)),
        ("empty", Value::from("")),
        ("long", Value::from("x".repeat(4095))),
        ("unicode", Value::from("日本語 🌍")),
        ("true", Value::Boolean(true)),
        ("false", Value::Boolean(false)),
        ("bytes", Value::ByteArray(vec![0, 1, 254, 255])),
        ("no_bytes", Value::ByteArray(Vec::new())),
    ]
}

#[tokio::test]
async fn round_trip_boundaries_single() {
    let m = manager().await;
    let store = single_store(&m, "p1").await;
    for (key, value) in boundary_values() {
        store.put(key, value.clone()).await.unwrap();
        assert_eq!(store.get(key).await.unwrap(), value, "{}", key);
    }
}

#[tokio::test]
async fn round_trip_boundaries_device() {
    let m = manager().await;
    let store = device_store(&m, "p1").await;
    let local = store.local_device_id().clone();
    for (key, value) in boundary_values() {
        store.put(key, value.clone()).await.unwrap();
        assert_eq!(store.get(local.as_str(), key).await.unwrap(), value, "{}", key);
    }
}

fn finite_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<String>().prop_map(Value::String),
        any::<i64>().prop_map(Value::Integer),
        any::<f32>().prop_filter("finite", |f| f.is_finite()).prop_map(Value::Float),
        any::<f64>().prop_filter("finite", |f| f.is_finite()).prop_map(Value::Double),
        any::<bool>().prop_map(Value::Boolean),
        proptest::collection::vec(any::<u8>(), 0..64).prop_map(Value::ByteArray),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn round_trip_any_value(value in finite_value(), key in "[a-z]{1,16}") {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let got = rt.block_on(async {
            let m = manager().await;
            let store = single_store(&m, "prop").await;
            store.put(&key, value.clone()).await.unwrap();
            store.get(&key).await.unwrap()
        });
        prop_assert_eq!(got, value);
    }
}

// =============================================================================
// BATCH ATOMICITY
// =============================================================================

#[tokio::test]
async fn batch_all_or_nothing() {
    let m = manager().await;
    let store = single_store(&m, "p2").await;

    store.put_batch(batch_entries()).await.unwrap();
    assert_eq!(store.get_entries("p").await.unwrap().len(), 10);

    let mut bad: Vec<Entry> = (0..5).map(|i| Entry::new(format!("q{}", i), i as i64)).collect();
    bad.push(Entry::new("", 1i64));
    assert!(store.put_batch(bad).await.unwrap_err().is_invalid_argument());
    assert!(store.get_entries("q").await.unwrap().is_empty());

    let oversized: Vec<Entry> = (0..129).map(|i| Entry::new(format!("r{}", i), i as i64)).collect();
    assert!(store.put_batch(oversized).await.is_err());
    assert!(store.get_entries("r").await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn readers_never_see_part_of_a_batch() {
    const N: usize = 8;
    const ROUNDS: usize = 40;

    let m = manager().await;
    let batches = single_store(&m, "p2c").await;
    let committer = single_store(&m, "p2c").await;

    let mut writers = Vec::new();
    for w in 0..2 {
        let store = batches.clone();
        writers.push(tokio::spawn(async move {
            for round in 0..ROUNDS {
                let entries: Vec<Entry> = (0..N)
                    .map(|i| Entry::new(format!("c_b{}_{}_{}", w, round, i), i as i64))
                    .collect();
                store.put_batch(entries).await.unwrap();
                tokio::task::yield_now().await;
            }
        }));
    }
    {
        let store = committer.clone();
        writers.push(tokio::spawn(async move {
            for round in 0..ROUNDS {
                store.start_transaction().await.unwrap();
                for i in 0..N {
                    store
                        .put(&format!("c_t_{}_{}", round, i), Value::Integer(i as i64))
                        .await
                        .unwrap();
                }
                store.commit().await.unwrap();
                tokio::task::yield_now().await;
            }
        }));
    }

    let mut readers = Vec::new();
    for _ in 0..3 {
        let store = batches.clone();
        readers.push(tokio::spawn(async move {
            let mut observed = Vec::new();
            loop {
                let count = store.get_entries("c_").await.unwrap().len();
                observed.push(count);
                if count == 3 * ROUNDS * N {
                    break;
                }
                tokio::task::yield_now().await;
            }
            observed
        }));
    }

    for w in writers {
        w.await.unwrap();
    }
    for r in readers {
        for count in r.await.unwrap() {
            assert_eq!(count % N, 0, "reader saw {} entries", count);
        }
    }
}

// =============================================================================
// TRANSACTION ISOLATION
// =============================================================================

async fn buffered_mutations(store: &SingleKvStore) {
    store.start_transaction().await.unwrap();
    store.put("t1", Value::Integer(1)).await.unwrap();
    store.put("t2", Value::Integer(2)).await.unwrap();
    store.put_batch(batch_entries()).await.unwrap();
    store.delete("t1").await.unwrap();
    store.delete_batch(vec!["p0".into(), "p1".into()]).await.unwrap();
}

#[tokio::test]
async fn commit_notifies_exactly_once() {
    let m = manager().await;
    let store = single_store(&m, "p3").await;
    let rec = Recorder::attach(&store, SubscribeType::All);

    buffered_mutations(&store).await;
    store.commit().await.unwrap();
    m.flush_notifications().await;

    assert_eq!(rec.count(), 1);
    assert_eq!(store.get_entries("p").await.unwrap().len(), 8);
    assert_eq!(store.get("t2").await.unwrap(), Value::Integer(2));
    assert!(store.get("t1").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn rollback_notifies_nothing() {
    let m = manager().await;
    let store = single_store(&m, "p3").await;
    let rec = Recorder::attach(&store, SubscribeType::All);

    buffered_mutations(&store).await;
    store.rollback().await.unwrap();
    m.flush_notifications().await;

    assert_eq!(rec.count(), 0);
    assert!(store.get_entries("").await.unwrap().is_empty());
}

// =============================================================================
// IDEMPOTENT DELETE
// =============================================================================

#[tokio::test]
async fn delete_batch_ignores_missing_keys() {
    let m = manager().await;
    let store = single_store(&m, "p4").await;
    store.put("present", Value::Boolean(true)).await.unwrap();

    store
        .delete_batch(vec!["present".into(), "absent".into()])
        .await
        .unwrap();
    store.delete_batch(vec!["present".into()]).await.unwrap();
    store.delete("never").await.unwrap();
    assert!(store.get_entries("").await.unwrap().is_empty());
}

// =============================================================================
// QUERY CONSISTENCY
// =============================================================================

#[tokio::test]
async fn result_size_matches_result_set_count() {
    let m = manager().await;
    let store = single_store(&m, "p5").await;
    for i in 0..20 {
        let doc = format!(r#"{{"n": {}, "name": "user{}"}}"#, i, i);
        store.put(&format!("u{:02}", i), Value::from(doc)).await.unwrap();
    }
    store.put("other", Value::Integer(3)).await.unwrap();

    let queries = vec![
        Query::new(),
        Query::new().prefix_key("u"),
        Query::new().greater_than("$.n", 9),
        Query::new().less_than("$.n", 5).or().equal_to("$.name", "user17"),
        Query::new().like("$.name", "user1%"),
        Query::new().prefix_key("u").limit(3, 2),
        Query::new().prefix_key("none"),
    ];
    for q in queries {
        let size = store.get_result_size(&q).await.unwrap();
        let rs = store.get_result_set_by_query(&q).await.unwrap();
        assert_eq!(size, rs.get_count(), "{}", q.get_sql_like());
        store.close_result_set(&rs).await.unwrap();
    }
}

// =============================================================================
// DEVICE ISOLATION
// =============================================================================

#[tokio::test]
async fn removing_unrelated_device_keeps_local_data() {
    let m = manager().await;
    let store = device_store(&m, "p6").await;
    let local = store.local_device_id().clone();
    store.put("mine", Value::from("kept")).await.unwrap();

    let err = store.remove_device_data("UNRELATED_DEVICE").await.unwrap_err();
    assert!(err.is_not_found());
    assert!(store.remove_device_data("").await.unwrap_err().is_invalid_argument());

    assert_eq!(store.get(local.as_str(), "mine").await.unwrap(), Value::from("kept"));
    assert_eq!(store.get_entries(local.as_str(), "").await.unwrap().len(), 1);
}
