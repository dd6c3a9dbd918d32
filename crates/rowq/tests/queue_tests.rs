use rowq::ScanPosition;
use serde_json::json;

mod common;

use common::TestDb;

#[tokio::test]
async fn test_next_returns_in_order_and_never_backtracks() {
    let db = TestDb::new().await;
    let name = db.create_queue("letters").await;
    let queue = rowq::queue(&name).open(&db.store).await.unwrap();

    for letter in ["A", "B", "C"] {
        queue.enqueue(&json!(letter)).await.unwrap();
    }

    let a = queue.next().await.unwrap().expect("A");
    let b = queue.next().await.unwrap().expect("B");
    let c = queue.next().await.unwrap().expect("C");
    assert_eq!(a.data(), &json!("A"));
    assert_eq!(b.data(), &json!("B"));
    assert_eq!(c.data(), &json!("C"));
    assert!(a.id() < b.id() && b.id() < c.id());
    assert!(queue.next().await.unwrap().is_none());

    assert!(b.lock().await.unwrap());
    assert!(b.success().await.unwrap());
    assert!(queue.next().await.unwrap().is_none());
    assert_eq!(queue.count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_requeue_limit_across_fresh_instances() {
    let db = TestDb::new().await;
    let name = db.create_queue("retries").await;
    let producer = rowq::queue(&name).open(&db.store).await.unwrap();
    let id = producer.enqueue(&json!({"job": 1})).await.unwrap();

    for round in 0..6 {
        let consumer = rowq::queue(&name)
            .max_requeue_count(5)
            .open(&db.store)
            .await
            .unwrap();
        let mut element = consumer
            .next()
            .await
            .unwrap()
            .unwrap_or_else(|| panic!("element missing in round {}", round));
        assert_eq!(element.id(), id);
        assert_eq!(element.requeue_count(), round);
        assert!(element.lock().await.unwrap());
        assert!(element.requeue().await.unwrap());
        assert_eq!(element.requeue_count(), round + 1);
    }

    let consumer = rowq::queue(&name)
        .max_requeue_count(5)
        .open(&db.store)
        .await
        .unwrap();
    assert!(consumer.next().await.unwrap().is_none());

    // still reachable out of band
    let element = consumer.get_element_by_id(id).await.unwrap().unwrap();
    assert_eq!(element.requeue_count(), 6);
}

#[tokio::test]
async fn test_requeue_limit_from_config() {
    let db = TestDb::with_config(|c| c.with_max_requeue_count(Some(0))).await;
    let name = db.create_queue("strict").await;
    let queue = rowq::queue(&name).open(&db.store).await.unwrap();
    assert_eq!(queue.max_requeue_count(), Some(0));

    let id = queue.enqueue(&json!(1)).await.unwrap();
    let mut element = queue.next().await.unwrap().unwrap();
    assert!(element.lock().await.unwrap());
    assert!(element.requeue().await.unwrap());

    let again = rowq::queue(&name).open(&db.store).await.unwrap();
    assert!(again.next().await.unwrap().is_none());

    let unlimited = rowq::queue(&name)
        .unlimited_requeues()
        .open(&db.store)
        .await
        .unwrap();
    assert_eq!(unlimited.next().await.unwrap().unwrap().id(), id);
}

#[tokio::test]
async fn test_skipped_element_requeued_mid_scan_is_not_revisited() {
    let db = TestDb::new().await;
    let name = db.create_queue("scan").await;
    let other_store = db.connect().await;

    let producer = rowq::queue(&name).open(&db.store).await.unwrap();
    let ids = producer
        .enqueue_batch(&[json!(1), json!(2), json!(3)])
        .await
        .unwrap();

    // consumer B holds the first element
    let consumer_b = rowq::queue(&name).open(&other_store).await.unwrap();
    let mut first = consumer_b.next().await.unwrap().unwrap();
    assert_eq!(first.id(), ids[0]);
    assert!(first.lock().await.unwrap());

    // consumer A only sees the rest
    let consumer_a = rowq::queue(&name).open(&db.store).await.unwrap();
    let batch = consumer_a.retrieve_batch(10, None).await.unwrap();
    let seen: Vec<i64> = batch.iter().map(|e| e.id()).collect();
    assert_eq!(seen, vec![ids[1], ids[2]]);
    for element in &batch {
        assert!(element.lock().await.unwrap());
    }

    // B gives the first element back; A has already passed it
    assert!(first.requeue().await.unwrap());
    assert!(consumer_a.next().await.unwrap().is_none());

    let consumer_c = rowq::queue(&name).open(&db.store).await.unwrap();
    let again = consumer_c.next().await.unwrap().unwrap();
    assert_eq!(again.id(), ids[0]);
    assert_eq!(again.requeue_count(), 1);
}

#[tokio::test]
async fn test_unlocked_elements_are_passed_over_too() {
    let db = TestDb::new().await;
    let name = db.create_queue("passes").await;
    let queue = rowq::queue(&name).open(&db.store).await.unwrap();
    let ids = queue
        .enqueue_batch(&[json!("x"), json!("y")])
        .await
        .unwrap();

    let x = queue.next().await.unwrap().unwrap();
    assert_eq!(x.id(), ids[0]);
    // never locked, still not offered again
    let y = queue.next().await.unwrap().unwrap();
    assert_eq!(y.id(), ids[1]);
    assert!(queue.next().await.unwrap().is_none());
}

#[tokio::test]
async fn test_retrieve_batch_with_id_filter_advances_cursor() {
    let db = TestDb::new().await;
    let name = db.create_queue("filtered").await;
    let queue = rowq::queue(&name).open(&db.store).await.unwrap();
    let ids = queue
        .enqueue_batch(&(0..5).map(|n| json!(n)).collect::<Vec<_>>())
        .await
        .unwrap();

    let picked = queue
        .retrieve_batch(10, Some(&[ids[3], ids[1]][..]))
        .await
        .unwrap();
    let picked: Vec<i64> = picked.iter().map(|e| e.id()).collect();
    assert_eq!(picked, vec![ids[1], ids[3]]);

    let rest: Vec<i64> = queue
        .retrieve_batch(10, None)
        .await
        .unwrap()
        .iter()
        .map(|e| e.id())
        .collect();
    assert_eq!(rest, vec![ids[4]]);

    let no_ids: [i64; 0] = [];
    assert!(queue
        .retrieve_batch(10, Some(&no_ids[..]))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_retrieve_batch_respects_max_count() {
    let db = TestDb::new().await;
    let name = db.create_queue("batches").await;
    let queue = rowq::queue(&name).open(&db.store).await.unwrap();
    let ids = queue
        .enqueue_batch(&(0..5).map(|n| json!({"n": n})).collect::<Vec<_>>())
        .await
        .unwrap();

    let first: Vec<i64> = queue
        .retrieve_batch(2, None)
        .await
        .unwrap()
        .iter()
        .map(|e| e.id())
        .collect();
    assert_eq!(first, ids[..2].to_vec());
    assert_eq!(queue.scan_position().last_seen_id, ids[1]);

    let second: Vec<i64> = queue
        .retrieve_batch(10, None)
        .await
        .unwrap()
        .iter()
        .map(|e| e.id())
        .collect();
    assert_eq!(second, ids[2..].to_vec());
}

#[tokio::test]
async fn test_snapshot_ignores_foreign_enqueues_until_own_enqueue() {
    let db = TestDb::new().await;
    let name = db.create_queue("snapshot").await;
    let producer = rowq::queue(&name).open(&db.store).await.unwrap();
    let consumer = rowq::queue(&name).open(&db.store).await.unwrap();

    let a = producer.enqueue(&json!("a")).await.unwrap();
    assert_eq!(consumer.next().await.unwrap().unwrap().id(), a);
    assert_eq!(
        consumer.scan_position(),
        ScanPosition {
            high_water_mark: Some(a),
            last_seen_id: a
        }
    );

    // the consumer's snapshot is exhausted; rows added elsewhere are not seen yet
    let b = producer.enqueue(&json!("b")).await.unwrap();
    assert!(consumer.next().await.unwrap().is_none());

    // enqueueing through the consumer drops its snapshot
    let c = consumer.enqueue(&json!("c")).await.unwrap();
    assert_eq!(consumer.scan_position().high_water_mark, None);
    assert_eq!(consumer.next().await.unwrap().unwrap().id(), b);
    assert_eq!(consumer.next().await.unwrap().unwrap().id(), c);
    assert!(consumer.next().await.unwrap().is_none());
}

#[tokio::test]
async fn test_empty_queue_keeps_cursor_unset() {
    let db = TestDb::new().await;
    let name = db.create_queue("empty").await;
    let consumer = rowq::queue(&name).open(&db.store).await.unwrap();
    let producer = rowq::queue(&name).open(&db.store).await.unwrap();

    assert!(consumer.next().await.unwrap().is_none());
    assert_eq!(consumer.scan_position().high_water_mark, None);

    let id = producer.enqueue(&json!("late")).await.unwrap();
    assert_eq!(consumer.next().await.unwrap().unwrap().id(), id);
}

#[tokio::test]
async fn test_queues_are_isolated() {
    let db = TestDb::new().await;
    let left = db.create_queue("left").await;
    let right = db.create_queue("right").await;

    let left_q = rowq::queue(&left).open(&db.store).await.unwrap();
    let right_q = rowq::queue(&right).open(&db.store).await.unwrap();
    let left_id = left_q.enqueue(&json!("l")).await.unwrap();
    right_q.enqueue(&json!("r")).await.unwrap();

    assert_eq!(left_q.count().await.unwrap(), 1);
    assert!(right_q.get_element_by_id(left_id).await.unwrap().is_none());
    assert_eq!(right_q.next().await.unwrap().unwrap().data(), &json!("r"));
    assert_eq!(left_q.next().await.unwrap().unwrap().id(), left_id);
}

#[tokio::test]
async fn test_count_includes_locked_elements() {
    let db = TestDb::new().await;
    let name = db.create_queue("counted").await;
    let queue = rowq::queue(&name).open(&db.store).await.unwrap();
    queue
        .enqueue_batch(&[json!(1), json!(2), json!(3)])
        .await
        .unwrap();

    let element = queue.next().await.unwrap().unwrap();
    assert!(element.lock().await.unwrap());
    assert_eq!(queue.count().await.unwrap(), 3);
}

#[tokio::test]
async fn test_codec_round_trip_through_store() {
    let db = TestDb::new().await;
    let name = db.create_queue("encoded").await;
    let queue = rowq::queue(&name)
        .codec(rowq::Base64Codec::new(rowq::JsonCodec))
        .open(&db.store)
        .await
        .unwrap();

    let payload = json!({"name": "résumé.pdf", "pages": [1, 2, 3], "draft": false});
    let id = queue.enqueue(&payload).await.unwrap();

    let stored = rowq::Store::elements(&db.store)
        .get(queue.id(), id)
        .await
        .unwrap()
        .unwrap();
    assert!(!stored.payload.contains('{'));

    let element = queue.next().await.unwrap().unwrap();
    assert_eq!(element.into_data(), payload);
}
