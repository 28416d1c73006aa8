//! Durable queue integration tests
//!
//! These run against a real database file so reopen behavior matches
//! what a crash-restarted agent would see.

use serde_json::{Map, Value};
use tempfile::TempDir;

use inventagent::queue::store::DurableQueue;

fn payload(marker: &str) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("marker".to_string(), Value::String(marker.to_string()));
    map
}

#[test]
fn test_records_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("queue.db");

    {
        let queue = DurableQueue::open(&db_path, 3).unwrap();
        queue.push(payload("a")).unwrap();
        queue.push(payload("b")).unwrap();
        queue.close().unwrap();
    }

    let queue = DurableQueue::open(&db_path, 3).unwrap();
    let stats = queue.stats().unwrap();
    assert_eq!(stats.pending, 2);

    let batch = queue.pop_batch(10).unwrap();
    assert_eq!(batch.len(), 2);
    assert_eq!(batch[0].payload["marker"], Value::String("a".to_string()));
    assert_eq!(batch[1].payload["marker"], Value::String("b".to_string()));
}

#[test]
fn test_pop_batch_removes_only_what_it_returns() {
    let dir = TempDir::new().unwrap();
    let queue = DurableQueue::open(dir.path().join("queue.db"), 3).unwrap();

    for marker in ["a", "b", "c"] {
        queue.push(payload(marker)).unwrap();
    }

    let batch = queue.pop_batch(2).unwrap();
    assert_eq!(batch.len(), 2);
    assert_eq!(queue.stats().unwrap().pending, 1);

    let rest = queue.pop_batch(5).unwrap();
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].payload["marker"], Value::String("c".to_string()));
    assert_eq!(queue.stats().unwrap().pending, 0);
}

#[test]
fn test_requeued_record_is_visible_again() {
    let dir = TempDir::new().unwrap();
    let queue = DurableQueue::open(dir.path().join("queue.db"), 3).unwrap();

    queue.push(payload("a")).unwrap();
    let record = queue.pop_batch(1).unwrap().remove(0);
    assert_eq!(queue.stats().unwrap().pending, 0);

    queue.requeue(record).unwrap();

    let record = queue.pop_batch(1).unwrap().remove(0);
    assert_eq!(record.retries, 1);
    assert_eq!(record.payload["marker"], Value::String("a".to_string()));
}

#[test]
fn test_retry_ceiling_moves_record_to_failed() {
    let dir = TempDir::new().unwrap();
    let queue = DurableQueue::open(dir.path().join("queue.db"), 2).unwrap();

    queue.push(payload("a")).unwrap();

    // Two requeues stay pending, the third crosses the ceiling.
    for _ in 0..3 {
        let record = queue.pop_batch(1).unwrap().remove(0);
        queue.requeue(record).unwrap();
    }

    let stats = queue.stats().unwrap();
    assert_eq!(stats.pending, 0);
    assert_eq!(stats.failed, 1);
    assert!(queue.pop_batch(10).unwrap().is_empty());
}

#[test]
fn test_corrupt_row_is_skipped_not_resurrected() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("queue.db");

    {
        let queue = DurableQueue::open(&db_path, 3).unwrap();
        queue.push(payload("good")).unwrap();
        queue.close().unwrap();
    }

    // Plant a row that does not decode as a record.
    {
        let conn = rusqlite::Connection::open(&db_path).unwrap();
        conn.execute(
            "INSERT INTO pending (id, record) VALUES (?1, ?2)",
            rusqlite::params!["00000000000000000000-000000", "not json"],
        )
        .unwrap();
    }

    let queue = DurableQueue::open(&db_path, 3).unwrap();
    let batch = queue.pop_batch(10).unwrap();

    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].payload["marker"], Value::String("good".to_string()));
    // The corrupt row went out with the batch, not into retry.
    assert_eq!(queue.stats().unwrap().pending, 0);
}
