//! Queued record model and id generation

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Record type tag for collected configuration-item data
pub const RECORD_TYPE_CI_DATA: &str = "ci_data";

/// One probe-produced payload awaiting delivery.
///
/// Immutable once written except for the retry counter; the payload is
/// opaque to the queue (no schema is imposed on probes).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueRecord {
    /// Unique, sortable identifier (see [`next_record_id`])
    pub id: String,

    /// Type tag, always `ci_data` for collected data
    pub record_type: String,

    /// Opaque probe payload
    pub payload: Map<String, Value>,

    /// Capture timestamp
    pub captured_at: DateTime<Utc>,

    /// Delivery attempts so far
    pub retries: u32,

    /// Retry ceiling; exceeding it moves the record to the failed partition
    pub max_retries: u32,
}

impl QueueRecord {
    /// Create a new record with a fresh id and a zero retry counter
    pub fn new(payload: Map<String, Value>, max_retries: u32) -> Self {
        Self {
            id: next_record_id(),
            record_type: RECORD_TYPE_CI_DATA.to_string(),
            payload,
            captured_at: Utc::now(),
            retries: 0,
            max_retries,
        }
    }
}

static RECORD_SEQ: AtomicU64 = AtomicU64::new(0);

/// Generate a monotonic, collision-resistant record id.
///
/// Zero-padded nanoseconds since epoch plus a process-wide sequence
/// suffix, so ids sort in insertion order as text keys even when two
/// records land in the same clock tick.
pub fn next_record_id() -> String {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let seq = RECORD_SEQ.fetch_add(1, Ordering::Relaxed) % 1_000_000;
    format!("{:020}-{:06}", nanos, seq)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_ids_are_unique_and_sorted() {
        let ids: Vec<String> = (0..100).map(|_| next_record_id()).collect();

        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);

        let mut deduped = ids.clone();
        deduped.dedup();
        assert_eq!(ids.len(), deduped.len());
    }

    #[test]
    fn test_new_record_defaults() {
        let mut payload = Map::new();
        payload.insert("hostname".to_string(), Value::String("host-1".to_string()));

        let record = QueueRecord::new(payload, 5);
        assert_eq!(record.record_type, RECORD_TYPE_CI_DATA);
        assert_eq!(record.retries, 0);
        assert_eq!(record.max_retries, 5);
    }
}
