//! SQLite-backed durable queue store
//!
//! One local database file holds two logical partitions, `pending` and
//! `failed`, keyed by record id. All multi-row operations run inside a
//! single transaction so a pop-batch either removes a whole batch or
//! nothing (the pop-then-send invariant).

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::errors::AgentError;
use crate::queue::record::{next_record_id, QueueRecord};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS pending (
    id     TEXT PRIMARY KEY,
    record TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS failed (
    id     TEXT PRIMARY KEY,
    record TEXT NOT NULL
);
";

/// Counts of records per partition, for health reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct QueueStats {
    pub pending: u64,
    pub failed: u64,
}

/// Crash-safe holding area for records awaiting transmission.
///
/// The connection lives behind a mutex: pushes and pop-batches fully
/// serialize, so a pop-batch and a concurrent push can never interleave
/// in a way that loses or duplicates a record.
pub struct DurableQueue {
    conn: Mutex<Option<Connection>>,
    max_retries: u32,
}

impl DurableQueue {
    /// Open (or create) the queue database at `path`.
    ///
    /// Failure here is the one process-fatal condition: without the queue
    /// no collected data can be safely buffered.
    pub fn open(path: impl AsRef<Path>, max_retries: u32) -> Result<Self, AgentError> {
        let conn = Connection::open(path.as_ref())?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "FULL")?;
        conn.execute_batch(SCHEMA)?;

        debug!("Opened queue store at {}", path.as_ref().display());
        Ok(Self {
            conn: Mutex::new(Some(conn)),
            max_retries,
        })
    }

    /// Open an in-memory queue, for tests
    pub fn open_in_memory(max_retries: u32) -> Result<Self, AgentError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(Some(conn)),
            max_retries,
        })
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<T, AgentError>,
    ) -> Result<T, AgentError> {
        let mut guard = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let conn = guard.as_mut().ok_or(AgentError::QueueClosed)?;
        f(conn)
    }

    /// Persist a new record into the `pending` partition in one durable
    /// write. Returns the assigned record id. Never blocks on network.
    pub fn push(&self, payload: Map<String, Value>) -> Result<String, AgentError> {
        let record = QueueRecord::new(payload, self.max_retries);
        let raw = serde_json::to_string(&record)?;
        let id = record.id.clone();

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO pending (id, record) VALUES (?1, ?2)",
                params![record.id, raw],
            )?;
            Ok(())
        })?;

        Ok(id)
    }

    /// Re-insert a record after a failed delivery.
    ///
    /// The retry counter is incremented and a fresh id assigned (retried
    /// records are not deduplicated against the original; delivery is
    /// at-least-once). A record past its ceiling moves to the `failed`
    /// partition instead of being discarded.
    pub fn requeue(&self, mut record: QueueRecord) -> Result<(), AgentError> {
        record.retries += 1;
        record.id = next_record_id();

        let exhausted = record.retries > record.max_retries;
        let raw = serde_json::to_string(&record)?;

        self.with_conn(|conn| {
            if exhausted {
                warn!(
                    "Record {} exceeded retry ceiling ({}), moving to failed partition",
                    record.id, record.max_retries
                );
                conn.execute(
                    "INSERT INTO failed (id, record) VALUES (?1, ?2)",
                    params![record.id, raw],
                )?;
            } else {
                conn.execute(
                    "INSERT INTO pending (id, record) VALUES (?1, ?2)",
                    params![record.id, raw],
                )?;
            }
            Ok(())
        })
    }

    /// Atomically read up to `max_items` records in storage order from
    /// `pending` and delete them in the same transaction.
    ///
    /// A storage error aborts the transaction and loses nothing. A row
    /// that fails to decode is logged and skipped — it is deleted with
    /// the batch, never re-queued (bounded loss for malformed rows).
    pub fn pop_batch(&self, max_items: usize) -> Result<Vec<QueueRecord>, AgentError> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;

            // A negative LIMIT means unlimited to SQLite; clamp instead
            // of letting a huge max_items wrap.
            let limit = i64::try_from(max_items).unwrap_or(i64::MAX);

            let rows: Vec<(String, String)> = {
                let mut stmt =
                    tx.prepare("SELECT id, record FROM pending ORDER BY id LIMIT ?1")?;
                let mapped = stmt.query_map(params![limit], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?;
                mapped.collect::<Result<_, _>>()?
            };

            let mut records = Vec::with_capacity(rows.len());
            for (id, raw) in &rows {
                tx.execute("DELETE FROM pending WHERE id = ?1", params![id])?;
                match serde_json::from_str::<QueueRecord>(raw) {
                    Ok(record) => records.push(record),
                    Err(e) => {
                        warn!("Skipping corrupt queued record {}: {}", id, e);
                    }
                }
            }

            tx.commit()?;
            Ok(records)
        })
    }

    /// Current record counts per partition
    pub fn stats(&self) -> Result<QueueStats, AgentError> {
        self.with_conn(|conn| {
            let pending: u64 =
                conn.query_row("SELECT COUNT(*) FROM pending", [], |row| row.get(0))?;
            let failed: u64 =
                conn.query_row("SELECT COUNT(*) FROM failed", [], |row| row.get(0))?;
            Ok(QueueStats { pending, failed })
        })
    }

    /// Release the storage handle. Safe to call once; all later
    /// operations fail with [`AgentError::QueueClosed`].
    pub fn close(&self) -> Result<(), AgentError> {
        let mut guard = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        match guard.take() {
            Some(conn) => conn
                .close()
                .map_err(|(_, e)| AgentError::StorageError(e)),
            None => Err(AgentError::QueueClosed),
        }
    }
}
