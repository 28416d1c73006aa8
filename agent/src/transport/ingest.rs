//! Batch ingest and telemetry delivery

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tracing::debug;

use crate::errors::AgentError;
use crate::queue::record::QueueRecord;
use crate::transport::client::Transport;

/// Envelope posted to the ingest endpoint
#[derive(Debug, Clone, Serialize)]
pub struct BatchEnvelope<'a> {
    pub items: &'a [QueueRecord],
    pub timestamp: String,
}

impl Transport {
    /// Send collected records to the ingest endpoint.
    ///
    /// A no-op for an empty slice. Records are split into chunks bounded
    /// by the configured item and byte limits; each chunk is wrapped in
    /// an envelope with a send timestamp and posted separately. The first
    /// chunk failure aborts the call — the caller owns re-queuing
    /// everything it popped.
    pub async fn send_batch(&self, records: &[QueueRecord]) -> Result<(), AgentError> {
        if records.is_empty() {
            return Ok(());
        }

        for chunk in self.chunk_records(records)? {
            let envelope = BatchEnvelope {
                items: chunk,
                timestamp: Utc::now().to_rfc3339(),
            };
            self.post_json("/agent/ingest", &envelope).await?;
            debug!("Delivered batch of {} records", chunk.len());
        }

        Ok(())
    }

    /// Post a single heartbeat/metrics document
    pub async fn send_telemetry<T: Serialize>(&self, doc: &T) -> Result<(), AgentError> {
        let body = json!({
            "telemetry": doc,
            "timestamp": Utc::now().to_rfc3339(),
        });
        self.post_json("/agent/telemetry", &body).await
    }

    /// Split records into contiguous chunks within the item and byte
    /// budgets. A single oversized record still ships alone rather than
    /// being dropped.
    fn chunk_records<'a>(
        &self,
        records: &'a [QueueRecord],
    ) -> Result<Vec<&'a [QueueRecord]>, AgentError> {
        let max_items = self.config().batch_max_items.max(1);
        let max_bytes = self.config().batch_max_bytes.max(1);

        let mut chunks = Vec::new();
        let mut start = 0;
        let mut bytes = 0;

        for (idx, record) in records.iter().enumerate() {
            let size = serde_json::to_vec(record)?.len();
            let over_items = idx - start >= max_items;
            let over_bytes = idx > start && bytes + size > max_bytes;

            if over_items || over_bytes {
                chunks.push(&records[start..idx]);
                start = idx;
                bytes = 0;
            }
            bytes += size;
        }
        chunks.push(&records[start..]);

        Ok(chunks)
    }
}
