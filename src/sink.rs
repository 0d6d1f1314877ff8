//! Where delivery records go once an attempt has finished.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::errors::SinkError;

/// Status recorded when the target could not be reached at all.
pub const TRANSPORT_FAILED: u16 = 0;

/// Outcome of one forward attempt, stored once and never changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub webhook_id: String,
    /// Payload as received.
    pub source_payload: String,
    /// Payload as sent.
    pub payload: String,
    /// Target status, or [`TRANSPORT_FAILED`].
    pub response_code: u16,
    /// Target response body, or `Error: <message>`.
    pub response_body: String,
    pub recorded_at: DateTime<Utc>,
}

impl DeliveryRecord {
    pub fn transport_failed(&self) -> bool {
        self.response_code == TRANSPORT_FAILED
    }
}

#[async_trait]
pub trait DeliverySink: Send + Sync {
    async fn record(&self, record: DeliveryRecord) -> Result<(), SinkError>;
}

/// Keeps records in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<DeliveryRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<DeliveryRecord> {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl DeliverySink for MemorySink {
    async fn record(&self, record: DeliveryRecord) -> Result<(), SinkError> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record);
        Ok(())
    }
}

/// Appends one JSON document per line to a file.
#[derive(Debug)]
pub struct JsonLinesSink {
    path: PathBuf,
    lock: tokio::sync::Mutex<()>,
}

impl JsonLinesSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DeliverySink for JsonLinesSink {
    async fn record(&self, record: DeliveryRecord) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');

        let _guard = self.lock.lock().await;
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Emits each record as a `tracing` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

#[async_trait]
impl DeliverySink for TracingSink {
    async fn record(&self, record: DeliveryRecord) -> Result<(), SinkError> {
        tracing::info!(
            webhook_id = %record.webhook_id,
            response_code = record.response_code,
            payload = %record.payload,
            source_payload = %record.source_payload,
            response_body = %record.response_body,
            "delivery recorded"
        );
        Ok(())
    }
}
