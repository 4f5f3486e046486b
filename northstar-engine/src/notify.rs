//! Notification collaborator boundary
//!
//! The engine enqueues records; delivery belongs to a separate collaborator.
//! Aggregation never fails because a notification could not be queued.

use async_trait::async_trait;
use northstar_core::{NorthstarResult, NotificationRecord};
use std::sync::Mutex;

/// Boundary to the notification collaborator.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Queue a record for delivery.
    async fn enqueue(&self, record: NotificationRecord) -> NorthstarResult<()>;
}

/// Sink that drops every record. For deployments without a notification
/// collaborator wired up.
#[derive(Debug, Default)]
pub struct NullSink;

impl NullSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationSink for NullSink {
    async fn enqueue(&self, _record: NotificationRecord) -> NorthstarResult<()> {
        Ok(())
    }
}

/// Inspectable sink collecting records in memory. For tests.
#[derive(Debug, Default)]
pub struct InMemorySink {
    records: Mutex<Vec<NotificationRecord>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything enqueued so far.
    pub fn records(&self) -> Vec<NotificationRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl NotificationSink for InMemorySink {
    async fn enqueue(&self, record: NotificationRecord) -> NorthstarResult<()> {
        if let Ok(mut records) = self.records.lock() {
            records.push(record);
        }
        Ok(())
    }
}
