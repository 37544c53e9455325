//! Sync event broadcaster for streaming status transitions.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::status::{SourceStatus, SyncStatus};

/// A status transition of one source.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncEvent {
    pub source_index: usize,
    /// Identifies the pass; `Running` and its terminal event share it.
    pub run_id: Uuid,
    pub status: SyncStatus,
    pub components_count: usize,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl SyncEvent {
    pub fn from_status(source_index: usize, run_id: Uuid, status: &SourceStatus) -> Self {
        Self {
            source_index,
            run_id,
            status: status.status,
            components_count: status.components_count,
            error: status.last_error.clone(),
            timestamp: Utc::now(),
        }
    }
}

/// Broadcasts sync events to any number of subscribers.
#[derive(Clone)]
pub struct SyncEventBroadcaster {
    sender: Arc<broadcast::Sender<SyncEvent>>,
}

impl SyncEventBroadcaster {
    /// Creates a new broadcaster with the specified channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Sends an event to all subscribers.
    pub fn send(&self, event: SyncEvent) {
        // Ignore errors - no active receivers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.sender.subscribe()
    }
}

impl Default for SyncEventBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}
