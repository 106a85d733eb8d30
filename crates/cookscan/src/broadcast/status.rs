//! Status broadcaster for real-time pipeline event streaming.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::model::{PageStatus, RecordStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Page,
    Record,
}

/// One status transition of a page or classification record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEvent {
    pub entity: EntityKind,
    pub id: String,
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

impl StatusEvent {
    pub fn page(id: &str, status: PageStatus) -> Self {
        Self {
            entity: EntityKind::Page,
            id: id.to_string(),
            status: status.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn record(id: &str, status: RecordStatus) -> Self {
        Self {
            entity: EntityKind::Record,
            id: id.to_string(),
            status: status.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Fans status events out to however many subscribers are listening.
#[derive(Clone)]
pub struct StatusBroadcaster {
    sender: broadcast::Sender<StatusEvent>,
}

impl StatusBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Fire-and-forget publish. Dead or absent subscribers are fine.
    pub fn publish(&self, event: StatusEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.sender.subscribe()
    }
}

impl Default for StatusBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}
