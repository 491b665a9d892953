//! Upload progress broadcaster for real-time entry status streaming.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::processing::ProcessingResult;
use crate::upload::{EntryId, EntryStatus, UploadEntry};

/// What changed on an entry.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UploadEventKind {
    Added,
    StatusChanged,
    Progress,
    Resolved,
    Removed,
}

/// Lifecycle event for one entry, carrying its state after the change.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadEvent {
    pub entry_id: EntryId,
    pub kind: UploadEventKind,
    pub status: EntryStatus,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ProcessingResult>,
    pub timestamp: DateTime<Utc>,
}

impl UploadEvent {
    pub fn from_entry(kind: UploadEventKind, entry: &UploadEntry) -> Self {
        Self {
            entry_id: entry.id.clone(),
            kind,
            status: entry.status,
            progress: entry.progress,
            result: entry.result.clone(),
            timestamp: Utc::now(),
        }
    }

    pub fn removed(entry: &UploadEntry) -> Self {
        Self::from_entry(UploadEventKind::Removed, entry)
    }
}

/// Broadcasts upload events to any number of subscribers.
#[derive(Clone)]
pub struct UploadProgressBroadcaster {
    sender: Arc<broadcast::Sender<UploadEvent>>,
}

impl UploadProgressBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn send(&self, event: UploadEvent) {
        // Ignore errors - no active receivers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UploadEvent> {
        self.sender.subscribe()
    }

    /// Creates a tracker bound to one entry.
    pub fn tracker(&self, entry_id: &EntryId) -> EntryTracker {
        EntryTracker {
            entry_id: entry_id.clone(),
            sender: Arc::clone(&self.sender),
        }
    }
}

impl Default for UploadProgressBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Emits events for a single entry on behalf of its driver.
pub struct EntryTracker {
    entry_id: EntryId,
    sender: Arc<broadcast::Sender<UploadEvent>>,
}

impl EntryTracker {
    fn emit(&self, kind: UploadEventKind, entry: &UploadEntry) {
        debug_assert_eq!(entry.id, self.entry_id);
        let _ = self.sender.send(UploadEvent::from_entry(kind, entry));
    }

    pub fn status_changed(&self, entry: &UploadEntry) {
        self.emit(UploadEventKind::StatusChanged, entry);
    }

    pub fn progress(&self, entry: &UploadEntry) {
        self.emit(UploadEventKind::Progress, entry);
    }

    pub fn resolved(&self, entry: &UploadEntry) {
        self.emit(UploadEventKind::Resolved, entry);
    }
}
