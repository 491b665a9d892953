//! User-facing notifications (toasts) raised by the upload session.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;
use tracing::warn;

use crate::error::{PersistenceError, ValidationError};
use crate::processing::ProcessingResult;
use crate::upload::EntryId;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationVariant {
    Default,
    Destructive,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Rejected,
    Processed,
    ProcessingFailed,
    PersistenceFailed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub description: String,
    pub variant: NotificationVariant,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_id: Option<EntryId>,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    /// A file refused at submission.
    pub fn rejected(error: &ValidationError) -> Self {
        Self {
            kind: NotificationKind::Rejected,
            title: error.title().to_string(),
            description: error.to_string(),
            variant: NotificationVariant::Destructive,
            entry_id: None,
            timestamp: Utc::now(),
        }
    }

    /// An entry resolved, successfully or not.
    pub fn resolved(entry_id: &EntryId, result: &ProcessingResult) -> Self {
        let (kind, title, description) = if result.is_error() {
            (
                NotificationKind::ProcessingFailed,
                "Document processing failed",
                "There was an error processing your document.",
            )
        } else {
            (
                NotificationKind::Processed,
                "Document processed successfully",
                "OCR extraction and field detection completed.",
            )
        };
        Self {
            kind,
            title: title.to_string(),
            description: description.to_string(),
            variant: NotificationVariant::Default,
            entry_id: Some(entry_id.clone()),
            timestamp: Utc::now(),
        }
    }

    /// The history insert for an entry failed. The entry itself is unaffected.
    pub fn persistence_failed(entry_id: &EntryId, error: &PersistenceError) -> Self {
        Self {
            kind: NotificationKind::PersistenceFailed,
            title: "Could not save to history".to_string(),
            description: format!("The result was not recorded: {}", error),
            variant: NotificationVariant::Destructive,
            entry_id: Some(entry_id.clone()),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Clone)]
pub struct NotificationBroadcaster {
    sender: broadcast::Sender<Notification>,
}

impl NotificationBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn send(&self, notification: Notification) {
        // Ignore errors - no active receivers is fine
        let _ = self.sender.send(notification);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }
}

/// Takes every notification currently buffered in `rx`.
///
/// A lagging receiver skips the overwritten notifications and keeps reading
/// whatever is still buffered.
pub fn drain_notifications(rx: &mut broadcast::Receiver<Notification>) -> Vec<Notification> {
    let mut drained = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(notification) => drained.push(notification),
            Err(TryRecvError::Lagged(skipped)) => {
                warn!(skipped, "Notification receiver lagged");
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
        }
    }
    drained
}

impl Default for NotificationBroadcaster {
    fn default() -> Self {
        Self::new(128)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::{NonSensitiveMetadata, ResultStatus};

    fn result(status: ResultStatus) -> ProcessingResult {
        ProcessingResult {
            document_type: "Medical Bill".to_string(),
            status,
            non_sensitive_metadata: NonSensitiveMetadata {
                validation_status: "valid".to_string(),
                anomaly: false,
                anomaly_reason: None,
            },
        }
    }

    #[test]
    fn test_rejected_notification() {
        let error = ValidationError::TooLarge {
            file_name: "big.pdf".to_string(),
            size: 15,
            limit: 10,
            limit_label: "10MB".to_string(),
        };
        let n = Notification::rejected(&error);
        assert_eq!(n.kind, NotificationKind::Rejected);
        assert_eq!(n.title, "File too large");
        assert_eq!(n.description, "big.pdf exceeds the 10MB limit.");
        assert_eq!(n.variant, NotificationVariant::Destructive);
        assert!(n.entry_id.is_none());
    }

    #[test]
    fn test_resolved_notifications() {
        let id = EntryId::new();
        let ok = Notification::resolved(&id, &result(ResultStatus::Completed));
        assert_eq!(ok.kind, NotificationKind::Processed);
        assert_eq!(ok.title, "Document processed successfully");

        let failed = Notification::resolved(&id, &result(ResultStatus::Error));
        assert_eq!(failed.kind, NotificationKind::ProcessingFailed);
        assert_eq!(failed.entry_id, Some(id));
    }

    #[test]
    fn test_persistence_failed_notification() {
        let id = EntryId::new();
        let err = PersistenceError::Http {
            status: 503,
            body: "unavailable".to_string(),
        };
        let n = Notification::persistence_failed(&id, &err);
        assert_eq!(n.kind, NotificationKind::PersistenceFailed);
        assert!(n.description.contains("503"));
    }

    #[test]
    fn test_drain_continues_past_lag() {
        let broadcaster = NotificationBroadcaster::new(4);
        let mut rx = broadcaster.subscribe();
        for i in 0..10 {
            let error = ValidationError::UnsupportedType {
                file_name: format!("notes-{}.txt", i),
                mime_type: "text/plain".to_string(),
            };
            broadcaster.send(Notification::rejected(&error));
        }

        let drained = drain_notifications(&mut rx);
        assert_eq!(drained.len(), 4);
        assert!(drained[3].description.contains("notes-9.txt"));
        assert!(drain_notifications(&mut rx).is_empty());
    }

    #[test]
    fn test_broadcast_roundtrip() {
        let broadcaster = NotificationBroadcaster::new(4);
        let mut rx = broadcaster.subscribe();
        broadcaster.send(Notification::resolved(
            &EntryId::new(),
            &result(ResultStatus::Completed),
        ));
        assert_eq!(rx.try_recv().unwrap().kind, NotificationKind::Processed);
    }
}
