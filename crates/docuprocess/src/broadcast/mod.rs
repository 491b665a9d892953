//! Broadcasting modules for real-time event streaming.
//!
//! The upload session publishes entry lifecycle events and user-facing
//! notifications on separate channels so a shell can render each independently.

pub mod notifications;
pub mod upload_progress;

pub use notifications::{
    drain_notifications, Notification, NotificationBroadcaster, NotificationKind,
    NotificationVariant,
};
pub use upload_progress::{EntryTracker, UploadEvent, UploadEventKind, UploadProgressBroadcaster};
