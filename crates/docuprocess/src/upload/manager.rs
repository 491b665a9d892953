//! Upload session manager.
//!
//! Owns the ordered entry list for one session. Submissions are validated here,
//! accepted entries are appended in submission order, and each gets its own
//! driver task (see [`super::driver`]). Readers only ever see cloned snapshots.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, Instrument};

use super::driver::EntryDriver;
use super::{EntryId, EntryUpdateError, FileRef, ProgressSchedule, UploadEntry, UploadLimits};
use crate::broadcast::{
    Notification, NotificationBroadcaster, UploadEvent, UploadEventKind,
    UploadProgressBroadcaster,
};
use crate::error::{UploadError, ValidationError};
use crate::history::HistoryStore;
use crate::processing::DocumentClassifier;
use crate::sanitize::hash_file_name;
use crate::session::SessionProvider;

/// Result of one [`UploadSessionManager::submit_files`] call.
#[derive(Debug, Clone, Default)]
pub struct SubmitOutcome {
    /// Ids of accepted entries, in submission order.
    pub accepted: Vec<EntryId>,
    pub rejected: Vec<ValidationError>,
}

pub(super) struct ManagerInner {
    entries: RwLock<Vec<UploadEntry>>,
    drivers: Mutex<HashMap<EntryId, CancellationToken>>,
    limits: UploadLimits,
    pub(super) schedule: ProgressSchedule,
    pub(super) classifier: Arc<dyn DocumentClassifier>,
    pub(super) store: Arc<dyn HistoryStore>,
    pub(super) session: SessionProvider,
    pub(super) events: UploadProgressBroadcaster,
    pub(super) notifications: NotificationBroadcaster,
    /// Drivers that have not finished yet.
    running: watch::Sender<usize>,
    cancel: CancellationToken,
    tasks: TaskTracker,
}

/// Handle to an upload session. Cloning shares the same session.
#[derive(Clone)]
pub struct UploadSessionManager {
    pub(super) inner: Arc<ManagerInner>,
}

pub struct UploadSessionManagerBuilder {
    classifier: Arc<dyn DocumentClassifier>,
    store: Arc<dyn HistoryStore>,
    session: SessionProvider,
    limits: UploadLimits,
    schedule: ProgressSchedule,
    events: UploadProgressBroadcaster,
    notifications: NotificationBroadcaster,
}

impl UploadSessionManagerBuilder {
    pub fn limits(mut self, limits: UploadLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn schedule(mut self, schedule: ProgressSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn events(mut self, events: UploadProgressBroadcaster) -> Self {
        self.events = events;
        self
    }

    pub fn notifications(mut self, notifications: NotificationBroadcaster) -> Self {
        self.notifications = notifications;
        self
    }

    pub fn build(self) -> UploadSessionManager {
        UploadSessionManager {
            inner: Arc::new(ManagerInner {
                entries: RwLock::new(Vec::new()),
                drivers: Mutex::new(HashMap::new()),
                limits: self.limits,
                schedule: self.schedule,
                classifier: self.classifier,
                store: self.store,
                session: self.session,
                events: self.events,
                notifications: self.notifications,
                running: watch::Sender::new(0),
                cancel: CancellationToken::new(),
                tasks: TaskTracker::new(),
            }),
        }
    }
}

impl UploadSessionManager {
    pub fn builder(
        classifier: Arc<dyn DocumentClassifier>,
        store: Arc<dyn HistoryStore>,
        session: SessionProvider,
    ) -> UploadSessionManagerBuilder {
        UploadSessionManagerBuilder {
            classifier,
            store,
            session,
            limits: UploadLimits::default(),
            schedule: ProgressSchedule::default(),
            events: UploadProgressBroadcaster::default(),
            notifications: NotificationBroadcaster::default(),
        }
    }

    /// Validates and enqueues files. Must be called from within a tokio runtime.
    ///
    /// Rejected files raise a notification and never become entries; the rest
    /// of the batch is still accepted.
    pub fn submit_files<I>(&self, files: I) -> Result<SubmitOutcome, UploadError>
    where
        I: IntoIterator<Item = FileRef>,
    {
        if self.is_closed() {
            return Err(UploadError::Closed);
        }

        let mut outcome = SubmitOutcome::default();
        let mut accepted = Vec::new();

        for file in files {
            match self.inner.limits.validate(&file) {
                Ok(()) => accepted.push(UploadEntry::new(file)),
                Err(e) => {
                    info!(
                        file = %hash_file_name(e.file_name()),
                        reason = e.title(),
                        "Upload rejected"
                    );
                    self.inner.notifications.send(Notification::rejected(&e));
                    outcome.rejected.push(e);
                }
            }
        }

        if accepted.is_empty() {
            return Ok(outcome);
        }

        self.write_entries().extend(accepted.iter().cloned());

        for entry in &accepted {
            self.inner
                .events
                .send(UploadEvent::from_entry(UploadEventKind::Added, entry));
            self.spawn_driver(entry);
            outcome.accepted.push(entry.id.clone());
        }

        info!(
            accepted = outcome.accepted.len(),
            rejected = outcome.rejected.len(),
            "Files submitted"
        );
        Ok(outcome)
    }

    fn spawn_driver(&self, entry: &UploadEntry) {
        let cancel = self.inner.cancel.child_token();
        self.lock_drivers()
            .insert(entry.id.clone(), cancel.clone());

        let span = tracing::info_span!(
            "upload.driver",
            entry_id = %entry.id,
            file = %hash_file_name(entry.file.name())
        );
        let driver = EntryDriver::new(self.clone(), entry.id.clone(), entry.file.clone(), cancel);
        self.inner.running.send_modify(|n| *n += 1);
        self.inner.tasks.spawn(driver.run().instrument(span));
    }

    /// Drops an entry and cancels its driver. Persisted history is untouched.
    ///
    /// Returns `false` if no entry has that id.
    pub fn remove_entry(&self, id: &EntryId) -> bool {
        if let Some(token) = self.lock_drivers().remove(id) {
            token.cancel();
        }

        let removed = {
            let mut entries = self.write_entries();
            entries
                .iter()
                .position(|e| &e.id == id)
                .map(|index| entries.remove(index))
        };

        match removed {
            Some(entry) => {
                info!(entry_id = %entry.id, status = %entry.status, "Entry removed");
                self.inner.events.send(UploadEvent::removed(&entry));
                true
            }
            None => false,
        }
    }

    /// Snapshot of all entries in submission order.
    pub fn entries(&self) -> Vec<UploadEntry> {
        self.read_entries().clone()
    }

    pub fn entry(&self, id: &EntryId) -> Option<UploadEntry> {
        self.read_entries().iter().find(|e| &e.id == id).cloned()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UploadEvent> {
        self.inner.events.subscribe()
    }

    pub fn notifications(&self) -> broadcast::Receiver<Notification> {
        self.inner.notifications.subscribe()
    }

    pub fn session(&self) -> &SessionProvider {
        &self.inner.session
    }

    /// Number of drivers that have not finished yet.
    pub fn active_drivers(&self) -> usize {
        *self.inner.running.borrow()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Waits until no driver is running, including drivers spawned while
    /// waiting. Any number of tasks may wait at once.
    pub async fn wait_idle(&self) {
        let mut running = self.inner.running.subscribe();
        // Cannot fail: `self` keeps the sender alive.
        let _ = running.wait_for(|n| *n == 0).await;
    }

    /// Cancels all drivers, waits for them, and clears the session.
    /// Later submissions fail with [`UploadError::Closed`].
    pub async fn shutdown(&self) {
        info!(active = self.active_drivers(), "Shutting down upload session");
        self.inner.cancel.cancel();
        self.inner.tasks.close();
        self.inner.tasks.wait().await;

        self.lock_drivers().clear();
        self.write_entries().clear();
        info!("Upload session stopped");
    }

    /// Applies `update` to the entry with `id` and returns the new state.
    ///
    /// `Ok(None)` means the entry has been removed.
    pub(super) fn update_entry<F>(
        &self,
        id: &EntryId,
        update: F,
    ) -> Result<Option<UploadEntry>, EntryUpdateError>
    where
        F: FnOnce(&mut UploadEntry) -> Result<(), EntryUpdateError>,
    {
        let mut entries = self.write_entries();
        let Some(entry) = entries.iter_mut().find(|e| &e.id == id) else {
            return Ok(None);
        };
        update(entry)?;
        Ok(Some(entry.clone()))
    }

    /// Called by a driver as its last step.
    pub(super) fn driver_finished(&self, id: &EntryId) {
        self.lock_drivers().remove(id);
        self.inner.running.send_modify(|n| *n = n.saturating_sub(1));
    }

    // A panic while holding these locks cannot leave an entry half-updated, so a
    // poisoned lock is still usable.
    fn read_entries(&self) -> std::sync::RwLockReadGuard<'_, Vec<UploadEntry>> {
        self.inner
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write_entries(&self) -> std::sync::RwLockWriteGuard<'_, Vec<UploadEntry>> {
        self.inner
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_drivers(&self) -> std::sync::MutexGuard<'_, HashMap<EntryId, CancellationToken>> {
        self.inner
            .drivers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
