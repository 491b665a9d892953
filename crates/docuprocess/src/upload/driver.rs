//! Per-entry lifecycle driver.

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::manager::UploadSessionManager;
use super::{EntryId, EntryUpdateError, FileRef, UploadEntry};
use crate::broadcast::{EntryTracker, Notification};
use crate::history::NewHistoryRecord;
use crate::processing::ProcessingResult;

/// Why a driver stopped before finishing.
#[derive(Debug, thiserror::Error)]
enum Stop {
    #[error("cancelled")]
    Cancelled,

    #[error("entry removed")]
    Removed,

    #[error(transparent)]
    Invalid(#[from] EntryUpdateError),
}

/// Walks one entry through Processing, simulated progress, classification,
/// resolution and (when signed in) the history insert.
pub(super) struct EntryDriver {
    manager: UploadSessionManager,
    entry_id: EntryId,
    file: FileRef,
    cancel: CancellationToken,
}

impl EntryDriver {
    pub(super) fn new(
        manager: UploadSessionManager,
        entry_id: EntryId,
        file: FileRef,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            manager,
            entry_id,
            file,
            cancel,
        }
    }

    pub(super) async fn run(self) {
        let tracker = self.manager.inner.events.tracker(&self.entry_id);

        match self.drive(&tracker).await {
            Ok(()) => {}
            Err(Stop::Invalid(e)) => error!("Driver hit an invalid entry update: {}", e),
            Err(stop) => debug!("Driver stopped: {}", stop),
        }

        self.manager.driver_finished(&self.entry_id);
    }

    async fn drive(&self, tracker: &EntryTracker) -> Result<(), Stop> {
        let inner = &self.manager.inner;

        let entry = self.update(|e| e.begin_processing())?;
        tracker.status_changed(&entry);

        let schedule = &inner.schedule;
        for step in 1..=schedule.steps {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(Stop::Cancelled),
                _ = tokio::time::sleep(schedule.step_delay) => {}
            }
            let progress = schedule.progress_at(step);
            let entry = self.update(|e| e.advance_progress(progress))?;
            tracker.progress(&entry);
        }

        let classified = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(Stop::Cancelled),
            classified = inner.classifier.classify(&self.file) => classified,
        };
        let result = classified.unwrap_or_else(|e| {
            warn!("Classification failed: {}", e);
            ProcessingResult::failed(&e.to_string())
        });

        // The insert decision uses whoever is signed in at this moment.
        let identity = inner.session.current_identity();

        let entry = self.update(|e| e.resolve(result.clone()))?;
        tracker.resolved(&entry);
        info!(
            status = %entry.status,
            document_type = %result.document_type,
            "Entry resolved"
        );
        inner
            .notifications
            .send(Notification::resolved(&self.entry_id, &result));

        let Some(identity) = identity else {
            debug!("No identity at resolution, history insert skipped");
            return Ok(());
        };
        if self.cancel.is_cancelled() {
            return Err(Stop::Cancelled);
        }

        let record = NewHistoryRecord::from_result(&identity, &result);
        match inner.store.insert(record).await {
            Ok(()) => debug!(user_id = %identity.user_id, "History row saved"),
            Err(e) => {
                warn!(user_id = %identity.user_id, "Failed to save history: {}", e);
                inner
                    .notifications
                    .send(Notification::persistence_failed(&self.entry_id, &e));
            }
        }
        Ok(())
    }

    fn update<F>(&self, update: F) -> Result<UploadEntry, Stop>
    where
        F: FnOnce(&mut UploadEntry) -> Result<(), EntryUpdateError>,
    {
        if self.cancel.is_cancelled() {
            return Err(Stop::Cancelled);
        }
        self.manager
            .update_entry(&self.entry_id, update)?
            .ok_or(Stop::Removed)
    }
}
