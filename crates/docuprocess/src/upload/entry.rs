use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::FileRef;
use crate::processing::{ProcessingResult, ResultStatus};

/// Opaque entry identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(String);

impl EntryId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntryId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Lifecycle status of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

impl EntryStatus {
    /// Pending → Processing → {Completed | Error}; nothing else.
    pub fn can_transition_to(self, next: EntryStatus) -> bool {
        matches!(
            (self, next),
            (EntryStatus::Pending, EntryStatus::Processing)
                | (EntryStatus::Processing, EntryStatus::Completed)
                | (EntryStatus::Processing, EntryStatus::Error)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, EntryStatus::Completed | EntryStatus::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EntryStatus::Pending => "pending",
            EntryStatus::Processing => "processing",
            EntryStatus::Completed => "completed",
            EntryStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ResultStatus> for EntryStatus {
    fn from(status: ResultStatus) -> Self {
        match status {
            ResultStatus::Completed => EntryStatus::Completed,
            ResultStatus::Error => EntryStatus::Error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EntryUpdateError {
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: EntryStatus, to: EntryStatus },

    #[error("Progress may not go backwards ({current}% -> {requested}%)")]
    ProgressRegression { current: u8, requested: u8 },
}

/// One submitted file and its tracked lifecycle.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadEntry {
    pub id: EntryId,
    pub file: FileRef,
    pub status: EntryStatus,
    /// Percentage, 0–100.
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ProcessingResult>,
    pub submitted_at: DateTime<Utc>,
}

impl UploadEntry {
    pub fn new(file: FileRef) -> Self {
        Self {
            id: EntryId::new(),
            file,
            status: EntryStatus::Pending,
            progress: 0,
            result: None,
            submitted_at: Utc::now(),
        }
    }

    fn transition(&mut self, next: EntryStatus) -> Result<(), EntryUpdateError> {
        if !self.status.can_transition_to(next) {
            return Err(EntryUpdateError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    pub(crate) fn begin_processing(&mut self) -> Result<(), EntryUpdateError> {
        self.transition(EntryStatus::Processing)
    }

    pub(crate) fn advance_progress(&mut self, progress: u8) -> Result<(), EntryUpdateError> {
        if self.status != EntryStatus::Processing {
            return Err(EntryUpdateError::InvalidTransition {
                from: self.status,
                to: EntryStatus::Processing,
            });
        }
        let progress = progress.min(100);
        if progress < self.progress {
            return Err(EntryUpdateError::ProgressRegression {
                current: self.progress,
                requested: progress,
            });
        }
        self.progress = progress;
        Ok(())
    }

    /// Attaches the result and moves to the status it reports.
    pub(crate) fn resolve(&mut self, result: ProcessingResult) -> Result<(), EntryUpdateError> {
        self.transition(result.status.into())?;
        self.progress = 100;
        self.result = Some(result);
        Ok(())
    }
}
