//! Upload session: file handles, validation, entries and their lifecycle drivers.

mod driver;
pub mod entry;
pub mod file;
pub mod manager;
pub mod validation;

pub use entry::{EntryId, EntryStatus, EntryUpdateError, UploadEntry};
pub use file::{FileRef, FileSource};
pub use manager::{SubmitOutcome, UploadSessionManager, UploadSessionManagerBuilder};
pub use validation::{ProgressSchedule, UploadLimits};
