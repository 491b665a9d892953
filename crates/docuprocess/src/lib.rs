pub mod broadcast;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod history;
pub mod processing;
pub mod sanitize;
pub mod secrets;
pub mod session;
pub mod telemetry;
pub mod upload;
pub mod view;

pub use broadcast::{Notification, NotificationBroadcaster, UploadEvent, UploadProgressBroadcaster};
pub use config::{load_config, Config};
pub use context::AppContext;
pub use error::{
    ConfigError, DocuprocessError, PersistenceError, ProcessingError, Result, SessionError,
    UploadError, ValidationError,
};
pub use history::{HistoryRecord, HistoryStore, HistoryView, HistoryViewAdapter, NewHistoryRecord};
pub use processing::{DocumentClassifier, ProcessingResult};
pub use secrets::{resolve_secret, SecretError};
pub use session::{Identity, SessionProvider};
pub use upload::{EntryId, EntryStatus, FileRef, UploadEntry, UploadSessionManager};
