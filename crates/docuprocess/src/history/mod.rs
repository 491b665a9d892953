//! Processing history: the persistence seam and the read-side view adapter.

pub mod adapter;
pub mod memory;
pub mod record;
pub mod rest;
pub mod sqlite;

use async_trait::async_trait;

use crate::error::PersistenceError;

pub use adapter::{HistoryView, HistoryViewAdapter};
pub use memory::MemoryHistoryStore;
pub use record::{HistoryQuery, HistoryRecord, NewHistoryRecord};
pub use rest::RestHistoryStore;
pub use sqlite::SqliteHistoryStore;

/// Row store for processing history.
///
/// Implementations must call [`NewHistoryRecord::validate`] before writing.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn insert(&self, record: NewHistoryRecord) -> Result<(), PersistenceError>;

    /// Rows for `query.user_id`, newest `processed_at` first.
    async fn query(&self, query: &HistoryQuery) -> Result<Vec<HistoryRecord>, PersistenceError>;
}
