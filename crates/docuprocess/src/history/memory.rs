//! In-process history store.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use super::{HistoryQuery, HistoryRecord, HistoryStore, NewHistoryRecord};
use crate::error::PersistenceError;

#[derive(Default)]
pub struct MemoryHistoryStore {
    records: Mutex<Vec<HistoryRecord>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts with existing rows, e.g. to exercise ordering.
    pub fn with_records(records: Vec<HistoryRecord>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }

    pub fn records(&self) -> Result<Vec<HistoryRecord>, PersistenceError> {
        Ok(self.lock()?.clone())
    }

    pub fn len(&self) -> usize {
        self.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<HistoryRecord>>, PersistenceError> {
        self.records
            .lock()
            .map_err(|_| PersistenceError::Task("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn insert(&self, record: NewHistoryRecord) -> Result<(), PersistenceError> {
        record.validate()?;
        let row = HistoryRecord::from_new(uuid::Uuid::new_v4().to_string(), Utc::now(), record);
        self.lock()?.push(row);
        Ok(())
    }

    async fn query(&self, query: &HistoryQuery) -> Result<Vec<HistoryRecord>, PersistenceError> {
        let records = self.lock()?;
        // Reverse first so equal timestamps list the latest insert first.
        let mut matching: Vec<HistoryRecord> = records
            .iter()
            .rev()
            .filter(|r| r.user_id == query.user_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.processed_at.cmp(&a.processed_at));
        Ok(matching)
    }
}
