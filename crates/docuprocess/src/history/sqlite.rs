//! History store backed by the local SQLite database.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};

use super::{HistoryQuery, HistoryRecord, HistoryStore, NewHistoryRecord};
use crate::db::history_repo::{self, HistoryRow};
use crate::db::Database;
use crate::error::PersistenceError;

#[derive(Clone)]
pub struct SqliteHistoryStore {
    db: Database,
}

impl SqliteHistoryStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn open(path: &Path) -> Result<Self, PersistenceError> {
        Ok(Self::new(Database::open(path)?))
    }

    pub fn open_in_memory() -> Result<Self, PersistenceError> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

fn to_row(record: NewHistoryRecord) -> Result<HistoryRow, PersistenceError> {
    let extracted_fields = record
        .extracted_fields
        .as_ref()
        .filter(|v| !v.is_null())
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| PersistenceError::Decode(e.to_string()))?;
    let non_sensitive_metadata = serde_json::to_string(&record.non_sensitive_metadata)
        .map_err(|e| PersistenceError::Decode(e.to_string()))?;

    Ok(HistoryRow {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: record.user_id,
        file_name: record.file_name,
        document_type: record.document_type,
        status: record.status.as_str().to_string(),
        // Fixed-width UTC timestamps so text ordering matches time ordering.
        processed_at: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
        extracted_fields,
        non_sensitive_metadata,
    })
}

fn from_row(row: HistoryRow) -> Result<HistoryRecord, PersistenceError> {
    let decode = |field: &str, e: &dyn std::fmt::Display| {
        PersistenceError::Decode(format!("row {} field {}: {}", row.id, field, e))
    };

    let processed_at = DateTime::parse_from_rfc3339(&row.processed_at)
        .map_err(|e| decode("processed_at", &e))?
        .with_timezone(&Utc);
    let status = serde_json::from_value(serde_json::Value::String(row.status.clone()))
        .map_err(|e| decode("status", &e))?;
    let non_sensitive_metadata = serde_json::from_str(&row.non_sensitive_metadata)
        .map_err(|e| decode("non_sensitive_metadata", &e))?;
    let extracted_fields = row
        .extracted_fields
        .as_deref()
        .map(serde_json::from_str)
        .transpose()
        .map_err(|e| decode("extracted_fields", &e))?;

    Ok(HistoryRecord {
        id: row.id.clone(),
        user_id: row.user_id.clone(),
        file_name: Some(row.file_name.clone()),
        document_type: row.document_type.clone(),
        status,
        processed_at,
        extracted_fields,
        non_sensitive_metadata,
    })
}

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    async fn insert(&self, record: NewHistoryRecord) -> Result<(), PersistenceError> {
        record.validate()?;
        let row = to_row(record)?;
        let db = self.db.clone();

        tokio::task::spawn_blocking(move || history_repo::insert(&db, &row))
            .await
            .map_err(|e| PersistenceError::Task(e.to_string()))??;
        Ok(())
    }

    async fn query(&self, query: &HistoryQuery) -> Result<Vec<HistoryRecord>, PersistenceError> {
        let db = self.db.clone();
        let user_id = query.user_id.clone();

        let rows = tokio::task::spawn_blocking(move || history_repo::query_by_user(&db, &user_id))
            .await
        .map_err(|e| PersistenceError::Task(e.to_string()))??;

        rows.into_iter().map(from_row).collect()
    }
}
