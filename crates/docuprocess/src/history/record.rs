//! History row types and the boundary check for inserts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PersistenceError;
use crate::processing::{NonSensitiveMetadata, ProcessingResult, ResultStatus};
use crate::session::{AccessToken, Identity};

/// Row written once per resolved entry while signed in.
///
/// `file_name` and `extracted_fields` exist in the table but are always written
/// empty/null; [`NewHistoryRecord::validate`] refuses anything else.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewHistoryRecord {
    pub user_id: String,
    pub file_name: String,
    pub document_type: String,
    pub status: ResultStatus,
    pub extracted_fields: Option<serde_json::Value>,
    pub non_sensitive_metadata: NonSensitiveMetadata,
    /// Credential of the user the row belongs to. Never part of the row.
    #[serde(skip)]
    pub access_token: Option<AccessToken>,
}

impl NewHistoryRecord {
    pub fn from_result(identity: &Identity, result: &ProcessingResult) -> Self {
        Self {
            user_id: identity.user_id.clone(),
            file_name: String::new(),
            document_type: result.document_type.clone(),
            status: result.status,
            extracted_fields: None,
            non_sensitive_metadata: result.non_sensitive_metadata.clone(),
            access_token: identity.access_token.clone(),
        }
    }

    pub fn validate(&self) -> Result<(), PersistenceError> {
        if self.user_id.trim().is_empty() {
            return Err(PersistenceError::MissingField("user_id"));
        }
        if self.document_type.trim().is_empty() {
            return Err(PersistenceError::MissingField("document_type"));
        }
        if !self.file_name.is_empty() {
            return Err(PersistenceError::SensitiveData("file_name"));
        }
        if self.extracted_fields.as_ref().is_some_and(|v| !v.is_null()) {
            return Err(PersistenceError::SensitiveData("extracted_fields"));
        }
        Ok(())
    }
}

/// A stored history row as read back for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub file_name: Option<String>,
    pub document_type: String,
    pub status: ResultStatus,
    pub processed_at: DateTime<Utc>,
    #[serde(default)]
    pub extracted_fields: Option<serde_json::Value>,
    pub non_sensitive_metadata: NonSensitiveMetadata,
}

impl HistoryRecord {
    /// Materializes an insert with a store-assigned id and timestamp.
    pub fn from_new(id: String, processed_at: DateTime<Utc>, record: NewHistoryRecord) -> Self {
        Self {
            id,
            user_id: record.user_id,
            file_name: Some(record.file_name),
            document_type: record.document_type,
            status: record.status,
            processed_at,
            extracted_fields: record.extracted_fields,
            non_sensitive_metadata: record.non_sensitive_metadata,
        }
    }

    /// Stored file name, if one was recorded.
    pub fn display_name(&self) -> Option<&str> {
        self.file_name.as_deref().filter(|n| !n.trim().is_empty())
    }
}

/// Filter for [`super::HistoryStore::query`]. Results are always newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryQuery {
    pub user_id: String,
    pub access_token: Option<AccessToken>,
}

impl HistoryQuery {
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            access_token: None,
        }
    }

    /// Rows of the signed-in user, queried with their own credential.
    pub fn for_identity(identity: &Identity) -> Self {
        Self {
            user_id: identity.user_id.clone(),
            access_token: identity.access_token.clone(),
        }
    }
}
