//! Document classification seam.
//!
//! A classifier takes an uploaded file and produces a [`ProcessingResult`]. The only
//! implementation shipped here samples canned outcomes; a real OCR/classification
//! backend plugs in behind the same trait.

pub mod canned;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProcessingError;
use crate::upload::FileRef;

pub use canned::CannedClassifier;

/// Outcome reported by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Completed,
    Error,
}

impl ResultStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultStatus::Completed => "completed",
            ResultStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result fields that are safe to persist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonSensitiveMetadata {
    pub validation_status: String,
    pub anomaly: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anomaly_reason: Option<String>,
}

/// Classification of one document. Carries no extracted field values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub document_type: String,
    pub status: ResultStatus,
    pub non_sensitive_metadata: NonSensitiveMetadata,
}

impl ProcessingResult {
    /// Result recorded when the classifier itself fails.
    pub fn failed(reason: &str) -> Self {
        Self {
            document_type: "Unknown".to_string(),
            status: ResultStatus::Error,
            non_sensitive_metadata: NonSensitiveMetadata {
                validation_status: "processing_failed".to_string(),
                anomaly: false,
                anomaly_reason: Some(reason.to_string()),
            },
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == ResultStatus::Error
    }
}

#[async_trait]
pub trait DocumentClassifier: Send + Sync {
    async fn classify(&self, file: &FileRef) -> Result<ProcessingResult, ProcessingError>;
}
