//! Render-ready projections of session state.
//!
//! Everything here is a pure function of a snapshot; the shell decides how to draw it.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::history::{HistoryRecord, HistoryView};
use crate::processing::{ProcessingResult, ResultStatus};
use crate::upload::{EntryStatus, UploadEntry};

/// Title shown for history rows, whose file name is never stored.
pub const UNNAMED_DOCUMENT: &str = "Unnamed document";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tab {
    #[default]
    Upload,
    History,
}

impl Tab {
    pub fn label(self) -> &'static str {
        match self {
            Tab::Upload => "Upload Documents",
            Tab::History => "Processing History",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusTone {
    Success,
    Danger,
}

/// Size in mebibytes with two decimals, e.g. `2.00 MB`.
pub fn format_size_mb(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / 1024.0 / 1024.0)
}

/// `processing` -> `Processing`
pub fn status_label(status: EntryStatus) -> String {
    capitalize(status.as_str())
}

/// First letter of each word, uppercased: `Priya Patel` -> `PP`.
pub fn initials(name: &str) -> String {
    name.split_whitespace()
        .filter_map(|word| word.chars().next())
        .flat_map(char::to_uppercase)
        .collect()
}

pub fn format_processed_at(at: &DateTime<Utc>) -> String {
    at.format("%-d %b %Y, %H:%M").to_string()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSummary {
    pub document_type: String,
    pub status: String,
    pub validation: String,
    pub anomaly: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ResultSummary {
    pub fn from_result(result: &ProcessingResult) -> Self {
        let metadata = &result.non_sensitive_metadata;
        Self {
            document_type: result.document_type.clone(),
            status: result.status.to_string(),
            validation: metadata.validation_status.clone(),
            anomaly: if metadata.anomaly { "Yes" } else { "No" },
            reason: metadata.anomaly_reason.clone(),
        }
    }
}

/// One row of the upload list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryView {
    pub id: String,
    pub file_name: String,
    pub size: String,
    pub status: String,
    /// Only while processing.
    pub progress: Option<u8>,
    /// Only once completed.
    pub result: Option<ResultSummary>,
}

impl EntryView {
    pub fn from_entry(entry: &UploadEntry) -> Self {
        Self {
            id: entry.id.to_string(),
            file_name: entry.file.name().to_string(),
            size: format_size_mb(entry.file.size()),
            status: status_label(entry.status),
            progress: (entry.status == EntryStatus::Processing).then_some(entry.progress),
            result: match (&entry.status, &entry.result) {
                (EntryStatus::Completed, Some(result)) => Some(ResultSummary::from_result(result)),
                _ => None,
            },
        }
    }
}

/// One card of the history list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItemView {
    pub id: String,
    pub title: String,
    pub document_type: String,
    pub status: String,
    pub tone: StatusTone,
    pub processed_at: String,
    pub anomaly: bool,
}

impl HistoryItemView {
    pub fn from_record(record: &HistoryRecord) -> Self {
        Self {
            id: record.id.clone(),
            title: record
                .display_name()
                .unwrap_or(UNNAMED_DOCUMENT)
                .to_string(),
            document_type: record.document_type.clone(),
            status: record.status.to_string(),
            tone: match record.status {
                ResultStatus::Completed => StatusTone::Success,
                ResultStatus::Error => StatusTone::Danger,
            },
            processed_at: format_processed_at(&record.processed_at),
            anomaly: record.non_sensitive_metadata.anomaly,
        }
    }
}

/// What the history tab shows as a whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryScreen {
    SignInRequired,
    Loading,
    Failed(String),
    Empty,
    Items {
        heading: String,
        items: Vec<HistoryItemView>,
    },
}

impl HistoryScreen {
    pub fn from_view(view: &HistoryView) -> Self {
        if view.sign_in_required {
            return HistoryScreen::SignInRequired;
        }
        if view.loading && view.records.is_empty() {
            return HistoryScreen::Loading;
        }
        if let Some(error) = &view.error {
            return HistoryScreen::Failed(error.clone());
        }
        if view.records.is_empty() {
            return HistoryScreen::Empty;
        }
        HistoryScreen::Items {
            heading: format!("{} documents processed", view.records.len()),
            items: view.records.iter().map(HistoryItemView::from_record).collect(),
        }
    }
}

/// Single-line rendering used by the terminal shell.
pub fn render_entry_line(view: &EntryView) -> String {
    let mut line = format!("{:<32} {:>9}  {}", view.file_name, view.size, view.status);
    if let Some(progress) = view.progress {
        line.push_str(&format!(" {:>3}%", progress));
    }
    if let Some(result) = &view.result {
        line.push_str(&format!(
            "  [{} | {} | anomaly: {}]",
            result.document_type, result.validation, result.anomaly
        ));
        if let Some(reason) = &result.reason {
            line.push_str(&format!(" ({})", reason));
        }
    }
    line
}
