//! Helpers for keeping document names out of logs and span attributes.
//!
//! Uploaded file names routinely contain patient or policy-holder names, so logs
//! carry a short hash instead.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;

/// Returns a short deterministic hash of a file name for log correlation.
pub fn hash_file_name(name: &str) -> String {
    let mut hasher = DefaultHasher::new();
    name.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// Returns only the extension of a path, lowercased, or `<none>`.
pub fn redact_path(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| format!("*.{}", e.to_ascii_lowercase()))
        .unwrap_or_else(|| "<none>".to_string())
}
