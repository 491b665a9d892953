use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::error::ProcessingError;

/// Where a file's bytes live.
#[derive(Clone)]
pub enum FileSource {
    Memory(Arc<[u8]>),
    Disk(PathBuf),
}

impl std::fmt::Debug for FileSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileSource::Memory(bytes) => write!(f, "Memory({} bytes)", bytes.len()),
            FileSource::Disk(path) => write!(f, "Disk({})", crate::sanitize::redact_path(path)),
        }
    }
}

/// Handle to a selected file: its bytes plus name, size and MIME type.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRef {
    name: String,
    size: u64,
    mime_type: String,
    #[serde(skip)]
    source: FileSource,
}

impl FileRef {
    pub fn in_memory(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        let data: Arc<[u8]> = Arc::from(data.into());
        Self {
            name: name.into(),
            size: data.len() as u64,
            mime_type: mime_type.into(),
            source: FileSource::Memory(data),
        }
    }

    /// Describes a file on disk. Size comes from metadata and the MIME type is
    /// guessed from the extension; nothing is read yet.
    pub fn from_path(path: &Path) -> Result<Self, ProcessingError> {
        let metadata = std::fs::metadata(path).map_err(|e| ProcessingError::ReadDocument {
            path: path.to_path_buf(),
            source: e,
        })?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let mime_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        Ok(Self {
            name,
            size: metadata.len(),
            mime_type,
            source: FileSource::Disk(path.to_path_buf()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn source(&self) -> &FileSource {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_in_memory_size() {
        let file = FileRef::in_memory("scan.jpg", "image/jpeg", vec![1u8; 2048]);
        assert_eq!(file.size(), 2048);
        assert_eq!(file.mime_type(), "image/jpeg");
        assert_eq!(file.name(), "scan.jpg");
    }

    #[test]
    fn test_debug_does_not_dump_bytes() {
        let file = FileRef::in_memory("scan.jpg", "image/jpeg", vec![7u8; 64]);
        let debug = format!("{:?}", file.source());
        assert_eq!(debug, "Memory(64 bytes)");
    }

    #[test]
    fn test_from_path_guesses_mime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("claim.pdf");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(b"%PDF-1.4 test").unwrap();

        let file = FileRef::from_path(&path).unwrap();
        assert_eq!(file.name(), "claim.pdf");
        assert_eq!(file.mime_type(), "application/pdf");
        assert_eq!(file.size(), 13);
        assert!(matches!(file.source(), FileSource::Disk(p) if p == &path));
    }

    #[test]
    fn test_from_path_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.zzzunknown");
        std::fs::write(&path, b"x").unwrap();

        let file = FileRef::from_path(&path).unwrap();
        assert_eq!(file.mime_type(), "application/octet-stream");
    }

    #[test]
    fn test_from_path_missing_file() {
        let err = FileRef::from_path(Path::new("/no/such/file.png")).unwrap_err();
        assert!(matches!(err, ProcessingError::ReadDocument { .. }));
    }
}
