use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocuprocessError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Processing error: {0}")]
    Processing(#[from] ProcessingError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    #[error("Logging setup failed: {0}")]
    Telemetry(String),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config YAML: {0}")]
    ParseYaml(#[from] serde_yaml::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Failed to resolve secret for '{name}': {source}")]
    Secret {
        name: String,
        #[source]
        source: crate::secrets::SecretError,
    },
}

/// A file refused at submission time. The message is what the user sees.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{file_name} is not a supported format. Please upload images or PDFs.")]
    UnsupportedType {
        file_name: String,
        mime_type: String,
    },

    #[error("{file_name} exceeds the {limit_label} limit.")]
    TooLarge {
        file_name: String,
        size: u64,
        limit: u64,
        limit_label: String,
    },
}

impl ValidationError {
    /// Notification title for this rejection.
    pub fn title(&self) -> &'static str {
        match self {
            ValidationError::UnsupportedType { .. } => "Invalid file type",
            ValidationError::TooLarge { .. } => "File too large",
        }
    }

    pub fn file_name(&self) -> &str {
        match self {
            ValidationError::UnsupportedType { file_name, .. }
            | ValidationError::TooLarge { file_name, .. } => file_name,
        }
    }
}

#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("Failed to read document '{path}': {source}")]
    ReadDocument {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Classification failed: {0}")]
    Classification(String),

    #[error("No canned outcomes available")]
    NoOutcomes,

    #[error("Failed to parse canned outcomes: {0}")]
    InvalidOutcomes(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Refusing to persist sensitive data: {0}")]
    SensitiveData(&'static str),

    #[error("Record is missing required field '{0}'")]
    MissingField(&'static str),

    #[error("Request to history store failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("History store returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Failed to decode history row: {0}")]
    Decode(String),

    #[error("Local history database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("History store task failed: {0}")]
    Task(String),
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Sign-in failed: {0}")]
    SignInFailed(String),

    #[error("Invalid identity service URL: {0}")]
    InvalidUrl(String),

    #[error("Not signed in")]
    NotSignedIn,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    #[error("Upload session has been shut down")]
    Closed,
}

pub type Result<T> = std::result::Result<T, DocuprocessError>;
