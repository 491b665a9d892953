use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// One mebibyte.
pub const MIB: u64 = 1024 * 1024;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Constraints applied to every submitted file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_max_file_size")]
    pub max_file_size_bytes: u64,
    /// A MIME type is accepted when it contains any of these fragments.
    #[serde(default = "default_mime_fragments")]
    pub allowed_mime_fragments: Vec<String>,
}

fn default_max_file_size() -> u64 {
    10 * MIB
}

fn default_mime_fragments() -> Vec<String> {
    vec!["image/".to_string(), "pdf".to_string()]
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: default_max_file_size(),
            allowed_mime_fragments: default_mime_fragments(),
        }
    }
}

/// Timing of the simulated processing loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_steps")]
    pub steps: u32,
    #[serde(default = "default_step_delay_ms")]
    pub step_delay_ms: u64,
}

fn default_steps() -> u32 {
    10
}

fn default_step_delay_ms() -> u64 {
    200
}

impl SimulationConfig {
    pub fn step_delay(&self) -> Duration {
        Duration::from_millis(self.step_delay_ms)
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            steps: default_steps(),
            step_delay_ms: default_step_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistenceBackend {
    Memory,
    #[default]
    Sqlite,
    Rest,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistenceConfig {
    #[serde(default)]
    pub backend: PersistenceBackend,
    /// Overrides the default `~/.docuprocess/data/history.db`.
    #[serde(default)]
    pub sqlite_path: Option<PathBuf>,
    #[serde(default)]
    pub rest: Option<RestStoreConfig>,
}

/// Hosted table endpoint (`{base_url}/rest/v1/{table}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestStoreConfig {
    pub base_url: String,
    #[serde(default = "default_table")]
    pub table: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default)]
    pub api_key_env_var: Option<String>,
    /// No timeout is applied when unset.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_table() -> String {
    "document_processing_history".to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    #[default]
    Static,
    Oauth,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub mode: SessionMode,
    #[serde(default, rename = "static")]
    pub static_identity: Option<StaticIdentityConfig>,
    #[serde(default)]
    pub oauth: Option<OAuthConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticIdentityConfig {
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthConfig {
    pub base_url: String,
    #[serde(default = "default_oauth_provider")]
    pub provider: String,
    #[serde(default)]
    pub redirect_to: Option<String>,
}

fn default_oauth_provider() -> String {
    "google".to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}
