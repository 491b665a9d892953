use std::path::{Path, PathBuf};

use crate::config::schema::{Config, PersistenceBackend, SessionMode};
use crate::error::ConfigError;

/// Loads and validates the YAML config at `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

/// Loads the config at `path`, falling back to defaults when the file does not exist.
pub fn load_config_or_default<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        log::info!("No config at {}, using defaults", path.display());
        return Ok(Config::default());
    }
    load_config(path)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    // An empty document parses to `null`; treat it as "all defaults".
    let config: Config = if content.trim().is_empty() {
        Config::default()
    } else {
        serde_yaml::from_str(content)?
    };

    validate_config(&config)?;

    Ok(config)
}

/// Returns the canonical config path: `~/.docuprocess/docuprocess.yaml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".docuprocess").join("docuprocess.yaml"))
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.upload.max_file_size_bytes == 0 {
        return Err(ConfigError::Validation {
            message: "upload.max_file_size_bytes must be greater than 0".to_string(),
        });
    }

    if config.upload.allowed_mime_fragments.is_empty()
        || config
            .upload
            .allowed_mime_fragments
            .iter()
            .any(|f| f.trim().is_empty())
    {
        return Err(ConfigError::Validation {
            message: "upload.allowed_mime_fragments must list at least one non-empty fragment"
                .to_string(),
        });
    }

    if !(1..=100).contains(&config.simulation.steps) {
        return Err(ConfigError::Validation {
            message: format!(
                "simulation.steps must be between 1 and 100, got {}",
                config.simulation.steps
            ),
        });
    }

    if config.persistence.backend == PersistenceBackend::Rest {
        match &config.persistence.rest {
            None => {
                return Err(ConfigError::Validation {
                    message: "persistence.rest is required when backend is 'rest'".to_string(),
                })
            }
            Some(rest) => {
                if !rest.base_url.starts_with("http://") && !rest.base_url.starts_with("https://")
                {
                    return Err(ConfigError::Validation {
                        message: format!(
                            "persistence.rest.base_url must be an http(s) URL, got '{}'",
                            rest.base_url
                        ),
                    });
                }
                if !rest
                    .table
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
                {
                    return Err(ConfigError::Validation {
                        message: format!("Invalid table name: {}", rest.table),
                    });
                }
            }
        }
    }

    match config.session.mode {
        SessionMode::Oauth if config.session.oauth.is_none() => {
            return Err(ConfigError::Validation {
                message: "session.oauth is required when mode is 'oauth'".to_string(),
            });
        }
        SessionMode::Static => {
            if let Some(identity) = &config.session.static_identity {
                if identity.user_id.trim().is_empty() {
                    return Err(ConfigError::Validation {
                        message: "session.static.user_id must not be empty".to_string(),
                    });
                }
            }
        }
        _ => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{LogFormat, MIB};
    use std::io::Write;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config.upload.max_file_size_bytes, 10 * MIB);
        assert_eq!(config.upload.allowed_mime_fragments, vec!["image/", "pdf"]);
        assert_eq!(config.simulation.steps, 10);
        assert_eq!(config.simulation.step_delay_ms, 200);
        assert_eq!(config.persistence.backend, PersistenceBackend::Sqlite);
        assert_eq!(config.session.mode, SessionMode::Static);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_full_config() {
        let yaml = r#"
upload:
  max_file_size_bytes: 2048
simulation:
  steps: 4
  step_delay_ms: 50
persistence:
  backend: rest
  rest:
    base_url: https://project.example.co
    api_key_env_var: DOCUPROCESS_ANON_KEY
session:
  mode: oauth
  oauth:
    base_url: https://project.example.co
    redirect_to: http://localhost:8080/
logging:
  level: debug
  format: json
"#;
        let config = load_config_from_str(yaml).unwrap();
        assert_eq!(config.upload.max_file_size_bytes, 2048);
        assert_eq!(config.simulation.steps, 4);
        assert_eq!(config.persistence.backend, PersistenceBackend::Rest);
        let rest = config.persistence.rest.unwrap();
        assert_eq!(rest.table, "document_processing_history");
        assert_eq!(rest.api_key_env_var.as_deref(), Some("DOCUPROCESS_ANON_KEY"));
        let oauth = config.session.oauth.unwrap();
        assert_eq!(oauth.provider, "google");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_static_identity_block() {
        let yaml = r#"
session:
  static:
    user_id: u1
    display_name: Priya Patel
"#;
        let config = load_config_from_str(yaml).unwrap();
        let identity = config.session.static_identity.unwrap();
        assert_eq!(identity.user_id, "u1");
        assert_eq!(identity.display_name.as_deref(), Some("Priya Patel"));
    }

    #[test]
    fn test_zero_steps_rejected() {
        let err = load_config_from_str("simulation:\n  steps: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }

    #[test]
    fn test_rest_backend_requires_block() {
        let err = load_config_from_str("persistence:\n  backend: rest\n").unwrap_err();
        assert!(err.to_string().contains("persistence.rest"));
    }

    #[test]
    fn test_rest_backend_rejects_bad_table() {
        let yaml = r#"
persistence:
  backend: rest
  rest:
    base_url: https://x.example
    table: "history; drop table"
"#;
        let err = load_config_from_str(yaml).unwrap_err();
        assert!(err.to_string().contains("Invalid table name"));
    }

    #[test]
    fn test_oauth_mode_requires_block() {
        let err = load_config_from_str("session:\n  mode: oauth\n").unwrap_err();
        assert!(err.to_string().contains("session.oauth"));
    }

    #[test]
    fn test_empty_mime_fragment_rejected() {
        let yaml = "upload:\n  allowed_mime_fragments: [\"\"]\n";
        assert!(load_config_from_str(yaml).is_err());
    }

    #[test]
    fn test_invalid_yaml() {
        let err = load_config_from_str("upload: [unclosed").unwrap_err();
        assert!(matches!(err, ConfigError::ParseYaml(_)));
    }

    #[test]
    fn test_load_from_file_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docuprocess.yaml");

        let config = load_config_or_default(&path).unwrap();
        assert_eq!(config.simulation.steps, 10);
        assert!(matches!(
            load_config(&path).unwrap_err(),
            ConfigError::ReadFile { .. }
        ));

        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "simulation:\n  steps: 5").unwrap();
        let config = load_config_or_default(&path).unwrap();
        assert_eq!(config.simulation.steps, 5);
    }

    #[test]
    fn test_default_config_path() {
        let path = default_config_path().unwrap();
        assert!(path.ends_with("docuprocess.yaml"));
        assert!(path.to_string_lossy().contains(".docuprocess"));
    }
}
