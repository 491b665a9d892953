//! Tracing subscriber setup.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

use crate::config::{LogFormat, LoggingConfig};
use crate::error::{DocuprocessError, Result};

/// Builds the filter: `RUST_LOG` when set, otherwise the configured level.
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
}

/// Installs the global subscriber and routes `log` records into it.
///
/// Call once per process; a second call returns an error.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let (pretty, json) = match config.format {
        LogFormat::Pretty => (Some(fmt::layer().with_target(false)), None),
        LogFormat::Json => (None, Some(fmt::layer().json().with_current_span(true))),
    };

    let subscriber = Registry::default()
        .with(env_filter(config))
        .with(pretty)
        .with(json);

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| DocuprocessError::Telemetry(e.to_string()))?;
    tracing_log::LogTracer::init().map_err(|e| DocuprocessError::Telemetry(e.to_string()))?;

    Ok(())
}
