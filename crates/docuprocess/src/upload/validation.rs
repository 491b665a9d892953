use std::time::Duration;

use crate::config::{SimulationConfig, UploadConfig, MIB};
use crate::error::ValidationError;

use super::FileRef;

/// Type and size constraints checked on submission.
#[derive(Debug, Clone)]
pub struct UploadLimits {
    pub max_file_size_bytes: u64,
    pub allowed_mime_fragments: Vec<String>,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self::from(&UploadConfig::default())
    }
}

impl From<&UploadConfig> for UploadLimits {
    fn from(config: &UploadConfig) -> Self {
        Self {
            max_file_size_bytes: config.max_file_size_bytes,
            allowed_mime_fragments: config
                .allowed_mime_fragments
                .iter()
                .map(|f| f.to_ascii_lowercase())
                .collect(),
        }
    }
}

impl UploadLimits {
    /// Type is checked before size; a file failing both reports the type.
    pub fn validate(&self, file: &FileRef) -> Result<(), ValidationError> {
        let mime = file.mime_type().to_ascii_lowercase();
        if !self
            .allowed_mime_fragments
            .iter()
            .any(|fragment| mime.contains(fragment.as_str()))
        {
            return Err(ValidationError::UnsupportedType {
                file_name: file.name().to_string(),
                mime_type: file.mime_type().to_string(),
            });
        }

        if file.size() > self.max_file_size_bytes {
            return Err(ValidationError::TooLarge {
                file_name: file.name().to_string(),
                size: file.size(),
                limit: self.max_file_size_bytes,
                limit_label: size_label(self.max_file_size_bytes),
            });
        }

        Ok(())
    }
}

fn size_label(bytes: u64) -> String {
    if bytes >= MIB && bytes % MIB == 0 {
        format!("{}MB", bytes / MIB)
    } else if bytes >= 1024 && bytes % 1024 == 0 {
        format!("{}KB", bytes / 1024)
    } else {
        format!("{} bytes", bytes)
    }
}

/// Fixed-step progress simulation.
#[derive(Debug, Clone, Copy)]
pub struct ProgressSchedule {
    pub steps: u32,
    pub step_delay: Duration,
}

impl Default for ProgressSchedule {
    fn default() -> Self {
        Self::from(&SimulationConfig::default())
    }
}

impl From<&SimulationConfig> for ProgressSchedule {
    fn from(config: &SimulationConfig) -> Self {
        Self {
            steps: config.steps.max(1),
            step_delay: config.step_delay(),
        }
    }
}

impl ProgressSchedule {
    /// Progress percentage after `step` of `steps` (1-based).
    pub fn progress_at(&self, step: u32) -> u8 {
        let steps = self.steps.max(1);
        (step.min(steps) * 100 / steps) as u8
    }
}
