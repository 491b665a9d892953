//! Classifier that samples from a fixed set of canned outcomes.

use std::sync::Mutex;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Deserialize;

use super::{DocumentClassifier, NonSensitiveMetadata, ProcessingResult, ResultStatus};
use crate::error::ProcessingError;
use crate::upload::FileRef;

const EMBEDDED_OUTCOMES: &str = include_str!("canned_results.json");

/// Shape of an entry in the canned outcome file.
///
/// The file mirrors what a real backend returns, extracted fields included. Unknown
/// keys are ignored on parse, so those never reach an entry or the history store.
#[derive(Debug, Deserialize)]
struct CannedOutcome {
    document_type: String,
    status: ResultStatus,
    non_sensitive_metadata: NonSensitiveMetadata,
}

impl From<CannedOutcome> for ProcessingResult {
    fn from(outcome: CannedOutcome) -> Self {
        Self {
            document_type: outcome.document_type,
            status: outcome.status,
            non_sensitive_metadata: outcome.non_sensitive_metadata,
        }
    }
}

pub struct CannedClassifier {
    outcomes: Vec<ProcessingResult>,
    rng: Mutex<StdRng>,
}

impl CannedClassifier {
    /// Uses the outcome file compiled into the crate.
    pub fn embedded() -> Result<Self, ProcessingError> {
        Self::from_json(EMBEDDED_OUTCOMES)
    }

    pub fn from_json(json: &str) -> Result<Self, ProcessingError> {
        let outcomes: Vec<CannedOutcome> = serde_json::from_str(json)?;
        Self::with_outcomes(outcomes.into_iter().map(ProcessingResult::from).collect())
    }

    pub fn with_outcomes(outcomes: Vec<ProcessingResult>) -> Result<Self, ProcessingError> {
        if outcomes.is_empty() {
            return Err(ProcessingError::NoOutcomes);
        }
        Ok(Self {
            outcomes,
            rng: Mutex::new(StdRng::from_entropy()),
        })
    }

    /// Makes sampling reproducible.
    pub fn seeded(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    pub fn outcomes(&self) -> &[ProcessingResult] {
        &self.outcomes
    }

    fn sample(&self) -> Result<ProcessingResult, ProcessingError> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| ProcessingError::Classification("sampler lock poisoned".to_string()))?;
        self.outcomes
            .choose(&mut *rng)
            .cloned()
            .ok_or(ProcessingError::NoOutcomes)
    }
}

#[async_trait]
impl DocumentClassifier for CannedClassifier {
    async fn classify(&self, file: &FileRef) -> Result<ProcessingResult, ProcessingError> {
        let result = self.sample()?;
        tracing::debug!(
            file = %crate::sanitize::hash_file_name(file.name()),
            document_type = %result.document_type,
            status = %result.status,
            "Sampled canned outcome"
        );
        Ok(result)
    }
}
