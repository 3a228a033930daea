//! Harness configuration

use serde::{Deserialize, Serialize};

use crate::classifier::{Classifier, DEFAULT_THRESHOLD_MS};
use crate::error::{Error, Result};
use crate::history::DEFAULT_HISTORY_CAPACITY;

/// Tunables for classification and history retention
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Server duration below which a response counts as cache-served
    pub threshold_ms: u64,

    /// Number of ad-hoc measurements kept in the history log
    pub history_capacity: usize,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            threshold_ms: DEFAULT_THRESHOLD_MS,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

impl HarnessConfig {
    /// Reject values the harness cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.history_capacity == 0 {
            return Err(Error::InvalidInput(
                "history capacity must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Classifier for the configured threshold
    pub fn classifier(&self) -> Classifier {
        Classifier::new(self.threshold_ms)
    }
}
