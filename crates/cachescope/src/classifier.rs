//! Cache-hit classification from server-reported duration
//!
//! The verdict is a latency heuristic, not ground truth from the backend.
//! A response with no duration hint reports 0 ms and therefore classifies
//! as a hit.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::probe::Measurement;

/// Default boundary below which a response counts as cache-served
pub const DEFAULT_THRESHOLD_MS: u64 = 50;

/// Classify with the default threshold
pub fn classify(server_ms: u64) -> bool {
    Classifier::default().classify(server_ms)
}

/// Hit/miss verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// Served from cache
    Hit,
    /// Served by the backing store
    Miss,
}

impl From<bool> for Verdict {
    fn from(hit: bool) -> Self {
        if hit {
            Verdict::Hit
        } else {
            Verdict::Miss
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Hit => f.write_str("HIT"),
            Verdict::Miss => f.write_str("MISS"),
        }
    }
}

/// Threshold classifier: `hit = server_ms < threshold_ms`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classifier {
    threshold_ms: u64,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD_MS)
    }
}

impl Classifier {
    /// Create a classifier with the given threshold
    pub const fn new(threshold_ms: u64) -> Self {
        Self { threshold_ms }
    }

    /// Configured threshold in milliseconds
    pub fn threshold_ms(&self) -> u64 {
        self.threshold_ms
    }

    /// Whether `server_ms` counts as a cache hit
    pub fn classify(&self, server_ms: u64) -> bool {
        server_ms < self.threshold_ms
    }

    /// Same as [`Classifier::classify`], as a [`Verdict`]
    pub fn verdict(&self, server_ms: u64) -> Verdict {
        Verdict::from(self.classify(server_ms))
    }

    /// Attach a verdict to a measurement
    pub fn apply(&self, measurement: Measurement) -> ClassifiedResult {
        let hit = self.classify(measurement.server_ms);
        ClassifiedResult { measurement, hit }
    }
}

/// A measurement together with its verdict
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedResult {
    /// The timed lookup
    pub measurement: Measurement,

    /// Whether the lookup classified as a cache hit
    pub hit: bool,
}

impl ClassifiedResult {
    /// Verdict form of `hit`
    pub fn verdict(&self) -> Verdict {
        Verdict::from(self.hit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Item;

    #[test]
    fn test_default_boundary() {
        assert!(classify(0));
        assert!(classify(49));
        assert!(!classify(50));
        assert!(!classify(51));
        assert!(!classify(u64::MAX));
    }

    #[test]
    fn test_threshold_is_strict_and_monotone() {
        let c = Classifier::new(50);
        let first_miss = (0..200).find(|&ms| !c.classify(ms));
        assert_eq!(first_miss, Some(50));
        assert!((50..200).all(|ms| !c.classify(ms)));
    }

    #[test]
    fn test_custom_threshold() {
        let c = Classifier::new(10);
        assert!(c.classify(9));
        assert!(!c.classify(10));
        assert_eq!(c.verdict(120), Verdict::Miss);

        // Zero threshold classifies everything as a miss
        assert!(!Classifier::new(0).classify(0));
    }

    #[test]
    fn test_apply() {
        let m = Measurement {
            item: Item {
                id: "1".to_string(),
                name: String::new(),
                description: String::new(),
            },
            client_ms: 30,
            server_ms: 12,
        };
        let result = Classifier::default().apply(m);
        assert!(result.hit);
        assert_eq!(result.verdict().to_string(), "HIT");
    }
}
