//! Session counters and derived summaries

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::classifier::Classifier;
use crate::history::HistoryEntry;
use crate::sequencer::BenchmarkRun;

/// Running counters for one harness session
#[derive(Debug, Default)]
pub struct SessionStats {
    lookups: AtomicU64,
    failures: AtomicU64,
    evictions: AtomicU64,
    runs: AtomicU64,
}

impl SessionStats {
    /// Create new counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful lookup
    pub fn record_lookup(&self) {
        self.lookups.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed lookup, eviction or run
    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful eviction
    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed benchmark run
    pub fn record_run(&self) {
        self.runs.fetch_add(1, Ordering::Relaxed);
    }

    /// Successful lookups
    pub fn lookups(&self) -> u64 {
        self.lookups.load(Ordering::Relaxed)
    }

    /// Failed operations
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Successful evictions
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Completed benchmark runs
    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::Relaxed)
    }
}

/// Hit/miss breakdown of a history snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryStats {
    /// Entries classified as hits
    pub hits: u64,
    /// Entries classified as misses
    pub misses: u64,
    /// Mean server time in milliseconds
    pub mean_server_ms: f64,
    /// Mean client time in milliseconds
    pub mean_client_ms: f64,
}

impl HistoryStats {
    /// Summarise `entries`, reclassifying each with `classifier`
    ///
    /// The stored `hit` flag is ignored so a changed threshold applies to
    /// old entries too.
    pub fn from_entries(entries: &[HistoryEntry], classifier: &Classifier) -> Self {
        let hits = entries
            .iter()
            .filter(|e| classifier.classify(e.server_ms))
            .count() as u64;
        let total = entries.len() as u64;

        Self {
            hits,
            misses: total - hits,
            mean_server_ms: mean(entries.iter().map(|e| e.server_ms)),
            mean_client_ms: mean(entries.iter().map(|e| e.client_ms)),
        }
    }

    /// Calculate hit ratio (0.0 to 1.0)
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Cold-versus-warm comparison of one benchmark run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    /// Server time of the cold call
    pub cold_server_ms: u64,
    /// Mean server time of the warm calls
    pub mean_warm_server_ms: f64,
    /// Cold over mean warm; `None` when warm calls averaged 0 ms
    pub speedup: Option<f64>,
    /// Warm calls classified as hits
    pub warm_hits: usize,
}

impl RunSummary {
    /// Summarise `run` using `classifier` for warm verdicts
    pub fn from_run(run: &BenchmarkRun, classifier: &Classifier) -> Self {
        let cold_server_ms = run.cold().server_ms;
        let mean_warm_server_ms = mean(run.warm().iter().map(|p| p.server_ms));
        let speedup = if mean_warm_server_ms > 0.0 {
            Some(cold_server_ms as f64 / mean_warm_server_ms)
        } else {
            None
        };

        Self {
            cold_server_ms,
            mean_warm_server_ms,
            speedup,
            warm_hits: run.warm().iter().filter(|p| p.is_hit(classifier)).count(),
        }
    }
}

fn mean(values: impl Iterator<Item = u64>) -> f64 {
    let (sum, count) = values.fold((0f64, 0u64), |(sum, count), v| (sum + v as f64, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}
