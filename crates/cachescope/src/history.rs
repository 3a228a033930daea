//! Rolling history of ad-hoc measurements
//!
//! Most-recent-first, bounded. Appends take a single write lock, so the
//! capacity bound holds no matter how many call sites append concurrently.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::backend::{Key, LookupTransport};
use crate::classifier::{ClassifiedResult, Classifier};
use crate::error::{Error, Result};
use crate::probe::Probe;

/// Default number of retained entries
pub const DEFAULT_HISTORY_CAPACITY: usize = 20;

/// One recorded measurement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Key that was looked up
    pub id: Key,
    /// Server-reported duration in milliseconds
    pub server_ms: u64,
    /// Client round-trip time in milliseconds
    pub client_ms: u64,
    /// Verdict at recording time
    pub hit: bool,
    /// When the lookup completed
    pub at: DateTime<Utc>,
}

impl HistoryEntry {
    /// Build an entry for a classified lookup completed now
    pub fn from_result(id: Key, result: &ClassifiedResult) -> Self {
        Self {
            id,
            server_ms: result.measurement.server_ms,
            client_ms: result.measurement.client_ms,
            hit: result.hit,
            at: Utc::now(),
        }
    }
}

/// Bounded, ordered log of [`HistoryEntry`] values
#[derive(Debug)]
pub struct HistoryStore {
    entries: RwLock<VecDeque<HistoryEntry>>,
    capacity: usize,
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self {
            entries: RwLock::new(VecDeque::with_capacity(DEFAULT_HISTORY_CAPACITY + 1)),
            capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

impl HistoryStore {
    /// Create an empty store
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of entries, must be non-zero
    pub fn new(capacity: usize) -> Result<Self> {
        Self::with_entries(capacity, Vec::new())
    }

    /// Create a store seeded with entries given most-recent-first
    ///
    /// Entries beyond `capacity` are the oldest and are dropped.
    pub fn with_entries(
        capacity: usize,
        entries: impl IntoIterator<Item = HistoryEntry>,
    ) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::InvalidInput(
                "history capacity must be greater than 0".to_string(),
            ));
        }

        let mut log = VecDeque::with_capacity(capacity + 1);
        log.extend(entries.into_iter().take(capacity));

        Ok(Self {
            entries: RwLock::new(log),
            capacity,
        })
    }

    /// Prepend an entry, dropping the oldest if the log overflows
    ///
    /// # Returns
    /// * `Option<HistoryEntry>` - The evicted entry, if any
    pub fn append(&self, entry: HistoryEntry) -> Option<HistoryEntry> {
        let mut entries = self.entries.write();
        entries.push_front(entry);
        if entries.len() > self.capacity {
            entries.pop_back()
        } else {
            None
        }
    }

    /// Remove every entry
    pub fn clear(&self) {
        self.entries.write().clear();
        debug!("history cleared");
    }

    /// Copy of the log, most-recent-first
    pub fn snapshot(&self) -> Vec<HistoryEntry> {
        self.entries.read().iter().cloned().collect()
    }

    /// Entry at `index`, 0 being the most recent
    pub fn get(&self, index: usize) -> Option<HistoryEntry> {
        self.entries.read().get(index).cloned()
    }

    /// Most recent entry
    pub fn latest(&self) -> Option<HistoryEntry> {
        self.get(0)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if the log is empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Maximum number of entries
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether further appends will evict
    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    /// Replay a lookup for `id` and record it at the front
    ///
    /// On failure the log is left untouched and the error is returned.
    pub async fn rerun<T: LookupTransport>(
        &self,
        id: &Key,
        probe: &Probe<T>,
        classifier: &Classifier,
    ) -> Result<HistoryEntry> {
        let measurement = probe.probe(id).await?;
        let result = classifier.apply(measurement);
        let entry = HistoryEntry::from_result(id.clone(), &result);
        self.append(entry.clone());
        Ok(entry)
    }
}
