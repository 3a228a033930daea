//! JSON persistence of the history log between sessions

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cachescope::{HistoryEntry, HistoryStore};
use tracing::{debug, info};

/// History log stored as a JSON array, most-recent-first
pub struct HistoryFile {
    path: PathBuf,
}

impl HistoryFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Load the log; a missing file yields an empty log
    pub fn load(&self, capacity: usize) -> Result<HistoryStore> {
        if !self.path.exists() {
            info!(
                "No history file found at {}, starting with empty history",
                self.path.display()
            );
            return Ok(HistoryStore::new(capacity)?);
        }

        let content = fs::read_to_string(&self.path).context("Failed to read history file")?;
        let entries: Vec<HistoryEntry> =
            serde_json::from_str(&content).context("Failed to parse history file")?;

        info!("Loaded {} history entries from {}", entries.len(), self.path.display());
        Ok(HistoryStore::with_entries(capacity, entries)?)
    }

    /// Replace the file with the current log
    ///
    /// The log is written to a sibling temp file first and renamed over the
    /// old one, so a crash mid-write leaves the previous file intact.
    pub fn save(&self, store: &HistoryStore) -> Result<()> {
        let content = serde_json::to_string_pretty(&store.snapshot())
            .context("Failed to serialize history")?;

        let staging = self.staging_path();
        fs::write(&staging, content).context("Failed to write history file")?;
        fs::rename(&staging, &self.path).context(format!(
            "Failed to move history into place: {:?}",
            self.path
        ))?;

        debug!("Saved {} history entries", store.len());
        Ok(())
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "history.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
