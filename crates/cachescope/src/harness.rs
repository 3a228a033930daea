//! Harness: probe, classifier, history and sequencer behind one handle

use tracing::{info, warn};

use crate::backend::{EvictionGateway, Key, LookupTransport};
use crate::classifier::{ClassifiedResult, Classifier};
use crate::config::HarnessConfig;
use crate::error::{Error, Result};
use crate::history::{HistoryEntry, HistoryStore};
use crate::sequencer::{BenchmarkRun, Sequencer};
use crate::stats::{HistoryStats, SessionStats};

/// Outcome of an ad-hoc fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    /// Classified measurement, including the payload
    pub result: ClassifiedResult,
    /// Entry recorded in the history log
    pub entry: HistoryEntry,
}

/// Front-end facing handle over one backend
///
/// Ad-hoc fetches and reruns feed the history log; benchmark runs do not.
pub struct Harness<T, E> {
    sequencer: Sequencer<T, E>,
    classifier: Classifier,
    history: HistoryStore,
    stats: SessionStats,
}

impl<T, E> Harness<T, E>
where
    T: LookupTransport,
    E: EvictionGateway,
{
    /// Create a harness with an empty history log
    pub fn new(transport: T, gateway: E, config: &HarnessConfig) -> Result<Self> {
        config.validate()?;
        let history = HistoryStore::new(config.history_capacity)?;
        Ok(Self::with_history(transport, gateway, config, history))
    }

    /// Create a harness around an existing history log
    pub fn with_history(
        transport: T,
        gateway: E,
        config: &HarnessConfig,
        history: HistoryStore,
    ) -> Self {
        Self {
            sequencer: Sequencer::new(transport, gateway),
            classifier: config.classifier(),
            history,
            stats: SessionStats::new(),
        }
    }

    /// Active classifier
    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// History log of ad-hoc fetches
    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// Benchmark sequencer
    pub fn sequencer(&self) -> &Sequencer<T, E> {
        &self.sequencer
    }

    /// Session counters
    pub fn session(&self) -> &SessionStats {
        &self.stats
    }

    /// Hit/miss breakdown of the current history log
    pub fn history_stats(&self) -> HistoryStats {
        HistoryStats::from_entries(&self.history.snapshot(), &self.classifier)
    }

    /// Probe and classify `key` without recording it
    pub async fn probe(&self, key: &Key) -> Result<ClassifiedResult> {
        let measurement = self
            .sequencer
            .probe()
            .probe(key)
            .await
            .map_err(|err| self.failed(err))?;
        self.stats.record_lookup();
        Ok(self.classifier.apply(measurement))
    }

    /// Probe `key`, classify it and record it in the history log
    pub async fn fetch(&self, key: &Key) -> Result<Fetched> {
        if key.is_empty() {
            return Err(Error::InvalidInput("key must not be empty".to_string()));
        }

        let result = self.probe(key).await?;
        let entry = HistoryEntry::from_result(key.clone(), &result);
        self.history.append(entry.clone());
        Ok(Fetched { result, entry })
    }

    /// Replay a lookup for a key seen in the history log
    pub async fn rerun(&self, id: &Key) -> Result<HistoryEntry> {
        if id.is_empty() {
            return Err(Error::InvalidInput("key must not be empty".to_string()));
        }

        let entry = self
            .history
            .rerun(id, self.sequencer.probe(), &self.classifier)
            .await
            .map_err(|err| self.failed(err))?;
        self.stats.record_lookup();
        Ok(entry)
    }

    /// Run a cold + `warm_count` warm benchmark against `key`
    pub async fn run(&self, key: &Key, warm_count: usize) -> Result<BenchmarkRun> {
        let run = self
            .sequencer
            .run(key, warm_count)
            .await
            .map_err(|err| self.failed(err))?;
        self.stats.record_run();
        Ok(run)
    }

    /// Evict one key from the remote cache
    pub async fn evict(&self, key: &Key) -> Result<()> {
        if key.is_empty() {
            return Err(Error::InvalidInput("key must not be empty".to_string()));
        }

        self.sequencer.gateway().evict_one(key).await.map_err(|source| {
            self.failed(Error::EvictionFailed {
                key: Some(key.clone()),
                source,
            })
        })?;
        self.stats.record_eviction();
        info!(key = %key, "key evicted");
        Ok(())
    }

    /// Evict every key from the remote cache
    pub async fn evict_all(&self) -> Result<()> {
        self.sequencer.gateway().evict_all().await.map_err(|source| {
            self.failed(Error::EvictionFailed { key: None, source })
        })?;
        self.stats.record_eviction();
        info!("cache evicted");
        Ok(())
    }

    fn failed(&self, err: Error) -> Error {
        match &err {
            Error::InvalidInput(_) | Error::Busy => {}
            _ => {
                self.stats.record_failure();
                warn!(error = %err, "operation failed");
            }
        }
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::testing::{Call, Journal, RecordingGateway, ScriptedTransport};

    fn harness(
        journal: &Journal,
        transport: ScriptedTransport,
    ) -> Harness<ScriptedTransport, RecordingGateway> {
        Harness::new(transport, RecordingGateway::new(journal), &HarnessConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_records_history() {
        let journal = Journal::default();
        let h = harness(
            &journal,
            ScriptedTransport::new(&journal).then_server_ms(140).then_server_ms(4),
        );

        let first = h.fetch(&Key::from("1")).await.unwrap();
        let second = h.fetch(&Key::from("1")).await.unwrap();

        assert!(!first.result.hit);
        assert!(second.result.hit);
        assert_eq!(second.result.measurement.item.id, "1");

        let log = h.history().snapshot();
        assert_eq!(log, vec![second.entry, first.entry]);
        assert_eq!(h.session().lookups(), 2);
    }

    #[tokio::test]
    async fn test_fetch_empty_key_rejected() {
        let journal = Journal::default();
        let h = harness(&journal, ScriptedTransport::constant(&journal, 5));

        assert!(matches!(
            h.fetch(&Key::from("")).await,
            Err(Error::InvalidInput(_))
        ));
        assert!(journal.calls().is_empty());
        assert!(h.history().is_empty());
    }

    #[tokio::test]
    async fn test_rerun_blank_key_rejected() {
        let journal = Journal::default();
        let h = harness(&journal, ScriptedTransport::constant(&journal, 5));

        assert!(matches!(
            h.rerun(&Key::from("   ")).await,
            Err(Error::InvalidInput(_))
        ));
        assert_eq!(journal.lookups(), 0);
        assert!(h.history().is_empty());
        assert_eq!(h.session().failures(), 0);
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_history() {
        let journal = Journal::default();
        let h = harness(
            &journal,
            ScriptedTransport::new(&journal)
                .then_server_ms(5)
                .then_fail(TransportError::Status(500)),
        );

        h.fetch(&Key::from("1")).await.unwrap();
        let err = h.fetch(&Key::from("1")).await.unwrap_err();

        assert!(matches!(err, Error::RequestFailed { .. }));
        assert_eq!(h.history().len(), 1);
        assert_eq!(h.session().failures(), 1);
    }

    #[tokio::test]
    async fn test_benchmark_does_not_touch_history() {
        let journal = Journal::default();
        let h = harness(&journal, ScriptedTransport::constant(&journal, 5));

        let run = h.run(&Key::from("3"), 4).await.unwrap();

        assert_eq!(run.points().len(), 5);
        assert!(h.history().is_empty());
        assert_eq!(h.session().runs(), 1);
    }

    #[tokio::test]
    async fn test_rerun_goes_to_front() {
        let journal = Journal::default();
        let h = harness(
            &journal,
            ScriptedTransport::new(&journal)
                .then_server_ms(90)
                .then_server_ms(60)
                .then_server_ms(2),
        );

        h.fetch(&Key::from("1")).await.unwrap();
        h.fetch(&Key::from("2")).await.unwrap();
        let replayed = h.rerun(&Key::from("1")).await.unwrap();

        let ids: Vec<String> = h
            .history()
            .snapshot()
            .into_iter()
            .map(|e| e.id.to_string())
            .collect();
        assert_eq!(ids, vec!["1", "2", "1"]);
        assert!(replayed.hit);
    }

    #[tokio::test]
    async fn test_evictions() {
        let journal = Journal::default();
        let h = harness(&journal, ScriptedTransport::constant(&journal, 5));

        h.evict(&Key::from("8")).await.unwrap();
        h.evict_all().await.unwrap();

        assert_eq!(
            journal.calls(),
            vec![Call::EvictOne(Key::from("8")), Call::EvictAll]
        );
        assert_eq!(h.session().evictions(), 2);
    }

    #[tokio::test]
    async fn test_evict_all_failure() {
        let journal = Journal::default();
        let h = Harness::new(
            ScriptedTransport::constant(&journal, 5),
            RecordingGateway::failing(&journal, TransportError::Status(403)),
            &HarnessConfig::default(),
        )
        .unwrap();

        assert!(matches!(
            h.evict_all().await,
            Err(Error::EvictionFailed { key: None, .. })
        ));
    }

    #[tokio::test]
    async fn test_threshold_from_config() {
        let journal = Journal::default();
        let config = HarnessConfig {
            threshold_ms: 200,
            history_capacity: 2,
        };
        let h = Harness::new(
            ScriptedTransport::constant(&journal, 150),
            RecordingGateway::new(&journal),
            &config,
        )
        .unwrap();

        for _ in 0..3 {
            assert!(h.fetch(&Key::from("1")).await.unwrap().result.hit);
        }
        assert_eq!(h.history().len(), 2);
        assert_eq!(h.history_stats().hits, 2);
    }
}
