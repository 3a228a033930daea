//! Benchmark sequencer: evict, then one cold and N warm lookups
//!
//! Calls are strictly sequential. Call `i + 1` is issued only after call
//! `i` has been recorded, so warm timings reflect warming done by earlier
//! calls of the same run. At most one run is in flight per sequencer.

use std::fmt;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::backend::{EvictionGateway, Key, LookupTransport};
use crate::classifier::Classifier;
use crate::error::{Error, Result};
use crate::probe::Probe;

/// Sequencer run state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Ready to accept a run
    Idle,
    /// A run is in flight
    Running,
}

/// Position of a point within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub enum PointLabel {
    /// First call after eviction
    Cold,
    /// Warm call `#n`, starting at 1
    Warm(usize),
}

impl PointLabel {
    /// Label for call index `index` (0 is the cold call)
    pub fn from_index(index: usize) -> Self {
        if index == 0 {
            PointLabel::Cold
        } else {
            PointLabel::Warm(index)
        }
    }

    /// Call index of this label
    pub fn index(&self) -> usize {
        match self {
            PointLabel::Cold => 0,
            PointLabel::Warm(n) => *n,
        }
    }
}

impl fmt::Display for PointLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointLabel::Cold => f.write_str("cold"),
            PointLabel::Warm(n) => write!(f, "warm #{}", n),
        }
    }
}

impl From<PointLabel> for String {
    fn from(label: PointLabel) -> Self {
        label.to_string()
    }
}

/// One call of a benchmark run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BenchmarkPoint {
    /// Call label
    pub label: PointLabel,
    /// Server-reported duration in milliseconds
    pub server_ms: u64,
    /// Client round-trip time in milliseconds
    pub client_ms: u64,
}

impl BenchmarkPoint {
    /// Time spent outside the server (client minus server), may be negative
    pub fn overhead_ms(&self) -> i64 {
        self.client_ms as i64 - self.server_ms as i64
    }

    /// Whether this call classifies as a cache hit
    pub fn is_hit(&self, classifier: &Classifier) -> bool {
        classifier.classify(self.server_ms)
    }
}

/// A completed run: the cold point followed by warm points in call order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BenchmarkRun {
    key: Key,
    started_at: DateTime<Utc>,
    points: Vec<BenchmarkPoint>,
}

impl BenchmarkRun {
    /// Benchmarked key
    pub fn key(&self) -> &Key {
        &self.key
    }

    /// When the cold call was issued
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// All points, cold first
    pub fn points(&self) -> &[BenchmarkPoint] {
        &self.points
    }

    /// The cold point
    pub fn cold(&self) -> &BenchmarkPoint {
        &self.points[0]
    }

    /// Warm points in call order
    pub fn warm(&self) -> &[BenchmarkPoint] {
        &self.points[1..]
    }

    /// Number of warm calls
    pub fn warm_count(&self) -> usize {
        self.points.len() - 1
    }

    /// Verdict per point, recomputed with `classifier`
    pub fn classify(&self, classifier: &Classifier) -> Vec<bool> {
        self.points.iter().map(|p| p.is_hit(classifier)).collect()
    }
}

/// Releases the run flag on every exit path, including a dropped future
struct RunGuard<'a> {
    state: &'a Mutex<RunState>,
}

impl<'a> RunGuard<'a> {
    fn acquire(state: &'a Mutex<RunState>) -> Result<Self> {
        let mut current = state.lock();
        if *current == RunState::Running {
            return Err(Error::Busy);
        }
        *current = RunState::Running;
        Ok(Self { state })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        *self.state.lock() = RunState::Idle;
    }
}

/// Orchestrates cold/warm benchmark runs against one key at a time
pub struct Sequencer<T, E> {
    probe: Probe<T>,
    gateway: E,
    state: Mutex<RunState>,
}

impl<T, E> Sequencer<T, E>
where
    T: LookupTransport,
    E: EvictionGateway,
{
    /// Create a sequencer over a transport and an eviction gateway
    pub fn new(transport: T, gateway: E) -> Self {
        Self {
            probe: Probe::new(transport),
            gateway,
            state: Mutex::new(RunState::Idle),
        }
    }

    /// Probe used for every call of a run
    pub fn probe(&self) -> &Probe<T> {
        &self.probe
    }

    /// Eviction gateway used at the start of a run
    pub fn gateway(&self) -> &E {
        &self.gateway
    }

    /// Current run state
    pub fn state(&self) -> RunState {
        *self.state.lock()
    }

    /// Whether a run is in flight
    pub fn is_running(&self) -> bool {
        self.state() == RunState::Running
    }

    /// Execute one benchmark run
    ///
    /// # Arguments
    /// * `key` - Key to benchmark, must be non-empty
    /// * `warm_count` - Number of warm calls after the cold one, at least 1
    ///
    /// # Returns
    /// * `Result<BenchmarkRun>` - `1 + warm_count` points; on any failure no
    ///   partial run is returned
    pub async fn run(&self, key: &Key, warm_count: usize) -> Result<BenchmarkRun> {
        if key.is_empty() {
            return Err(Error::InvalidInput("key must not be empty".to_string()));
        }
        if warm_count < 1 {
            return Err(Error::InvalidInput(
                "warm count must be at least 1".to_string(),
            ));
        }

        let _guard = RunGuard::acquire(&self.state).map_err(|err| {
            warn!(key = %key, "benchmark rejected, another run is in progress");
            err
        })?;
        info!(key = %key, warm_count, "benchmark started");

        self.gateway.evict_one(key).await.map_err(|source| {
            warn!(key = %key, error = %source, "eviction failed, benchmark aborted");
            Error::EvictionFailed {
                key: Some(key.clone()),
                source,
            }
        })?;

        let started_at = Utc::now();
        let mut points = Vec::with_capacity(warm_count + 1);

        for index in 0..=warm_count {
            let label = PointLabel::from_index(index);
            let measurement = self
                .probe
                .probe(key)
                .await
                .map_err(|err| into_benchmark_failure(err, index))?;

            debug!(
                key = %key,
                call = %label,
                server_ms = measurement.server_ms,
                client_ms = measurement.client_ms,
                "benchmark call recorded"
            );
            points.push(BenchmarkPoint {
                label,
                server_ms: measurement.server_ms,
                client_ms: measurement.client_ms,
            });
        }

        info!(
            key = %key,
            cold_ms = points[0].server_ms,
            "benchmark finished"
        );

        Ok(BenchmarkRun {
            key: key.clone(),
            started_at,
            points,
        })
    }
}

fn into_benchmark_failure(err: Error, index: usize) -> Error {
    match err {
        Error::RequestFailed { key, source } => {
            warn!(key = %key, index, "benchmark call failed, run discarded");
            Error::BenchmarkFailed { key, index, source }
        }
        other => other,
    }
}
