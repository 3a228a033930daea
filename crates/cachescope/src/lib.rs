//! # cachescope
//!
//! Client-side measurement engine for a remote cached lookup service.
//!
//! ## Architecture
//! - **Probe**: times one lookup, capturing client and server elapsed time
//! - **Classifier**: maps a server duration to cache hit/miss
//! - **History**: bounded, most-recent-first log of ad-hoc measurements
//! - **Sequencer**: single-flight eviction + 1 cold + N warm benchmark runs
//! - **Harness**: wires the above together for a front end
//!
//! The transport and eviction endpoints are collaborators supplied through
//! [`LookupTransport`] and [`EvictionGateway`].

#![warn(missing_docs)]

mod backend;
mod classifier;
mod config;
mod error;
mod harness;
mod history;
mod probe;
mod sequencer;
mod stats;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use backend::{EvictionGateway, Item, Key, Lookup, LookupTransport};
pub use classifier::{classify, ClassifiedResult, Classifier, Verdict, DEFAULT_THRESHOLD_MS};
pub use config::HarnessConfig;
pub use error::{Error, Result, TransportError};
pub use harness::{Fetched, Harness};
pub use history::{HistoryEntry, HistoryStore, DEFAULT_HISTORY_CAPACITY};
pub use probe::{parse_server_ms, Measurement, Probe};
pub use sequencer::{BenchmarkPoint, BenchmarkRun, PointLabel, RunState, Sequencer};
pub use stats::{HistoryStats, RunSummary, SessionStats};
