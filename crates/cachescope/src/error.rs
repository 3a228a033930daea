//! Error types for cachescope

use std::fmt;

use crate::backend::Key;
use crate::sequencer::PointLabel;

/// Result type alias for cachescope operations
pub type Result<T> = std::result::Result<T, Error>;

/// Failure of a single call against the remote service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connection, TLS or timeout failure before a response arrived
    Network(String),

    /// Response carried a non-success status code
    Status(u16),

    /// Response body could not be decoded
    Decode(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Network(msg) => write!(f, "network error: {}", msg),
            TransportError::Status(code) => write!(f, "unexpected status {}", code),
            TransportError::Decode(msg) => write!(f, "decode error: {}", msg),
        }
    }
}

impl std::error::Error for TransportError {}

/// Error types for harness operations
#[derive(Debug)]
pub enum Error {
    /// A lookup probe failed
    RequestFailed {
        /// Key that was probed
        key: Key,
        /// Underlying transport failure
        source: TransportError,
    },

    /// The eviction gateway rejected or failed an eviction
    EvictionFailed {
        /// Evicted key, `None` for a full-cache eviction
        key: Option<Key>,
        /// Underlying transport failure
        source: TransportError,
    },

    /// A probe inside a benchmark run failed; the partial run was discarded
    BenchmarkFailed {
        /// Key under benchmark
        key: Key,
        /// Call index: 0 is the cold call, `i` is warm call `#i`
        index: usize,
        /// Underlying transport failure
        source: TransportError,
    },

    /// Rejected before any side effect
    InvalidInput(String),

    /// A benchmark run is already in flight
    Busy,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::RequestFailed { key, source } => {
                write!(f, "request for key '{}' failed: {}", key, source)
            }
            Error::EvictionFailed { key: Some(key), source } => {
                write!(f, "eviction of key '{}' failed: {}", key, source)
            }
            Error::EvictionFailed { key: None, source } => {
                write!(f, "eviction of all keys failed: {}", source)
            }
            Error::BenchmarkFailed { key, index, source } => write!(
                f,
                "benchmark of key '{}' failed at {} call: {}",
                key,
                PointLabel::from_index(*index),
                source
            ),
            Error::InvalidInput(msg) => write!(f, "invalid input: {}", msg),
            Error::Busy => write!(f, "a benchmark run is already in progress"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::RequestFailed { source, .. }
            | Error::EvictionFailed { source, .. }
            | Error::BenchmarkFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_benchmark_failure_names_the_call() {
        let err = Error::BenchmarkFailed {
            key: Key::from("7"),
            index: 3,
            source: TransportError::Status(503),
        };
        assert_eq!(
            err.to_string(),
            "benchmark of key '7' failed at warm #3 call: unexpected status 503"
        );

        let cold = Error::BenchmarkFailed {
            key: Key::from("7"),
            index: 0,
            source: TransportError::Network("reset".to_string()),
        };
        assert!(cold.to_string().contains("at cold call"));
    }

    #[test]
    fn test_source_chain() {
        use std::error::Error as _;

        let err = Error::RequestFailed {
            key: Key::from("1"),
            source: TransportError::Decode("eof".to_string()),
        };
        assert!(err.source().is_some());
        assert!(Error::Busy.source().is_none());
    }

    #[test]
    fn test_evict_all_display() {
        let err = Error::EvictionFailed {
            key: None,
            source: TransportError::Status(500),
        };
        assert_eq!(err.to_string(), "eviction of all keys failed: unexpected status 500");
    }
}
