//! Timing probe: one timed lookup per invocation

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::backend::{Item, Key, LookupTransport};
use crate::error::{Error, Result};

/// Timing of a single lookup as seen by the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Measurement {
    /// Decoded payload
    pub item: Item,

    /// Round-trip wall-clock time in milliseconds
    pub client_ms: u64,

    /// Server-reported duration in milliseconds, 0 when not reported
    pub server_ms: u64,
}

/// Wraps a transport and times each lookup
pub struct Probe<T> {
    transport: T,
}

impl<T: LookupTransport> Probe<T> {
    /// Create a probe over the given transport
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Issue one lookup and time it
    ///
    /// # Arguments
    /// * `key` - Key to look up, passed through unvalidated
    ///
    /// # Returns
    /// * `Result<Measurement>` - Timing, or `Error::RequestFailed` on any transport failure
    pub async fn probe(&self, key: &Key) -> Result<Measurement> {
        let start = Instant::now();
        let lookup = self.transport.get(key).await;
        let elapsed = start.elapsed();

        let lookup = lookup.map_err(|source| {
            warn!(key = %key, error = %source, "lookup failed");
            Error::RequestFailed {
                key: key.clone(),
                source,
            }
        })?;

        let client_ms = round_millis(elapsed);
        let server_ms = parse_server_ms(lookup.server_duration_hint.as_deref());
        debug!(key = %key, client_ms, server_ms, "lookup timed");

        Ok(Measurement {
            item: lookup.item,
            client_ms,
            server_ms,
        })
    }
}

fn round_millis(elapsed: Duration) -> u64 {
    (elapsed.as_secs_f64() * 1000.0).round() as u64
}

/// Parse a server duration hint into milliseconds
///
/// Reads the leading decimal digits after surrounding whitespace, so `"12"`
/// and `"12ms"` both yield 12. Absent, empty, negative or non-numeric hints
/// yield 0. Values beyond `u64::MAX` saturate.
pub fn parse_server_ms(hint: Option<&str>) -> u64 {
    let Some(hint) = hint else {
        return 0;
    };

    let hint = hint.trim();
    let digits = hint.strip_prefix('+').unwrap_or(hint);

    digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0u64, |acc, b| {
            acc.saturating_mul(10).saturating_add(u64::from(b - b'0'))
        })
}
