//! Scripted in-memory backends for tests
//!
//! [`ScriptedTransport`] replays a queue of responses and failures;
//! [`RecordingGateway`] records evictions. Both write into a shared
//! [`Journal`] so tests can assert on the exact call order.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::backend::{EvictionGateway, Item, Key, Lookup, LookupTransport};
use crate::error::TransportError;

/// A call observed by a scripted backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    /// Lookup of a key
    Get(Key),
    /// Eviction of one key
    EvictOne(Key),
    /// Eviction of every key
    EvictAll,
}

/// Shared, ordered record of backend calls
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<Call>>>);

impl Journal {
    fn push(&self, call: Call) {
        self.0.lock().push(call);
    }

    /// Every call so far, in order
    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().clone()
    }

    /// Number of lookups so far
    pub fn lookups(&self) -> usize {
        self.0.lock().iter().filter(|c| matches!(c, Call::Get(_))).count()
    }

    /// Number of evictions (single or full) so far
    pub fn evictions(&self) -> usize {
        self.0.lock().iter().filter(|c| !matches!(c, Call::Get(_))).count()
    }
}

#[derive(Debug, Clone)]
enum Step {
    Respond {
        hint: Option<String>,
        delay: Duration,
    },
    Fail(TransportError),
}

/// Transport that replays a scripted sequence of outcomes
///
/// Once the script is exhausted, the fallback outcome (if any) is used;
/// otherwise lookups fail with a network error.
#[derive(Debug)]
pub struct ScriptedTransport {
    journal: Journal,
    script: Mutex<VecDeque<Step>>,
    fallback: Option<Step>,
}

impl ScriptedTransport {
    /// Empty script recording into `journal`
    pub fn new(journal: &Journal) -> Self {
        Self {
            journal: journal.clone(),
            script: Mutex::new(VecDeque::new()),
            fallback: None,
        }
    }

    /// Every lookup reports `server_ms`
    pub fn constant(journal: &Journal, server_ms: u64) -> Self {
        let mut transport = Self::new(journal);
        transport.fallback = Some(Step::Respond {
            hint: Some(server_ms.to_string()),
            delay: Duration::ZERO,
        });
        transport
    }

    /// Delay applied by the fallback outcome
    pub fn with_delay(mut self, delay: Duration) -> Self {
        if let Some(Step::Respond { delay: d, .. }) = &mut self.fallback {
            *d = delay;
        }
        self
    }

    /// Queue a response reporting `server_ms`
    pub fn then_server_ms(self, server_ms: u64) -> Self {
        self.then_delayed(server_ms, Duration::ZERO)
    }

    /// Queue a response reporting `server_ms` that takes `delay` to arrive
    pub fn then_delayed(self, server_ms: u64, delay: Duration) -> Self {
        self.then(Step::Respond {
            hint: Some(server_ms.to_string()),
            delay,
        })
    }

    /// Queue a response with a raw duration hint
    pub fn then_hint(self, hint: Option<&str>) -> Self {
        self.then(Step::Respond {
            hint: hint.map(str::to_string),
            delay: Duration::ZERO,
        })
    }

    /// Queue a failure
    pub fn then_fail(self, error: TransportError) -> Self {
        self.then(Step::Fail(error))
    }

    fn then(self, step: Step) -> Self {
        self.script.lock().push_back(step);
        self
    }
}

#[async_trait]
impl LookupTransport for ScriptedTransport {
    async fn get(&self, key: &Key) -> Result<Lookup, TransportError> {
        self.journal.push(Call::Get(key.clone()));

        let step = self.script.lock().pop_front().or_else(|| self.fallback.clone());
        match step {
            Some(Step::Respond { hint, delay }) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Ok(Lookup {
                    item: Item {
                        id: key.to_string(),
                        name: format!("Item {}", key),
                        description: String::new(),
                    },
                    server_duration_hint: hint,
                })
            }
            Some(Step::Fail(error)) => Err(error),
            None => Err(TransportError::Network("script exhausted".to_string())),
        }
    }
}

/// Gateway that records evictions and optionally fails them
#[derive(Debug)]
pub struct RecordingGateway {
    journal: Journal,
    failure: Option<TransportError>,
}

impl RecordingGateway {
    /// Gateway whose evictions succeed
    pub fn new(journal: &Journal) -> Self {
        Self {
            journal: journal.clone(),
            failure: None,
        }
    }

    /// Gateway whose evictions fail with `error`
    pub fn failing(journal: &Journal, error: TransportError) -> Self {
        Self {
            journal: journal.clone(),
            failure: Some(error),
        }
    }

    fn outcome(&self) -> Result<(), TransportError> {
        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl EvictionGateway for RecordingGateway {
    async fn evict_one(&self, key: &Key) -> Result<(), TransportError> {
        self.journal.push(Call::EvictOne(key.clone()));
        self.outcome()
    }

    async fn evict_all(&self) -> Result<(), TransportError> {
        self.journal.push(Call::EvictAll);
        self.outcome()
    }
}
