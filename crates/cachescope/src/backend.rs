//! Collaborator contracts: the lookup transport and the eviction gateway

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::TransportError;

/// Opaque lookup key, stored trimmed
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Key(String);

impl Key {
    /// Create a key, trimming surrounding whitespace
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.len() == raw.len() {
            Key(raw)
        } else {
            Key(trimmed.to_string())
        }
    }

    /// Borrow the key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the key is blank
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl AsRef<str> for Key {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Key {
    fn from(raw: &str) -> Self {
        Key::new(raw)
    }
}

impl From<String> for Key {
    fn from(raw: String) -> Self {
        Key::new(raw)
    }
}

impl From<u64> for Key {
    fn from(id: u64) -> Self {
        Key(id.to_string())
    }
}

/// Payload returned by the lookup service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Item identifier; numeric ids are kept in their decimal form
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,

    /// Display name
    #[serde(default)]
    pub name: String,

    /// Free-form description
    #[serde(default)]
    pub description: String,
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Unsigned(u64),
        Signed(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Unsigned(n) => n.to_string(),
        RawId::Signed(n) => n.to_string(),
    })
}

/// Decoded response of one lookup call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup {
    /// Decoded payload
    pub item: Item,

    /// Raw server-reported duration, if the response carried one
    pub server_duration_hint: Option<String>,
}

/// Performs keyed lookups against the remote service
///
/// Implementations own their timeouts; the harness imposes none.
#[async_trait]
pub trait LookupTransport: Send + Sync {
    /// Fetch the item stored under `key`
    async fn get(&self, key: &Key) -> std::result::Result<Lookup, TransportError>;
}

/// Invalidates entries in the remote cache
#[async_trait]
pub trait EvictionGateway: Send + Sync {
    /// Evict a single key
    async fn evict_one(&self, key: &Key) -> std::result::Result<(), TransportError>;

    /// Evict every key
    async fn evict_all(&self) -> std::result::Result<(), TransportError>;
}

#[async_trait]
impl<T: LookupTransport + ?Sized> LookupTransport for Arc<T> {
    async fn get(&self, key: &Key) -> std::result::Result<Lookup, TransportError> {
        (**self).get(key).await
    }
}

#[async_trait]
impl<E: EvictionGateway + ?Sized> EvictionGateway for Arc<E> {
    async fn evict_one(&self, key: &Key) -> std::result::Result<(), TransportError> {
        (**self).evict_one(key).await
    }

    async fn evict_all(&self) -> std::result::Result<(), TransportError> {
        (**self).evict_all().await
    }
}
