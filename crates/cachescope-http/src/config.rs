//! HTTP backend configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Where the lookup service lives and how long to wait for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Scheme, host and port of the service
    pub base_url: String,

    /// Path under which items and the cache endpoints live
    pub api_prefix: String,

    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            api_prefix: "/api/items".to_string(),
            timeout_ms: 10_000,
        }
    }
}

impl HttpConfig {
    /// Request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Non-empty path segments of the prefix
    pub(crate) fn prefix_segments(&self) -> Vec<String> {
        self.api_prefix
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}
