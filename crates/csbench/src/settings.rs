//! Configuration file loading

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use cachescope::HarnessConfig;
use cachescope_http::HttpConfig;
use serde::Deserialize;
use tracing::info;

/// Everything the CLI can be configured with
///
/// ```toml
/// [harness]
/// threshold_ms = 50
/// history_capacity = 20
///
/// [http]
/// base_url = "http://127.0.0.1:8080"
/// api_prefix = "/api/items"
/// timeout_ms = 10000
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub harness: HarnessConfig,
    pub http: HttpConfig,
}

impl Settings {
    /// Load settings from a TOML file, or defaults when no file is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let settings: Settings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        info!("Loaded configuration from {}", path.display());
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_without_file() {
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.harness.threshold_ms, 50);
    }

    #[test]
    fn test_partial_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[harness]\nthreshold_ms = 80\n\n[http]\nbase_url = \"http://cache:9000\"").unwrap();

        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.harness.threshold_ms, 80);
        assert_eq!(settings.harness.history_capacity, 20);
        assert_eq!(settings.http.base_url, "http://cache:9000");
        assert_eq!(settings.http.api_prefix, "/api/items");
    }

    #[test]
    fn test_bad_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[harness]\nthreshold_ms = \"fast\"").unwrap();
        assert!(Settings::load(Some(file.path())).is_err());

        assert!(Settings::load(Some(Path::new("/nonexistent/csbench.toml"))).is_err());
    }
}
