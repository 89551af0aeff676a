//! Dashboard server configuration.
//!
//! Loaded from a JSON file:
//!
//! ```json
//! {
//!   "endpoint": "https://s3.example.com",
//!   "buckets": [
//!     { "name": "app-logs", "access_key": "...", "secret_key": "..." }
//!   ],
//!   "bind_addr": "0.0.0.0:8080"
//! }
//! ```

use std::net::SocketAddr;
use std::path::Path;

use logvault_core::search::DEFAULT_SEARCH_CONCURRENCY;
use logvault_core::{BucketCredentials, ConfigError, S3ConnectionConfig};
use serde::{Deserialize, Serialize};

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

const fn default_search_concurrency() -> usize {
    DEFAULT_SEARCH_CONCURRENCY
}

/// Configuration for the dashboard server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DashboardConfig {
    /// Object store endpoint and transport settings.
    #[serde(flatten)]
    pub connection: S3ConnectionConfig,
    /// Buckets the dashboard may read, with their credentials.
    #[serde(default)]
    pub buckets: Vec<BucketCredentials>,
    /// Address to bind the HTTP server to.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    /// CORS allowed origins (empty means all).
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Files scanned concurrently by one search.
    #[serde(default = "default_search_concurrency")]
    pub search_concurrency: usize,
}

impl DashboardConfig {
    /// Create a new configuration for the given endpoint.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            connection: S3ConnectionConfig::new(endpoint),
            buckets: Vec::new(),
            bind_addr: default_bind_addr(),
            cors_origins: Vec::new(),
            search_concurrency: DEFAULT_SEARCH_CONCURRENCY,
        }
    }

    /// Add a bucket.
    #[must_use]
    pub fn with_bucket(mut self, bucket: BucketCredentials) -> Self {
        self.buckets.push(bucket);
        self
    }

    /// Set the bind address.
    #[must_use]
    pub const fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Add a CORS allowed origin.
    #[must_use]
    pub fn with_cors_origin(mut self, origin: impl Into<String>) -> Self {
        self.cors_origins.push(origin.into());
        self
    }

    /// Set the search concurrency.
    #[must_use]
    pub const fn with_search_concurrency(mut self, concurrency: usize) -> Self {
        self.search_concurrency = concurrency;
        self
    }

    /// Loads and validates a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Writes the configuration as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.display().to_string(),
                source,
            })?;
        }
        std::fs::write(path, json).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    /// A sample configuration for `init-config`.
    #[must_use]
    pub fn sample() -> Self {
        Self::new("https://s3.example.com")
            .with_bucket(BucketCredentials::new("app-logs", "CHANGE_ME", "CHANGE_ME"))
    }

    /// Validates everything except the buckets, which are checked when the
    /// registry is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.connection.validate()?;
        if self.buckets.is_empty() {
            return Err(ConfigError::Missing("buckets"));
        }
        if self.search_concurrency == 0 {
            return Err(ConfigError::invalid(
                "search_concurrency",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::{IpAddr, Ipv4Addr};
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let file = create_temp_config(
            r#"{
                "endpoint": "http://minio:9000",
                "buckets": [{"name": "logs", "access_key": "a", "secret_key": "s"}]
            }"#,
        );
        let config = DashboardConfig::load(file.path()).unwrap();

        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.connection.region, "us-east-1");
        assert!(config.connection.path_style_access);
        assert!(!config.connection.insecure_skip_tls_verify);
        assert!(config.cors_origins.is_empty());
        assert_eq!(config.search_concurrency, 4);
        assert_eq!(config.buckets[0].name, "logs");
    }

    #[test]
    fn test_config_builder() {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 9000);
        let config = DashboardConfig::new("https://s3.example.com")
            .with_bind_addr(addr)
            .with_cors_origin("http://localhost:3000")
            .with_search_concurrency(8);

        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.cors_origins, vec!["http://localhost:3000".to_string()]);
        assert_eq!(config.search_concurrency, 8);
    }

    #[test]
    fn test_missing_buckets_rejected() {
        let err = DashboardConfig::new("https://s3.example.com").validate().unwrap_err();
        assert!(matches!(err, ConfigError::Missing("buckets")));
    }

    #[test]
    fn test_zero_search_concurrency_rejected() {
        let err = DashboardConfig::sample()
            .with_search_concurrency(0)
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "search_concurrency", .. }));
    }

    #[test]
    fn test_endpoint_scheme_required() {
        let mut config = DashboardConfig::sample();
        config.connection.endpoint = "s3.example.com".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "endpoint", .. })
        ));
    }

    #[test]
    fn test_sample_survives_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("dashboard.json");

        DashboardConfig::sample().save(&path).unwrap();
        let loaded = DashboardConfig::load(&path).unwrap();

        assert_eq!(loaded, DashboardConfig::sample());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = DashboardConfig::sample();
        let debug = format!("{config:?}");
        assert_eq!(debug.matches("CHANGE_ME").count(), 1);
        assert!(debug.contains("<redacted>"));
    }
}
