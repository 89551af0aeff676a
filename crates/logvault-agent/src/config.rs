//! Agent configuration.
//!
//! Loaded from a JSON file:
//!
//! ```json
//! {
//!   "log_directory": "/var/log/payments",
//!   "app_name": "payments",
//!   "environment": "prod",
//!   "s3": {
//!     "endpoint": "https://s3.example.com",
//!     "bucket": "app-logs",
//!     "access_key": "...",
//!     "secret_key": "..."
//!   }
//! }
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use logvault_core::codec::DELIMITER;
use logvault_core::{BucketCredentials, ConfigError, S3ConnectionConfig};
use serde::{Deserialize, Serialize};

/// Storage target of the agent.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageSection {
    /// Endpoint and transport settings.
    #[serde(flatten)]
    pub connection: S3ConnectionConfig,
    /// Destination bucket.
    pub bucket: String,
    /// Access key id.
    pub access_key: String,
    /// Secret access key.
    pub secret_key: String,
}

impl StorageSection {
    /// Credentials for the destination bucket.
    #[must_use]
    pub fn credentials(&self) -> BucketCredentials {
        BucketCredentials::new(&self.bucket, &self.access_key, &self.secret_key)
    }
}

impl fmt::Debug for StorageSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageSection")
            .field("connection", &self.connection)
            .field("bucket", &self.bucket)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Upload gate timings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GateConfig {
    /// How long a file must stay quiet before it is uploaded.
    pub quiescence_ms: u64,
    /// Events closer together than this are treated as one burst.
    pub coalesce_ms: u64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            quiescence_ms: 2000,
            coalesce_ms: 500,
        }
    }
}

impl GateConfig {
    /// Quiescence window.
    #[must_use]
    pub const fn quiescence(&self) -> Duration {
        Duration::from_millis(self.quiescence_ms)
    }

    /// Coalescing window.
    #[must_use]
    pub const fn coalesce(&self) -> Duration {
        Duration::from_millis(self.coalesce_ms)
    }
}

/// Main agent configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentConfig {
    /// Directory holding the rotated log files. Not watched recursively.
    pub log_directory: PathBuf,
    /// Application name, the second partition segment.
    pub app_name: String,
    /// Environment, the first partition segment.
    pub environment: String,
    /// Fixed host id. Probed from the network when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_id: Option<String>,
    /// Storage target.
    pub s3: StorageSection,
    /// Upload gate timings.
    #[serde(default)]
    pub gate: GateConfig,
    /// Re-scan the directory when the watcher reports lost events.
    #[serde(default)]
    pub rescan_on_overflow: bool,
}

impl AgentConfig {
    /// Loads and validates a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// Parses and validates a JSON configuration string.
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(content)?;
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
        Self {
            log_directory: PathBuf::from("/var/log/myapp"),
            app_name: "myapp".to_string(),
            environment: "prod".to_string(),
            host_id: None,
            s3: StorageSection {
                connection: S3ConnectionConfig::new("https://s3.example.com"),
                bucket: "app-logs".to_string(),
                access_key: "CHANGE_ME".to_string(),
                secret_key: "CHANGE_ME".to_string(),
            },
            gate: GateConfig::default(),
            rescan_on_overflow: false,
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.log_directory.as_os_str().is_empty() {
            return Err(ConfigError::Missing("log_directory"));
        }
        partition_segment("environment", &self.environment)?;
        partition_segment("app_name", &self.app_name)?;
        if let Some(host_id) = &self.host_id {
            partition_segment("host_id", host_id)?;
        }

        self.s3.connection.validate()?;
        if self.s3.bucket.trim().is_empty() {
            return Err(ConfigError::Missing("s3.bucket"));
        }
        if self.s3.access_key.trim().is_empty() {
            return Err(ConfigError::Missing("s3.access_key"));
        }
        if self.s3.secret_key.trim().is_empty() {
            return Err(ConfigError::Missing("s3.secret_key"));
        }

        if self.gate.quiescence_ms == 0 {
            return Err(ConfigError::invalid(
                "gate.quiescence_ms",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Partition segments are joined without escaping, so they must not
/// contain the delimiter.
fn partition_segment(field: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Missing(field));
    }
    if value.contains(DELIMITER) {
        return Err(ConfigError::invalid(
            field,
            format!("must not contain '{DELIMITER}'"),
        ));
    }
    Ok(())
}
