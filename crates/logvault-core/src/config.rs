//! Storage connection settings shared by the agent and the dashboard.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default signing region.
pub const DEFAULT_REGION: &str = "us-east-1";

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

const fn default_path_style() -> bool {
    true
}

/// How to reach the object store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct S3ConnectionConfig {
    /// Endpoint URL, e.g. `https://s3.example.com` or `http://minio:9000`.
    pub endpoint: String,
    /// Signing region.
    #[serde(default = "default_region")]
    pub region: String,
    /// Address buckets as `endpoint/bucket` rather than `bucket.endpoint`.
    #[serde(default = "default_path_style")]
    pub path_style_access: bool,
    /// Accept any server certificate. Logged loudly when enabled.
    #[serde(default)]
    pub insecure_skip_tls_verify: bool,
}

impl S3ConnectionConfig {
    /// Creates a connection with default region and path-style addressing.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            region: default_region(),
            path_style_access: true,
            insecure_skip_tls_verify: false,
        }
    }

    /// Sets the signing region.
    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Chooses between path-style and virtual-hosted addressing.
    #[must_use]
    pub const fn with_path_style_access(mut self, path_style: bool) -> Self {
        self.path_style_access = path_style;
        self
    }

    /// Opts in to skipping certificate verification.
    #[must_use]
    pub const fn with_insecure_skip_tls_verify(mut self, insecure: bool) -> Self {
        self.insecure_skip_tls_verify = insecure;
        self
    }

    /// Validates the connection settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::Missing("endpoint"));
        }
        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            return Err(ConfigError::invalid(
                "endpoint",
                "must start with http:// or https://",
            ));
        }
        if self.region.trim().is_empty() {
            return Err(ConfigError::Missing("region"));
        }
        Ok(())
    }
}

/// Name and static credentials of one bucket.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BucketCredentials {
    /// Bucket name.
    pub name: String,
    /// Access key id.
    pub access_key: String,
    /// Secret access key.
    pub secret_key: String,
}

impl BucketCredentials {
    /// Creates a credential set.
    pub fn new(
        name: impl Into<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        }
    }

    /// Validates that every field is present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Missing("bucket name"));
        }
        if self.access_key.trim().is_empty() {
            return Err(ConfigError::Missing("access_key"));
        }
        if self.secret_key.trim().is_empty() {
            return Err(ConfigError::Missing("secret_key"));
        }
        Ok(())
    }
}

impl fmt::Debug for BucketCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BucketCredentials")
            .field("name", &self.name)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}
