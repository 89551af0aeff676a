//! Immutable bucket registry.
//!
//! Built once at startup and shared read-only; there is no way to add or
//! replace a bucket afterwards.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::info;

use crate::config::{BucketCredentials, S3ConnectionConfig};
use crate::error::{ConfigError, QueryError, QueryResult};
use crate::storage::{ObjectStorage, S3Storage};

/// Maps bucket names to storage handles.
#[derive(Clone, Default)]
pub struct BucketRegistry {
    buckets: BTreeMap<String, Arc<dyn ObjectStorage>>,
}

impl BucketRegistry {
    /// Builds one S3 client per configured bucket.
    ///
    /// # Errors
    ///
    /// Fails on invalid settings, duplicate bucket names, or a client that
    /// cannot be constructed. All of these are fatal at startup.
    pub fn from_config(
        connection: &S3ConnectionConfig,
        buckets: &[BucketCredentials],
    ) -> Result<Self, ConfigError> {
        connection.validate()?;
        if buckets.is_empty() {
            return Err(ConfigError::Missing("buckets"));
        }

        let mut map: BTreeMap<String, Arc<dyn ObjectStorage>> = BTreeMap::new();
        for credentials in buckets {
            credentials.validate()?;
            if map.contains_key(&credentials.name) {
                return Err(ConfigError::invalid(
                    "buckets",
                    format!("duplicate bucket name '{}'", credentials.name),
                ));
            }
            let storage = S3Storage::connect(connection, credentials)?;
            info!(bucket = %credentials.name, endpoint = %connection.endpoint, "registered bucket");
            map.insert(credentials.name.clone(), Arc::new(storage));
        }

        Ok(Self { buckets: map })
    }

    /// Builds a registry from ready-made storage handles, keyed by
    /// [`ObjectStorage::bucket`]. Later duplicates replace earlier ones.
    pub fn from_stores(stores: impl IntoIterator<Item = Arc<dyn ObjectStorage>>) -> Self {
        let buckets = stores
            .into_iter()
            .map(|s| (s.bucket().to_string(), s))
            .collect();
        Self { buckets }
    }

    /// Configured bucket names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.buckets.keys().cloned().collect()
    }

    /// Resolves a bucket name.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::UnknownBucket`] if the name is not configured.
    pub fn get(&self, bucket: &str) -> QueryResult<Arc<dyn ObjectStorage>> {
        self.buckets
            .get(bucket)
            .cloned()
            .ok_or_else(|| QueryError::UnknownBucket(bucket.to_string()))
    }

    /// Returns true if `bucket` is configured.
    #[must_use]
    pub fn contains(&self, bucket: &str) -> bool {
        self.buckets.contains_key(bucket)
    }

    /// Number of configured buckets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Returns true if no bucket is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

impl fmt::Debug for BucketRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BucketRegistry")
            .field("buckets", &self.buckets.keys().collect::<Vec<_>>())
            .finish()
    }
}
