//! Shared state for the dashboard server.

use std::sync::Arc;
use std::time::Instant;

use logvault_core::{BucketRegistry, LogQueryService};

use crate::config::DashboardConfig;
use crate::error::DashboardResult;

/// Shared state for the dashboard server.
#[derive(Debug)]
pub struct DashboardState {
    /// Dashboard configuration.
    config: Arc<DashboardConfig>,
    /// Query surface over the configured buckets.
    service: LogQueryService,
    /// Server start time.
    start_time: Instant,
}

impl DashboardState {
    /// Create a new dashboard state over an existing registry.
    pub fn new(config: DashboardConfig, registry: Arc<BucketRegistry>) -> Self {
        let service = LogQueryService::new(registry).with_search_concurrency(config.search_concurrency);
        Self {
            config: Arc::new(config),
            service,
            start_time: Instant::now(),
        }
    }

    /// Connect to every configured bucket and create the state.
    ///
    /// # Errors
    ///
    /// Returns an error if a bucket is misconfigured or its client cannot be
    /// built.
    pub fn from_config(config: DashboardConfig) -> DashboardResult<Self> {
        let registry = BucketRegistry::from_config(&config.connection, &config.buckets)?;
        Ok(Self::new(config, Arc::new(registry)))
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    /// Get the query service.
    #[must_use]
    pub fn service(&self) -> &LogQueryService {
        &self.service
    }

    /// Seconds since the state was created.
    #[must_use]
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
