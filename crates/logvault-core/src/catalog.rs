//! Catalog listing across host partitions.
//!
//! The host segment of a key is unknown to the query side, so a listing is
//! done in two phases: discover host prefixes under `env/app/` with a
//! delimited listing, then list `env/app/<host>/<date>/` for each host. Both
//! phases follow continuation tokens until the store reports no more pages.

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::codec::{self, DELIMITER};
use crate::error::StorageResult;
use crate::storage::{DEFAULT_MAX_KEYS, ListRequest, ObjectStorage, ObjectSummary};
use crate::types::LogFileEntry;

/// Lists log files for one `(env, app, date)` partition of a bucket.
#[derive(Clone)]
pub struct CatalogReader {
    storage: Arc<dyn ObjectStorage>,
    page_size: usize,
}

impl CatalogReader {
    /// Creates a reader over one bucket.
    pub fn new(storage: Arc<dyn ObjectStorage>) -> Self {
        Self {
            storage,
            page_size: DEFAULT_MAX_KEYS,
        }
    }

    /// Sets the page size requested from the store.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Lists every log file for the partition, across all hosts, sorted by
    /// ascending sequence number.
    ///
    /// Storage failures never escape: a failed host discovery yields an
    /// empty list, and a failed per-host listing drops only that host's
    /// remaining pages. Both are logged.
    pub async fn list_files(&self, environment: &str, app_name: &str, date: &str) -> Vec<LogFileEntry> {
        let bucket = self.storage.bucket();
        let app_prefix = codec::app_prefix(environment, app_name);

        let hosts = match self.discover_hosts(&app_prefix).await {
            Ok(hosts) => hosts,
            Err(e) if e.is_not_found() => {
                debug!(bucket = %bucket, prefix = %app_prefix, "no partitions found");
                return Vec::new();
            }
            Err(e) => {
                error!(bucket = %bucket, prefix = %app_prefix, error = %e, "host discovery failed");
                return Vec::new();
            }
        };
        debug!(bucket = %bucket, prefix = %app_prefix, hosts = hosts.len(), "discovered host partitions");

        let mut entries = Vec::new();
        for host_prefix in &hosts {
            let prefix = codec::host_date_prefix(host_prefix, date);
            if let Err(e) = self.list_partition(&prefix, &mut entries).await {
                if e.is_not_found() {
                    continue;
                }
                warn!(
                    bucket = %bucket,
                    prefix = %prefix,
                    error = %e,
                    "listing host partition failed; results will be partial"
                );
            }
        }

        // Stable: equal sequences keep storage order.
        entries.sort_by_key(|entry| entry.sequence);
        entries
    }

    /// Returns the common prefixes under `app_prefix`, one per host.
    async fn discover_hosts(&self, app_prefix: &str) -> StorageResult<Vec<String>> {
        let mut hosts = Vec::new();
        let mut token = None;
        loop {
            let request = ListRequest::new(app_prefix)
                .with_delimiter(DELIMITER)
                .with_max_keys(self.page_size)
                .with_continuation_token(token);
            let page = self.storage.list(&request).await?;
            hosts.extend(page.common_prefixes);

            match page.next_continuation_token {
                Some(next) if page.is_truncated => token = Some(next),
                _ => break,
            }
        }
        Ok(hosts)
    }

    /// Appends every log file under `prefix` to `entries`.
    async fn list_partition(&self, prefix: &str, entries: &mut Vec<LogFileEntry>) -> StorageResult<()> {
        let mut token = None;
        loop {
            let request = ListRequest::new(prefix)
                .with_max_keys(self.page_size)
                .with_continuation_token(token);
            let page = self.storage.list(&request).await?;
            entries.extend(
                page.objects
                    .iter()
                    .filter(|summary| is_log_file(summary))
                    .map(LogFileEntry::from_summary),
            );

            match page.next_continuation_token {
                Some(next) if page.is_truncated => token = Some(next),
                _ => break,
            }
        }
        Ok(())
    }
}

/// Directory markers and names outside the naming scheme are not log files.
fn is_log_file(summary: &ObjectSummary) -> bool {
    !summary.key.ends_with(DELIMITER)
        && codec::parse_file_name(codec::file_name_of(&summary.key)).is_ok()
}
