//! Substring search over a catalog partition.

use std::ops::ControlFlow;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, error};

use crate::catalog::CatalogReader;
use crate::content::ContentReader;
use crate::storage::ObjectStorage;
use crate::types::LogFileEntry;

/// Default number of files scanned at once.
pub const DEFAULT_SEARCH_CONCURRENCY: usize = 4;

/// Finds files containing a literal, case-sensitive substring.
#[derive(Clone)]
pub struct SearchEngine {
    catalog: CatalogReader,
    content: ContentReader,
    concurrency: usize,
}

impl SearchEngine {
    /// Creates an engine over one bucket.
    pub fn new(storage: Arc<dyn ObjectStorage>) -> Self {
        Self {
            catalog: CatalogReader::new(storage.clone()),
            content: ContentReader::new(storage),
            concurrency: DEFAULT_SEARCH_CONCURRENCY,
        }
    }

    /// Sets how many files are scanned concurrently.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Replaces the catalog reader, e.g. to change its page size.
    #[must_use]
    pub fn with_catalog(mut self, catalog: CatalogReader) -> Self {
        self.catalog = catalog;
        self
    }

    /// Returns the names of files in the partition with at least one line
    /// containing `query`, in catalog order.
    ///
    /// Unreadable files are logged and left out.
    pub async fn search(&self, environment: &str, app_name: &str, date: &str, query: &str) -> Vec<String> {
        let candidates = self.catalog.list_files(environment, app_name, date).await;
        debug!(candidates = candidates.len(), query = %query, "searching partition");

        // `buffered` yields in input order, so catalog order survives.
        stream::iter(candidates)
            .map(|entry| async move {
                let matched = self.file_matches(&entry, query).await;
                matched.then_some(entry.file_name)
            })
            .buffered(self.concurrency)
            .filter_map(|name| async move { name })
            .collect()
            .await
    }

    async fn file_matches(&self, entry: &LogFileEntry, query: &str) -> bool {
        let result = self
            .content
            .for_each_line(&entry.key, |line| {
                if line.contains(query) {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            })
            .await;

        match result {
            Ok(scan) => scan.stopped_early,
            Err(e) => {
                error!(key = %entry.key, error = %e, "skipping unreadable file during search");
                false
            }
        }
    }
}
