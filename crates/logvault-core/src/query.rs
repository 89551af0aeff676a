//! Query surface used by the presentation layer.
//!
//! Every operation validates its arguments and resolves the bucket before
//! touching storage, so caller errors never cost a request.

use std::sync::Arc;

use tracing::{debug, error};

use crate::catalog::CatalogReader;
use crate::content::ContentReader;
use crate::error::{QueryError, QueryResult};
use crate::registry::BucketRegistry;
use crate::search::{DEFAULT_SEARCH_CONCURRENCY, SearchEngine};
use crate::storage::{DEFAULT_MAX_KEYS, ObjectStorage};
use crate::types::LogFileEntry;

/// Query service over an immutable bucket registry.
#[derive(Debug, Clone)]
pub struct LogQueryService {
    registry: Arc<BucketRegistry>,
    search_concurrency: usize,
    page_size: usize,
}

impl LogQueryService {
    /// Creates a service over `registry`.
    pub fn new(registry: Arc<BucketRegistry>) -> Self {
        Self {
            registry,
            search_concurrency: DEFAULT_SEARCH_CONCURRENCY,
            page_size: DEFAULT_MAX_KEYS,
        }
    }

    /// Sets how many files a search scans concurrently.
    #[must_use]
    pub fn with_search_concurrency(mut self, concurrency: usize) -> Self {
        self.search_concurrency = concurrency.max(1);
        self
    }

    /// Sets the listing page size.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// The underlying registry.
    #[must_use]
    pub fn registry(&self) -> &BucketRegistry {
        &self.registry
    }

    /// Configured bucket names, sorted.
    #[must_use]
    pub fn list_buckets(&self) -> Vec<String> {
        self.registry.names()
    }

    /// Lists the log files of one partition, ordered by sequence.
    ///
    /// # Errors
    ///
    /// Fails only for caller errors: an empty argument or an unknown bucket.
    /// Storage failures degrade to an empty or partial list.
    pub async fn list_log_files(
        &self,
        bucket: &str,
        environment: &str,
        app_name: &str,
        date: &str,
    ) -> QueryResult<Vec<LogFileEntry>> {
        require("bucket", bucket)?;
        require("env", environment)?;
        require("appName", app_name)?;
        require("date", date)?;
        let storage = self.registry.get(bucket)?;

        let entries = self.catalog(storage).list_files(environment, app_name, date).await;
        debug!(bucket = %bucket, env = %environment, app = %app_name, date = %date, files = entries.len(), "listed log files");
        Ok(entries)
    }

    /// Returns the full text of one object.
    ///
    /// # Errors
    ///
    /// Besides caller errors, returns [`QueryError::NotFound`] for a missing
    /// key and [`QueryError::Storage`] if the read fails.
    pub async fn get_log_content(&self, bucket: &str, key: &str) -> QueryResult<String> {
        require("bucket", bucket)?;
        require("key", key)?;
        let storage = self.registry.get(bucket)?;

        ContentReader::new(storage)
            .read_all(key)
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    QueryError::NotFound(key.to_string())
                } else {
                    error!(bucket = %bucket, key = %key, error = %e, "failed to read log content");
                    QueryError::Storage(e)
                }
            })
    }

    /// Returns the names of files in the partition containing `query`.
    ///
    /// # Errors
    ///
    /// Fails only for caller errors, including an empty `query`.
    pub async fn search_logs(
        &self,
        bucket: &str,
        environment: &str,
        app_name: &str,
        date: &str,
        query: &str,
    ) -> QueryResult<Vec<String>> {
        require("bucket", bucket)?;
        require("env", environment)?;
        require("appName", app_name)?;
        require("date", date)?;
        require("query", query)?;
        let storage = self.registry.get(bucket)?;

        let engine = SearchEngine::new(storage.clone())
            .with_catalog(self.catalog(storage))
            .with_concurrency(self.search_concurrency);
        let hits = engine.search(environment, app_name, date, query).await;
        debug!(bucket = %bucket, env = %environment, app = %app_name, date = %date, matches = hits.len(), "search finished");
        Ok(hits)
    }

    fn catalog(&self, storage: Arc<dyn ObjectStorage>) -> CatalogReader {
        CatalogReader::new(storage).with_page_size(self.page_size)
    }
}

fn require(name: &'static str, value: &str) -> QueryResult<()> {
    if value.is_empty() {
        Err(QueryError::MissingArgument(name))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;
    use chrono::Utc;
    use test_case::test_case;

    fn service() -> (LogQueryService, Arc<InMemoryStorage>) {
        let store = Arc::new(InMemoryStorage::new("logs"));
        store.insert(
            "prod/app/h1/2024-03-05/app-05-03-2024-1.log",
            "hello\r\nworld\r\n",
            Utc::now(),
        );
        let registry = BucketRegistry::from_stores([store.clone() as Arc<dyn ObjectStorage>]);
        (LogQueryService::new(Arc::new(registry)), store)
    }

    #[test]
    fn list_buckets_is_sorted() {
        let registry = BucketRegistry::from_stores([
            Arc::new(InMemoryStorage::new("b")) as Arc<dyn ObjectStorage>,
            Arc::new(InMemoryStorage::new("a")) as Arc<dyn ObjectStorage>,
        ]);
        assert_eq!(LogQueryService::new(Arc::new(registry)).list_buckets(), vec!["a", "b"]);
    }

    #[test_case("", "prod", "app", "2024-03-05", "bucket" ; "empty bucket")]
    #[test_case("logs", "", "app", "2024-03-05", "env" ; "empty env")]
    #[test_case("logs", "prod", "", "2024-03-05", "appName" ; "empty app")]
    #[test_case("logs", "prod", "app", "", "date" ; "empty date")]
    #[tokio::test]
    async fn list_rejects_missing_arguments(bucket: &str, env: &str, app: &str, date: &str, missing: &str) {
        let (service, store) = service();
        let err = service
            .list_log_files(bucket, env, app, date)
            .await
            .expect_err("caller error");
        assert!(matches!(err, QueryError::MissingArgument(name) if name == missing));
        assert_eq!(store.request_counts().total(), 0);
    }

    #[tokio::test]
    async fn unknown_bucket_is_rejected_without_storage_calls() {
        let (service, store) = service();
        let err = service
            .list_log_files("other", "prod", "app", "2024-03-05")
            .await
            .expect_err("unknown bucket");
        assert!(matches!(err, QueryError::UnknownBucket(_)));
        assert_eq!(store.request_counts().total(), 0);
    }

    #[tokio::test]
    async fn list_returns_entries() {
        let (service, _) = service();
        let entries = service
            .list_log_files("logs", "prod", "app", "2024-03-05")
            .await
            .expect("listed");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].sequence, 1);
    }

    #[tokio::test]
    async fn content_is_normalized() {
        let (service, _) = service();
        let text = service
            .get_log_content("logs", "prod/app/h1/2024-03-05/app-05-03-2024-1.log")
            .await
            .expect("content");
        assert_eq!(text, "hello\nworld\n");
    }

    #[tokio::test]
    async fn content_for_missing_key_is_not_found() {
        let (service, _) = service();
        let err = service
            .get_log_content("logs", "prod/app/h1/2024-03-05/nope.log")
            .await
            .expect_err("missing");
        assert!(matches!(err, QueryError::NotFound(_)));
        assert!(!err.is_caller_error());
    }

    #[tokio::test]
    async fn content_requires_key() {
        let (service, store) = service();
        let err = service.get_log_content("logs", "").await.expect_err("no key");
        assert!(matches!(err, QueryError::MissingArgument("key")));
        assert_eq!(store.request_counts().total(), 0);
    }

    #[tokio::test]
    async fn empty_query_is_rejected_before_storage() {
        let (service, store) = service();
        let err = service
            .search_logs("logs", "prod", "app", "2024-03-05", "")
            .await
            .expect_err("empty query");
        assert!(matches!(err, QueryError::MissingArgument("query")));
        assert!(err.is_caller_error());
        assert_eq!(store.request_counts().total(), 0);
    }

    #[tokio::test]
    async fn search_finds_matches() {
        let (service, _) = service();
        let hits = service
            .search_logs("logs", "prod", "app", "2024-03-05", "world")
            .await
            .expect("search");
        assert_eq!(hits, vec!["app-05-03-2024-1.log"]);
    }
}
