//! Object storage capability.
//!
//! Everything above this module talks to a single bucket through
//! [`ObjectStorage`]. The query side and the ingest side never see
//! backend-specific types.

pub mod memory;
pub mod s3;

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;

use crate::error::StorageResult;

pub use memory::InMemoryStorage;
pub use s3::{S3Storage, TlsPolicy};

/// Default page size for listings, matching S3's `ListObjectsV2` cap.
pub const DEFAULT_MAX_KEYS: usize = 1000;

/// A stream of object body chunks.
///
/// Dropping the stream releases the underlying connection.
pub type ByteStream = BoxStream<'static, StorageResult<Bytes>>;

/// Parameters for one page of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRequest {
    /// Only keys starting with this prefix are returned.
    pub prefix: String,
    /// When set, keys containing the delimiter after the prefix are rolled up
    /// into common prefixes.
    pub delimiter: Option<char>,
    /// Opaque token from a previous truncated page.
    pub continuation_token: Option<String>,
    /// Upper bound on entries (objects plus common prefixes) in the page.
    pub max_keys: usize,
}

impl ListRequest {
    /// Creates a flat listing request for `prefix`.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            delimiter: None,
            continuation_token: None,
            max_keys: DEFAULT_MAX_KEYS,
        }
    }

    /// Rolls keys up at `delimiter`.
    #[must_use]
    pub const fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    /// Continues a previous listing.
    #[must_use]
    pub fn with_continuation_token(mut self, token: Option<String>) -> Self {
        self.continuation_token = token;
        self
    }

    /// Sets the page size.
    #[must_use]
    pub fn with_max_keys(mut self, max_keys: usize) -> Self {
        self.max_keys = max_keys.max(1);
        self
    }
}

/// Metadata for one stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    /// Full key.
    pub key: String,
    /// Last modification time reported by the store.
    pub last_modified: DateTime<Utc>,
    /// Size in bytes.
    pub size: u64,
}

/// One page of a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    /// Objects directly under the prefix.
    pub objects: Vec<ObjectSummary>,
    /// Rolled-up prefixes, each ending in the delimiter.
    pub common_prefixes: Vec<String>,
    /// Token to fetch the next page, present iff `is_truncated`.
    pub next_continuation_token: Option<String>,
    /// Whether more results are available.
    pub is_truncated: bool,
}

/// Access to one bucket of an object store.
///
/// Implementations must be safe to share between tasks.
pub trait ObjectStorage: Send + Sync {
    /// Name of the bucket, for logging.
    fn bucket(&self) -> &str;

    /// Stores `body` under `key`, replacing any existing object.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Request`](crate::StorageError::Request) if the
    /// upload fails.
    fn put<'a>(
        &'a self,
        key: &'a str,
        body: Bytes,
    ) -> Pin<Box<dyn Future<Output = StorageResult<()>> + Send + 'a>>;

    /// Opens the object stored under `key` as a byte stream.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`](crate::StorageError::NotFound) if
    /// there is no such object.
    fn get<'a>(
        &'a self,
        key: &'a str,
    ) -> Pin<Box<dyn Future<Output = StorageResult<ByteStream>> + Send + 'a>>;

    /// Fetches one page of a listing.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing request fails.
    fn list<'a>(
        &'a self,
        request: &'a ListRequest,
    ) -> Pin<Box<dyn Future<Output = StorageResult<ListPage>> + Send + 'a>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_request_builder() {
        let req = ListRequest::new("prod/app/")
            .with_delimiter('/')
            .with_continuation_token(Some("tok".to_string()))
            .with_max_keys(10);
        assert_eq!(req.prefix, "prod/app/");
        assert_eq!(req.delimiter, Some('/'));
        assert_eq!(req.continuation_token.as_deref(), Some("tok"));
        assert_eq!(req.max_keys, 10);
    }

    #[test]
    fn list_request_defaults() {
        let req = ListRequest::new("x/");
        assert_eq!(req.delimiter, None);
        assert_eq!(req.continuation_token, None);
        assert_eq!(req.max_keys, DEFAULT_MAX_KEYS);
    }

    #[test]
    fn max_keys_never_zero() {
        assert_eq!(ListRequest::new("").with_max_keys(0).max_keys, 1);
    }

    #[test]
    fn storage_is_object_safe() {
        fn assert_object_safe(_: Option<&dyn ObjectStorage>) {}
        assert_object_safe(None);
    }
}
