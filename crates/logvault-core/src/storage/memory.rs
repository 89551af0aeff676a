//! In-memory bucket.
//!
//! Follows `ListObjectsV2` paging semantics closely enough that the catalog
//! can be exercised against it: lexicographic order, common prefix roll-up,
//! and continuation tokens that resume strictly after the last entry of the
//! previous page.

use std::collections::BTreeMap;
use std::future::Future;
use std::ops::Bound;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream;
use parking_lot::RwLock;

use super::{ByteStream, ListPage, ListRequest, ObjectStorage, ObjectSummary};
use crate::error::{StorageError, StorageResult};

/// Default chunk size for streamed reads.
const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone)]
struct StoredObject {
    body: Bytes,
    last_modified: DateTime<Utc>,
}

/// Number of requests served, by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestCounts {
    /// `put` calls.
    pub puts: u64,
    /// `get` calls.
    pub gets: u64,
    /// `list` calls.
    pub lists: u64,
}

impl RequestCounts {
    /// Total number of requests.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.puts + self.gets + self.lists
    }
}

/// A bucket held entirely in memory.
#[derive(Debug)]
pub struct InMemoryStorage {
    bucket: String,
    objects: RwLock<BTreeMap<String, StoredObject>>,
    page_size: Option<usize>,
    chunk_size: usize,
    puts: AtomicU64,
    gets: AtomicU64,
    lists: AtomicU64,
}

impl InMemoryStorage {
    /// Creates an empty bucket.
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: RwLock::new(BTreeMap::new()),
            page_size: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            puts: AtomicU64::new(0),
            gets: AtomicU64::new(0),
            lists: AtomicU64::new(0),
        }
    }

    /// Caps every listing page at `page_size` entries regardless of the
    /// requested `max_keys`.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size.max(1));
        self
    }

    /// Splits streamed bodies into chunks of `chunk_size` bytes.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Inserts an object directly, with an explicit modification time.
    pub fn insert(&self, key: impl Into<String>, body: impl Into<Bytes>, last_modified: DateTime<Utc>) {
        self.objects.write().insert(
            key.into(),
            StoredObject {
                body: body.into(),
                last_modified,
            },
        );
    }

    /// Returns a copy of the stored body, if any.
    #[must_use]
    pub fn object(&self, key: &str) -> Option<Bytes> {
        self.objects.read().get(key).map(|o| o.body.clone())
    }

    /// Returns all stored keys in order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.objects.read().keys().cloned().collect()
    }

    /// Number of stored objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    /// Returns true if the bucket is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    /// Requests served so far.
    #[must_use]
    pub fn request_counts(&self) -> RequestCounts {
        RequestCounts {
            puts: self.puts.load(Ordering::Relaxed),
            gets: self.gets.load(Ordering::Relaxed),
            lists: self.lists.load(Ordering::Relaxed),
        }
    }

    fn list_page(&self, request: &ListRequest) -> ListPage {
        let limit = self
            .page_size
            .map_or(request.max_keys, |p| p.min(request.max_keys))
            .max(1);
        let objects = self.objects.read();

        let lower = match request.continuation_token.as_deref() {
            Some(token) => Bound::Excluded(token.to_string()),
            None => Bound::Included(request.prefix.clone()),
        };

        let mut page = ListPage::default();
        let mut last_entry: Option<String> = None;
        let mut emitted = 0usize;

        for (key, object) in objects.range((lower, Bound::Unbounded)) {
            if !key.starts_with(&request.prefix) {
                if key.as_str() > request.prefix.as_str() {
                    break;
                }
                continue;
            }

            let rolled_up = request.delimiter.and_then(|d| {
                let rest = &key[request.prefix.len()..];
                rest.find(d)
                    .map(|idx| key[..request.prefix.len() + idx + d.len_utf8()].to_string())
            });

            // Keys under a common prefix that was the last entry of the
            // previous page belong to that page.
            if let (Some(prefix), Some(token)) = (&rolled_up, request.continuation_token.as_deref()) {
                if prefix.as_str() <= token {
                    continue;
                }
            }
            if let (Some(prefix), Some(last)) = (&rolled_up, &last_entry) {
                if prefix == last {
                    continue;
                }
            }

            if emitted == limit {
                page.is_truncated = true;
                page.next_continuation_token = last_entry.clone();
                break;
            }

            match rolled_up {
                Some(prefix) => {
                    page.common_prefixes.push(prefix.clone());
                    last_entry = Some(prefix);
                }
                None => {
                    page.objects.push(ObjectSummary {
                        key: key.clone(),
                        last_modified: object.last_modified,
                        size: object.body.len() as u64,
                    });
                    last_entry = Some(key.clone());
                }
            }
            emitted += 1;
        }

        page
    }
}

impl ObjectStorage for InMemoryStorage {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn put<'a>(
        &'a self,
        key: &'a str,
        body: Bytes,
    ) -> Pin<Box<dyn Future<Output = StorageResult<()>> + Send + 'a>> {
        Box::pin(async move {
            self.puts.fetch_add(1, Ordering::Relaxed);
            self.insert(key, body, Utc::now());
            Ok(())
        })
    }

    fn get<'a>(
        &'a self,
        key: &'a str,
    ) -> Pin<Box<dyn Future<Output = StorageResult<ByteStream>> + Send + 'a>> {
        Box::pin(async move {
            self.gets.fetch_add(1, Ordering::Relaxed);
            let body = self
                .object(key)
                .ok_or_else(|| StorageError::NotFound(key.to_string()))?;

            let chunk_size = self.chunk_size;
            let chunks: Vec<StorageResult<Bytes>> = (0..body.len())
                .step_by(chunk_size)
                .map(|start| Ok(body.slice(start..(start + chunk_size).min(body.len()))))
                .collect();
            let stream: ByteStream = Box::pin(stream::iter(chunks));
            Ok(stream)
        })
    }

    fn list<'a>(
        &'a self,
        request: &'a ListRequest,
    ) -> Pin<Box<dyn Future<Output = StorageResult<ListPage>> + Send + 'a>> {
        Box::pin(async move {
            self.lists.fetch_add(1, Ordering::Relaxed);
            Ok(self.list_page(request))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    fn seeded() -> InMemoryStorage {
        let store = InMemoryStorage::new("logs");
        let now = Utc::now();
        for key in [
            "prod/app/10.0.0.1/2024-03-05/a-05-03-2024-1.log",
            "prod/app/10.0.0.1/2024-03-05/a-05-03-2024-2.log",
            "prod/app/10.0.0.1/2024-03-06/a-06-03-2024-1.log",
            "prod/app/10.0.0.2/2024-03-05/a-05-03-2024-1.log",
            "prod/app/10.0.0.3/2024-03-05/a-05-03-2024-1.log",
            "prod/other/10.0.0.1/2024-03-05/o-05-03-2024-1.log",
            "staging/app/10.0.0.1/2024-03-05/a-05-03-2024-1.log",
        ] {
            store.insert(key, "line\n", now);
        }
        store
    }

    async fn collect_prefixes(store: &InMemoryStorage, prefix: &str, max_keys: usize) -> Vec<String> {
        let mut token = None;
        let mut out = Vec::new();
        loop {
            let req = ListRequest::new(prefix)
                .with_delimiter('/')
                .with_max_keys(max_keys)
                .with_continuation_token(token);
            let page = store.list(&req).await.expect("list");
            out.extend(page.common_prefixes);
            if !page.is_truncated {
                break;
            }
            token = page.next_continuation_token;
        }
        out
    }

    #[tokio::test]
    async fn put_then_get_returns_body() {
        let store = InMemoryStorage::new("logs");
        store
            .put("a/b.log", Bytes::from_static(b"hello\nworld\n"))
            .await
            .expect("put");

        let stream = store.get("a/b.log").await.expect("get");
        let chunks: Vec<Bytes> = stream.try_collect().await.expect("read");
        assert_eq!(chunks.concat(), b"hello\nworld\n");
        assert_eq!(store.request_counts().puts, 1);
        assert_eq!(store.request_counts().gets, 1);
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let store = InMemoryStorage::new("logs");
        let Err(err) = store.get("missing").await else {
            panic!("expected an error");
        };
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn get_splits_body_into_chunks() {
        let store = InMemoryStorage::new("logs").with_chunk_size(3);
        store.insert("k", "abcdefgh", Utc::now());
        let chunks: Vec<Bytes> = store
            .get("k")
            .await
            .expect("get")
            .try_collect()
            .await
            .expect("read");
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks.concat(), b"abcdefgh");
    }

    #[tokio::test]
    async fn delimited_listing_rolls_up_hosts() {
        let store = seeded();
        let prefixes = collect_prefixes(&store, "prod/app/", 1000).await;
        assert_eq!(
            prefixes,
            vec!["prod/app/10.0.0.1/", "prod/app/10.0.0.2/", "prod/app/10.0.0.3/"]
        );
    }

    #[tokio::test]
    async fn delimited_listing_pages_by_prefix() {
        let store = seeded();
        let first = store
            .list(&ListRequest::new("prod/app/").with_delimiter('/').with_max_keys(2))
            .await
            .expect("list");
        assert_eq!(first.common_prefixes.len(), 2);
        assert!(first.is_truncated);
        assert_eq!(first.next_continuation_token.as_deref(), Some("prod/app/10.0.0.2/"));

        // Paging with a single entry per page still visits every host once.
        let prefixes = collect_prefixes(&store, "prod/app/", 1).await;
        assert_eq!(prefixes.len(), 3);
    }

    #[tokio::test]
    async fn flat_listing_respects_prefix_and_pages() {
        let store = seeded().with_page_size(1);
        let mut token = None;
        let mut keys = Vec::new();
        loop {
            let req = ListRequest::new("prod/app/10.0.0.1/2024-03-05/").with_continuation_token(token);
            let page = store.list(&req).await.expect("list");
            assert!(page.common_prefixes.is_empty());
            keys.extend(page.objects.into_iter().map(|o| o.key));
            if !page.is_truncated {
                break;
            }
            token = page.next_continuation_token;
        }
        assert_eq!(
            keys,
            vec![
                "prod/app/10.0.0.1/2024-03-05/a-05-03-2024-1.log",
                "prod/app/10.0.0.1/2024-03-05/a-05-03-2024-2.log",
            ]
        );
        assert_eq!(store.request_counts().lists, 2);
    }

    #[tokio::test]
    async fn empty_prefix_lists_nothing_extra() {
        let store = seeded();
        let page = store
            .list(&ListRequest::new("nope/"))
            .await
            .expect("list");
        assert_eq!(page, ListPage::default());
    }

    #[test]
    fn request_counts_total() {
        let counts = RequestCounts {
            puts: 1,
            gets: 2,
            lists: 3,
        };
        assert_eq!(counts.total(), 6);
    }
}
