//! S3-compatible backend built on `object_store`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as ObjectPath;
use object_store::{ClientOptions, ObjectMeta, ObjectStore, PutPayload};
use tracing::{debug, warn};

use super::{ByteStream, ListPage, ListRequest, ObjectStorage, ObjectSummary};
use crate::config::{BucketCredentials, S3ConnectionConfig};
use crate::error::{StorageError, StorageResult};

/// Certificate verification policy for the storage client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TlsPolicy {
    /// Verify server certificates (default).
    #[default]
    Verify,
    /// Accept any server certificate.
    ///
    /// Only reachable through an explicit configuration opt-in; every client
    /// built with this policy logs a warning.
    InsecureSkipVerify,
}

impl TlsPolicy {
    /// Maps the configuration flag onto a policy.
    #[must_use]
    pub const fn from_opt_in(insecure_skip_verify: bool) -> Self {
        if insecure_skip_verify {
            Self::InsecureSkipVerify
        } else {
            Self::Verify
        }
    }

    /// Returns true if certificate validation is disabled.
    #[must_use]
    pub const fn is_insecure(self) -> bool {
        matches!(self, Self::InsecureSkipVerify)
    }
}

/// One bucket of an S3-compatible object store.
#[derive(Debug, Clone)]
pub struct S3Storage {
    bucket: String,
    store: Arc<dyn ObjectStore>,
}

impl S3Storage {
    /// Builds a client for `credentials.name` against the configured endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ClientConfig`] if the client cannot be built.
    pub fn connect(connection: &S3ConnectionConfig, credentials: &BucketCredentials) -> StorageResult<Self> {
        let tls = TlsPolicy::from_opt_in(connection.insecure_skip_tls_verify);
        if tls.is_insecure() {
            warn!(
                bucket = %credentials.name,
                endpoint = %connection.endpoint,
                "TLS certificate verification is DISABLED for this storage client (insecure_skip_tls_verify = true)"
            );
        }

        let allow_http = connection.endpoint.starts_with("http://");
        let options = ClientOptions::new()
            .with_allow_http(allow_http)
            .with_allow_invalid_certificates(tls.is_insecure());

        let store = AmazonS3Builder::new()
            .with_endpoint(&connection.endpoint)
            .with_region(&connection.region)
            .with_bucket_name(&credentials.name)
            .with_access_key_id(&credentials.access_key)
            .with_secret_access_key(&credentials.secret_key)
            .with_virtual_hosted_style_request(!connection.path_style_access)
            .with_client_options(options)
            .build()
            .map_err(|e| {
                StorageError::ClientConfig(format!(
                    "failed to build S3 client for bucket '{}': {e}",
                    credentials.name
                ))
            })?;

        debug!(
            bucket = %credentials.name,
            endpoint = %connection.endpoint,
            path_style = connection.path_style_access,
            "storage client ready"
        );

        Ok(Self::from_store(credentials.name.clone(), Arc::new(store)))
    }

    /// Wraps an existing `object_store` handle.
    pub fn from_store(bucket: impl Into<String>, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            bucket: bucket.into(),
            store,
        }
    }

    async fn list_delimited(&self, request: &ListRequest, delimiter: char) -> StorageResult<ListPage> {
        let prefix = prefix_path(&request.prefix);
        let listing = self
            .store
            .list_with_delimiter(prefix.as_ref())
            .await
            .map_err(|e| map_error("list", e))?;

        // object_store walks every page itself, so the whole listing arrives
        // as one untruncated page.
        let mut common_prefixes: Vec<String> = listing
            .common_prefixes
            .into_iter()
            .map(|p| {
                let mut s = p.to_string();
                s.push(delimiter);
                s
            })
            .collect();
        common_prefixes.sort();

        Ok(ListPage {
            objects: listing
                .objects
                .into_iter()
                .filter(|meta| meta.location.as_ref().starts_with(&request.prefix))
                .map(summary)
                .collect(),
            common_prefixes,
            next_continuation_token: None,
            is_truncated: false,
        })
    }

    async fn list_flat(&self, request: &ListRequest) -> StorageResult<ListPage> {
        let prefix = prefix_path(&request.prefix);
        let limit = request.max_keys.max(1);

        let stream = match request.continuation_token.as_deref() {
            Some(token) => self
                .store
                .list_with_offset(prefix.as_ref(), &ObjectPath::from(token)),
            None => self.store.list(prefix.as_ref()),
        };

        // Listing order is backend-defined, so a page is cut only after the
        // whole prefix has been collected and sorted.
        let mut metas: Vec<ObjectMeta> = stream
            .try_collect()
            .await
            .map_err(|e| map_error("list", e))?;
        metas.retain(|meta| {
            let key = meta.location.as_ref();
            key.starts_with(&request.prefix)
                && request
                    .continuation_token
                    .as_deref()
                    .is_none_or(|token| key > token)
        });
        metas.sort_by(|a, b| a.location.cmp(&b.location));

        let is_truncated = metas.len() > limit;
        metas.truncate(limit);
        let next_continuation_token = if is_truncated {
            metas.last().map(|m| m.location.to_string())
        } else {
            None
        };

        Ok(ListPage {
            objects: metas.into_iter().map(summary).collect(),
            common_prefixes: Vec::new(),
            next_continuation_token,
            is_truncated,
        })
    }
}

impl ObjectStorage for S3Storage {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn put<'a>(
        &'a self,
        key: &'a str,
        body: Bytes,
    ) -> Pin<Box<dyn Future<Output = StorageResult<()>> + Send + 'a>> {
        Box::pin(async move {
            self.store
                .put(&ObjectPath::from(key), PutPayload::from(body))
                .await
                .map_err(|e| map_error("put", e))?;
            Ok(())
        })
    }

    fn get<'a>(
        &'a self,
        key: &'a str,
    ) -> Pin<Box<dyn Future<Output = StorageResult<ByteStream>> + Send + 'a>> {
        Box::pin(async move {
            let result = self
                .store
                .get(&ObjectPath::from(key))
                .await
                .map_err(|e| map_error("get", e))?;
            let stream: ByteStream = result.into_stream().map_err(|e| map_error("get", e)).boxed();
            Ok(stream)
        })
    }

    fn list<'a>(
        &'a self,
        request: &'a ListRequest,
    ) -> Pin<Box<dyn Future<Output = StorageResult<ListPage>> + Send + 'a>> {
        Box::pin(async move {
            match request.delimiter {
                Some(delimiter) => self.list_delimited(request, delimiter).await,
                None => self.list_flat(request).await,
            }
        })
    }
}

/// `object_store` paths never carry a trailing delimiter.
fn prefix_path(prefix: &str) -> Option<ObjectPath> {
    let trimmed = prefix.trim_end_matches('/');
    (!trimmed.is_empty()).then(|| ObjectPath::from(trimmed))
}

fn summary(meta: ObjectMeta) -> ObjectSummary {
    ObjectSummary {
        key: meta.location.to_string(),
        last_modified: meta.last_modified,
        size: meta.size as u64,
    }
}

fn map_error(op: &'static str, err: object_store::Error) -> StorageError {
    match err {
        object_store::Error::NotFound { path, .. } => StorageError::NotFound(path),
        other => StorageError::request(op, other.to_string()),
    }
}
