//! # logvault-core
//!
//! Shared core of the logvault log shipper and query service.
//!
//! This crate provides:
//!
//! - [`codec`]: the partition key scheme
//!   `<env>/<app>/<host>/<YYYY-MM-DD>/<service>-DD-MM-YYYY-N.log`
//! - [`ObjectStorage`]: bucket-scoped storage capability, with
//!   [`InMemoryStorage`] and [`S3Storage`] backends
//! - [`BucketRegistry`]: immutable bucket name to storage mapping
//! - [`CatalogReader`]: two-phase, paginated listing across hosts
//! - [`ContentReader`]: line-oriented object reads
//! - [`SearchEngine`]: literal substring search over a partition
//! - [`LogQueryService`]: the query surface used by the dashboard
//!
//! ## Example
//!
//! ```rust
//! use logvault_core::codec::PartitionKey;
//!
//! let key = PartitionKey::for_file("prod", "payments", "10.0.0.5", "payments-05-03-2024-7.log")
//!     .expect("valid log file name");
//! assert_eq!(
//!     key.to_key(),
//!     "prod/payments/10.0.0.5/2024-03-05/payments-05-03-2024-7.log"
//! );
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod catalog;
pub mod codec;
pub mod config;
pub mod content;
pub mod error;
pub mod query;
pub mod registry;
pub mod search;
pub mod storage;
pub mod types;

// Re-export main types
pub use catalog::CatalogReader;
pub use codec::{LogFileName, PartitionKey};
pub use config::{BucketCredentials, S3ConnectionConfig};
pub use content::{ContentReader, LineScan};
pub use error::{CodecError, ConfigError, QueryError, QueryResult, StorageError, StorageResult};
pub use query::LogQueryService;
pub use registry::BucketRegistry;
pub use search::SearchEngine;
pub use storage::{
    ByteStream, InMemoryStorage, ListPage, ListRequest, ObjectStorage, ObjectSummary, S3Storage,
    TlsPolicy,
};
pub use types::LogFileEntry;
