//! Error types shared by the ingest and query sides.

use thiserror::Error;

/// Coarse classification of object storage failures.
///
/// Callers never see backend-specific error types; every backend maps its
/// failures onto one of these variants.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The storage client could not be constructed (bad endpoint, malformed
    /// credentials). Only raised at construction time.
    #[error("storage client configuration error: {0}")]
    ClientConfig(String),

    /// A single request failed (network, auth, server-side rejection).
    #[error("storage request failed during {op}: {message}")]
    Request {
        /// The operation that failed (`put`, `get`, `list`).
        op: &'static str,
        /// Backend-provided failure description.
        message: String,
    },

    /// The requested object or prefix does not exist.
    #[error("object not found: {0}")]
    NotFound(String),
}

impl StorageError {
    /// Creates a request error for the given operation.
    pub fn request(op: &'static str, message: impl Into<String>) -> Self {
        Self::Request {
            op,
            message: message.into(),
        }
    }

    /// Returns true if this error means the object is absent.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Failures to map a local file name onto the partition scheme.
///
/// Both variants mean "skip this one file"; neither is ever fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The name does not end in `-DD-MM-YYYY-N.log`.
    #[error("file name does not match <service>-DD-MM-YYYY-N.log: {0}")]
    NoMatch(String),

    /// The date components do not form a calendar date.
    #[error("invalid calendar date {day:02}-{month:02}-{year:04}")]
    InvalidDate {
        /// Day of month as written in the file name.
        day: u32,
        /// Month as written in the file name.
        month: u32,
        /// Year as written in the file name.
        year: i32,
    },
}

/// Errors surfaced by the query surface.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The bucket is not present in the registry.
    #[error("invalid or unconfigured bucket specified: {0}")]
    UnknownBucket(String),

    /// A required argument was empty.
    #[error("missing required parameter: {0}")]
    MissingArgument(&'static str),

    /// The requested object does not exist.
    #[error("log file not found: {0}")]
    NotFound(String),

    /// Reading an object failed.
    #[error("error reading log content: {0}")]
    Storage(#[source] StorageError),
}

impl QueryError {
    /// Returns true for errors caused by the caller's request rather than by
    /// the system.
    #[must_use]
    pub const fn is_caller_error(&self) -> bool {
        matches!(self, Self::UnknownBucket(_) | Self::MissingArgument(_))
    }
}

/// Fatal configuration errors; the process must not start.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required setting is missing or blank.
    #[error("missing required configuration property: {0}")]
    Missing(&'static str),

    /// A setting is present but invalid.
    #[error("invalid configuration property {field}: {reason}")]
    Invalid {
        /// Name of the offending setting.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// The configuration file could not be read or written.
    #[error("failed to access configuration file '{path}': {source}")]
    Io {
        /// Path of the configuration file.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON for the expected schema.
    #[error("invalid configuration file: {0}")]
    Parse(#[from] serde_json::Error),

    /// A storage client could not be built from the configuration.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ConfigError {
    /// Creates an invalid-setting error.
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Result type alias for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Result type alias for query operations.
pub type QueryResult<T> = std::result::Result<T, QueryError>;
