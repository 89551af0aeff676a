//! Single-file upload.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use logvault_core::{CodecError, ObjectStorage, PartitionKey};
use tracing::{debug, error, info};

use crate::host::HostId;

/// Why a file was not uploaded. Never retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The name is not `<service>-DD-MM-YYYY-N.log`.
    NoMatch,
    /// The name carries an impossible date.
    InvalidDate(CodecError),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoMatch => f.write_str("file name does not match the log naming pattern"),
            Self::InvalidDate(e) => write!(f, "{e}"),
        }
    }
}

/// Result of one upload attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// The file is stored under `key`.
    Uploaded {
        /// Storage key.
        key: String,
        /// Bytes written.
        bytes: u64,
    },
    /// The file was deliberately left alone.
    Skipped(SkipReason),
    /// Reading or storing the file failed.
    Failed(String),
}

impl UploadOutcome {
    /// Returns true if the file was stored.
    #[must_use]
    pub const fn is_uploaded(&self) -> bool {
        matches!(self, Self::Uploaded { .. })
    }
}

/// Uploads files of one directory under a fixed partition.
#[derive(Clone)]
pub struct Uploader {
    storage: Arc<dyn ObjectStorage>,
    environment: String,
    app_name: String,
    host_id: HostId,
}

impl Uploader {
    /// Creates an uploader writing below `environment/app_name/host_id/`.
    pub fn new(
        storage: Arc<dyn ObjectStorage>,
        environment: impl Into<String>,
        app_name: impl Into<String>,
        host_id: HostId,
    ) -> Self {
        Self {
            storage,
            environment: environment.into(),
            app_name: app_name.into(),
            host_id,
        }
    }

    /// Host id embedded in every key.
    #[must_use]
    pub fn host_id(&self) -> &HostId {
        &self.host_id
    }

    /// Resolves the storage key for `path` without uploading.
    pub fn key_for(&self, path: &Path) -> Result<PartitionKey, SkipReason> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or(SkipReason::NoMatch)?;
        PartitionKey::for_file(&self.environment, &self.app_name, self.host_id.as_str(), file_name)
            .map_err(|e| match e {
                CodecError::NoMatch(_) => SkipReason::NoMatch,
                invalid @ CodecError::InvalidDate { .. } => SkipReason::InvalidDate(invalid),
            })
    }

    /// Uploads one file. Never panics and never returns an error: every
    /// outcome is logged and reported.
    pub async fn upload(&self, path: &Path) -> UploadOutcome {
        let key = match self.key_for(path) {
            Ok(key) => key.to_key(),
            Err(SkipReason::NoMatch) => {
                debug!(path = %path.display(), "skipping file not matching log naming pattern");
                return UploadOutcome::Skipped(SkipReason::NoMatch);
            }
            Err(reason) => {
                info!(path = %path.display(), reason = %reason, "skipping file with invalid date");
                return UploadOutcome::Skipped(reason);
            }
        };

        let data = match tokio::fs::read(path).await {
            Ok(data) => data,
            Err(e) => {
                error!(path = %path.display(), error = %e, "failed to read log file");
                return UploadOutcome::Failed(format!("reading {}: {e}", path.display()));
            }
        };
        let bytes = data.len() as u64;

        match self.storage.put(&key, Bytes::from(data)).await {
            Ok(()) => {
                info!(
                    path = %path.display(),
                    bucket = %self.storage.bucket(),
                    key = %key,
                    bytes,
                    "uploaded log file"
                );
                UploadOutcome::Uploaded { key, bytes }
            }
            Err(e) => {
                error!(
                    path = %path.display(),
                    bucket = %self.storage.bucket(),
                    key = %key,
                    error = %e,
                    "failed to upload log file"
                );
                UploadOutcome::Failed(e.to_string())
            }
        }
    }
}
