//! Error types for the agent.

use std::path::PathBuf;

use logvault_core::{ConfigError, StorageError};
use thiserror::Error;

/// Errors that stop the agent.
///
/// Per-file problems never surface here; they are reported through
/// [`UploadOutcome`](crate::uploader::UploadOutcome) instead.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Configuration is missing or invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The storage client could not be built.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The watched directory does not exist or is not a directory.
    #[error("log directory does not exist or is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    /// Subscribing to filesystem notifications failed.
    #[error("failed to watch '{}': {reason}", path.display())]
    Watch {
        /// Directory that could not be watched.
        path: PathBuf,
        /// Underlying failure.
        reason: String,
    },
}

/// Result type alias for agent operations.
pub type Result<T> = std::result::Result<T, AgentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_a_directory_display() {
        let err = AgentError::NotADirectory(PathBuf::from("/var/log/missing"));
        assert_eq!(
            err.to_string(),
            "log directory does not exist or is not a directory: /var/log/missing"
        );
    }

    #[test]
    fn test_watch_error_display() {
        let err = AgentError::Watch {
            path: PathBuf::from("/var/log/app"),
            reason: "inotify limit reached".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "failed to watch '/var/log/app': inotify limit reached"
        );
    }

    #[test]
    fn test_config_error_is_transparent() {
        let err = AgentError::from(ConfigError::Missing("log_directory"));
        assert_eq!(
            err.to_string(),
            "missing required configuration property: log_directory"
        );
    }
}
