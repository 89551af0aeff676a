//! # logvault-agent
//!
//! Ships rotated log files from one local directory into partitioned object
//! storage.
//!
//! Files named `<service>-DD-MM-YYYY-N.log` are uploaded to
//! `environment/app_name/host_id/YYYY-MM-DD/<file name>` once they have been
//! quiet for the configured quiescence window. Files with other names are
//! ignored.
//!
//! ## Example
//!
//! ```rust,no_run
//! use logvault_agent::{AgentConfig, HostId, Ingestor, WatchStream};
//! use logvault_core::S3Storage;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = AgentConfig::load("/etc/logvault/agent.json")?;
//! let storage = S3Storage::connect(&config.s3.connection, &config.s3.credentials())?;
//! let host_id = HostId::detect(config.host_id.as_deref());
//!
//! let mut ingestor = Ingestor::from_config(&config, Arc::new(storage), host_id);
//! let watch = WatchStream::subscribe(&config.log_directory)?;
//! ingestor.scan_directory(tokio::time::Instant::now()).await;
//! ingestor.run(watch, CancellationToken::new()).await;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod gate;
pub mod host;
pub mod ingestor;
pub mod uploader;
pub mod watcher;

// Re-export main types
pub use config::{AgentConfig, GateConfig, StorageSection};
pub use error::{AgentError, Result};
pub use gate::{FileState, GateDecision, UploadGate};
pub use host::{HostId, UNKNOWN_HOST};
pub use ingestor::{cancel_on_signal, IngestStats, Ingestor};
pub use uploader::{SkipReason, UploadOutcome, Uploader};
pub use watcher::{WatchEventKind, WatchSignal, WatchStream};
