//! # logvault-dashboard
//!
//! HTTP API for browsing and searching log files shipped by
//! `logvault-agent`, built on the axum HTTP framework.
//!
//! ## Example
//!
//! ```rust,no_run
//! use logvault_dashboard::{DashboardConfig, DashboardServer};
//!
//! # async fn run() -> Result<(), logvault_dashboard::DashboardError> {
//! let config = DashboardConfig::load("/etc/logvault/dashboard.json")?;
//! let addr = config.bind_addr;
//! let server = DashboardServer::from_config(config)?;
//! server.serve(addr).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## API Endpoints
//!
//! | Endpoint | Method | Description |
//! |----------|--------|-------------|
//! | `/api/health` | GET | Liveness check |
//! | `/api/config/buckets` | GET | Configured bucket names, sorted |
//! | `/api/logs?bucket&env&appName&date` | GET | Log files of one partition, by sequence |
//! | `/api/log-content?bucket&key` | GET | Full text of one file (`text/plain`) |
//! | `/api/search?bucket&env&appName&date&query` | GET | Names of files containing `query` |

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod server;
pub mod state;

// Re-export main types
pub use config::DashboardConfig;
pub use error::{DashboardError, DashboardResult};
pub use server::DashboardServer;
pub use state::DashboardState;
