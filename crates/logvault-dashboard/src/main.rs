//! logvault-dashboard - log browsing API
//!
//! Serves the catalog, content and search endpoints over the configured
//! buckets.

use clap::{Parser, Subcommand};
use logvault_dashboard::{DashboardConfig, DashboardServer};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "logvault-dashboard")]
#[command(about = "HTTP API for browsing and searching shipped log files")]
#[command(version)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the API until interrupted
    Serve {
        /// Path to config file
        #[arg(short, long, default_value = "/etc/logvault/dashboard.json")]
        config: PathBuf,

        /// Override the configured bind address
        #[arg(long, env = "LOGVAULT_BIND")]
        bind: Option<SocketAddr>,
    },

    /// Generate a sample config file
    InitConfig {
        /// Path to write config
        #[arg(short, long, default_value = "/etc/logvault/dashboard.json")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = EnvFilter::from_default_env()
        .add_directive("logvault_dashboard=info".parse()?)
        .add_directive("logvault_core=info".parse()?)
        .add_directive("tower_http=info".parse()?);
    if cli.json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }

    match cli.command {
        Commands::Serve { config, bind } => {
            serve(config, bind).await?;
        }

        Commands::InitConfig { output } => {
            init_config(output)?;
        }
    }

    Ok(())
}

async fn serve(config_path: PathBuf, bind: Option<SocketAddr>) -> anyhow::Result<()> {
    info!(config = %config_path.display(), "starting logvault-dashboard");

    let mut config = DashboardConfig::load(&config_path)?;
    if let Some(addr) = bind {
        config.bind_addr = addr;
    }
    let addr = config.bind_addr;

    let server = DashboardServer::from_config(config)?;
    server
        .serve_with_shutdown(addr, async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("received interrupt"),
                Err(e) => {
                    error!(error = %e, "failed to listen for interrupt, serving without it");
                    std::future::pending::<()>().await;
                }
            }
        })
        .await?;

    Ok(())
}

fn init_config(output: PathBuf) -> anyhow::Result<()> {
    let config = DashboardConfig::sample();
    config.save(&output)?;

    println!("Config written to {}", output.display());
    println!();
    println!("Edit the endpoint and bucket credentials, then run:");
    println!("  logvault-dashboard serve --config {}", output.display());

    Ok(())
}
