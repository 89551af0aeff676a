//! logvault-agent - log shipping agent
//!
//! Watches one directory of rotated log files and uploads each file to
//! object storage once its writer has gone quiet.

use clap::{Parser, Subcommand};
use logvault_agent::{cancel_on_signal, AgentConfig, HostId, Ingestor, WatchStream};
use logvault_core::S3Storage;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "logvault-agent")]
#[command(about = "Ships rotated log files into partitioned object storage")]
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
    /// Scan the log directory, then watch it and upload files as they settle
    Run {
        /// Path to config file
        #[arg(short, long, default_value = "/etc/logvault/agent.json")]
        config: PathBuf,
    },

    /// Upload every log file currently in the directory, then exit
    Scan {
        /// Path to config file
        #[arg(short, long, default_value = "/etc/logvault/agent.json")]
        config: PathBuf,
    },

    /// Generate a sample config file
    InitConfig {
        /// Path to write config
        #[arg(short, long, default_value = "/etc/logvault/agent.json")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = EnvFilter::from_default_env()
        .add_directive("logvault_agent=info".parse()?)
        .add_directive("logvault_core=info".parse()?);
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
        Commands::Run { config } => {
            run_agent(config).await?;
        }

        Commands::Scan { config } => {
            scan_once(config).await?;
        }

        Commands::InitConfig { output } => {
            init_config(output)?;
        }
    }

    Ok(())
}

fn build_ingestor(config: &AgentConfig) -> anyhow::Result<Ingestor> {
    let storage = S3Storage::connect(&config.s3.connection, &config.s3.credentials())?;
    let host_id = HostId::detect(config.host_id.as_deref());
    info!(
        directory = %config.log_directory.display(),
        environment = %config.environment,
        app = %config.app_name,
        host_id = %host_id,
        bucket = %config.s3.bucket,
        "loaded config"
    );
    Ok(Ingestor::from_config(config, Arc::new(storage), host_id))
}

async fn run_agent(config_path: PathBuf) -> anyhow::Result<()> {
    info!(config = %config_path.display(), "starting logvault-agent");

    let config = AgentConfig::load(&config_path)?;
    let mut ingestor = build_ingestor(&config)?;

    // Subscribe first so nothing written during the scan is missed.
    let watch = WatchStream::subscribe(&config.log_directory)?;
    ingestor.scan_directory(tokio::time::Instant::now()).await;

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(cancel_on_signal(tokio::signal::ctrl_c(), shutdown));

    let stats = ingestor.run(watch, cancel).await;
    info!(
        uploaded = stats.uploaded,
        skipped = stats.skipped,
        failed = stats.failed,
        overflows = stats.overflows,
        "logvault-agent stopped"
    );
    Ok(())
}

async fn scan_once(config_path: PathBuf) -> anyhow::Result<()> {
    let config = AgentConfig::load(&config_path)?;
    let mut ingestor = build_ingestor(&config)?;

    let found = ingestor.scan_directory(tokio::time::Instant::now()).await;
    let stats = ingestor.flush_pending().await;

    println!("Found {found} log files in {}", config.log_directory.display());
    println!("  uploaded: {}", stats.uploaded);
    println!("  skipped:  {}", stats.skipped);
    println!("  failed:   {}", stats.failed);

    if stats.failed > 0 {
        anyhow::bail!("{} uploads failed", stats.failed);
    }
    Ok(())
}

fn init_config(output: PathBuf) -> anyhow::Result<()> {
    let config = AgentConfig::sample();
    config.save(&output)?;

    println!("Config written to {}", output.display());
    println!();
    println!("Edit the directory, partition names and credentials, then run:");
    println!("  logvault-agent run --config {}", output.display());

    Ok(())
}
