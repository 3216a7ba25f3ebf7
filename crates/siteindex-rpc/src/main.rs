//! siteindex RPC Server - JSON-RPC front end for the site index.
//!
//! This binary opens an index database, registers the configured indexes and
//! serves search, listing and rebuild calls over JSON-RPC 2.0.

mod handler;
mod server;

use anyhow::{Context, Result};
use clap::Parser;
use siteindex::{MemoryDocumentSource, SiteIndex, SiteIndexConfig};
use std::path::PathBuf;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "siteindex-rpc")]
#[command(about = "JSON-RPC server for siteindex")]
struct Args {
    /// Port to listen on (0 = auto-assign)
    #[arg(short, long, default_value = "0")]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Index database file
    #[arg(long, default_value = "siteindex.db")]
    db: PathBuf,

    /// JSON configuration with index definitions and search settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON array of documents used for rebuilds
    #[arg(long)]
    documents: Option<PathBuf>,

    /// Rebuild every index before serving
    #[arg(long)]
    rebuild: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    info!("Starting siteindex RPC Server");

    let config = match &args.config {
        Some(path) => SiteIndexConfig::from_path(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => SiteIndexConfig::default(),
    };

    let site = SiteIndex::open(&args.db, config)
        .with_context(|| format!("opening index database {}", args.db.display()))?;
    info!("Index database: {}", args.db.display());

    if args.rebuild {
        match &args.documents {
            Some(path) => {
                let source = MemoryDocumentSource::from_path(path)?;
                let report = site.rebuild_all(&source);
                info!(
                    "Initial rebuild: {} indexes rebuilt, {} failed",
                    report.reports.len(),
                    report.failures.len()
                );
            }
            None => warn!("--rebuild given without --documents; skipping initial rebuild"),
        }
    }

    // Start the server
    let addr = server::start_server(site, args.documents, &args.host, args.port).await?;

    // Print port for the parent process to read (intentional stdout)
    println!("RPC_PORT={}", addr.port());

    info!("RPC server running on {}", addr);

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, exiting");

    Ok(())
}
