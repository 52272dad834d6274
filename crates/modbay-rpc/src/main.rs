//! Modbay RPC Server - JSON-RPC backend for the desktop shell.
//!
//! Wraps `modbay-core` so the UI can analyze a legacy installation, run a
//! migration with progress polling and edit mod categories.

mod handlers;
mod server;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "modbay-rpc")]
#[command(about = "JSON-RPC server for Modbay")]
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

    /// Data root directory (defaults to the platform data dir)
    #[arg(long)]
    data_root: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    info!("Starting Modbay RPC Server");

    let data_root = match args.data_root {
        Some(path) => path,
        None => dirs::data_dir()
            .map(|dir| dir.join("modbay"))
            .context("no platform data directory, pass --data-root")?,
    };
    std::fs::create_dir_all(&data_root)
        .with_context(|| format!("creating data root {}", data_root.display()))?;

    let api = modbay_core::ModbayApi::new(&data_root)?;

    let addr = server::start_server(api, &args.host, args.port).await?;

    // Read by the desktop shell to find the server.
    println!("RPC_PORT={}", addr.port());

    info!("RPC server running on {}", addr);

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, exiting");

    Ok(())
}
