//! Request context service.
//!
//! Serves `/context` and `/relay` behind the correlation layer so the
//! propagation of ids, hops and sessions can be observed end to end.
//!
//! ```text
//!   client ──x-request-id──▶ correlation layer ──▶ handler ──spawn──▶ child unit
//!                                   │                 │
//!                                   │                 └──x-request-hop+1──▶ downstream
//!                                   ▼
//!                      response echoes id / hop / session
//! ```

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;

use request_context::config::{load_config, ServiceConfig};
use request_context::observability::{logging, metrics};
use request_context::HttpServer;

#[derive(Parser)]
#[command(name = "request-context")]
#[command(about = "Request context propagation service", long_about = None)]
struct Cli {
    /// TOML configuration file; defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    logging::init_logging(&config.observability.log_level);
    tracing::info!("request-context v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        prefix = ?config.context.prefix,
        header_name = ?config.context.header_name,
        downstream = ?config.downstream.url,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(config)?;
    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
