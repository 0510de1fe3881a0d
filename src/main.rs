//! kavka - a lightweight broker speaking the Kafka wire protocol.

use clap::Parser;
use kavka_server::{ApiVersionsHandler, Config, MessageHandler, Server, ServerConfig};
use std::net::IpAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "kavka", version, about = "A lightweight Kafka-protocol broker")]
struct Args {
    /// Address to listen on.
    #[arg(long)]
    address: Option<IpAddr>,

    /// Port to listen on.
    #[arg(long)]
    port: Option<u16>,

    /// Enable verbose logging.
    #[arg(long, short)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    // Load configuration (from file if KAVKA_CONFIG is set, then env
    // overrides), then apply command-line flags on top.
    let mut config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Failed to load config: {}", e);
            return Err(e.into());
        }
    };
    if let Some(address) = args.address {
        config.network.bind_addr.set_ip(address);
    }
    if let Some(port) = args.port {
        config.network.bind_addr.set_port(port);
    }

    tracing::info!("Starting kavka");
    tracing::info!("  Bind address: {}", config.network.bind_addr);
    tracing::info!("  Max frame size: {} bytes", config.limits.max_frame_size);

    let handlers: Vec<Arc<dyn MessageHandler>> = vec![Arc::new(ApiVersionsHandler::new())];
    let mut server = Server::new(ServerConfig::from(&config), handlers);
    server.start().await?;

    tokio::signal::ctrl_c().await.ok();
    tracing::info!("Received shutdown signal, stopping server...");
    server.shutdown_all();
    server.join().await;

    tracing::info!("Server stopped");
    Ok(())
}
