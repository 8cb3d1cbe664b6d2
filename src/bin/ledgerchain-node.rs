#![forbid(unsafe_code)]
//! Ledgerchain node: ledger, mempool, validator and the REST control panel in one process

use clap::Parser;
use colored::*;
use ledgerchain::api::run_api_server;
use ledgerchain::config::{load_config, DEFAULT_CONFIG_PATH};
use ledgerchain::node::Node;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Overrides `api.port`
    #[arg(long)]
    port: Option<u16>,
    /// Start the validator immediately
    #[arg(long)]
    autostart: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = load_config(&cli.config)?;
    if let Some(port) = cli.port {
        config.api.port = port;
    }
    if cli.autostart {
        config.validator.autostart = true;
    }

    tracing_subscriber::fmt()
        .with_max_level(config.logging.level()?)
        .with_target(false)
        .init();

    let addr: SocketAddr = format!("{}:{}", config.api.host, config.api.port).parse()?;
    let autostart = config.validator.autostart;
    let node = Arc::new(Node::new(config)?);

    println!("{}", "Ledgerchain Node".bright_cyan().bold());
    println!("  API:       {}", format!("http://{}/api", addr).bright_white());
    println!("  Genesis:   {}", node.ledger.tip().hash_str().bright_yellow());
    println!(
        "  Supply:    {}",
        node.ledger.total_supply().to_string().bright_green()
    );

    if autostart {
        node.start_validation().await;
    }

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "node.signal_failed");
        }
        tracing::info!("node.shutdown_requested");
    };

    run_api_server(node.clone(), addr, shutdown).await?;

    node.stop_validation().await;
    tracing::info!(height = node.ledger.height(), "node.stopped");

    Ok(())
}
