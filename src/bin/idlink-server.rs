// ABOUTME: Server binary for the identity linking service
// ABOUTME: Loads environment configuration, initialises logging and serves HTTP
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # idlink server binary
//!
//! Starts the login, identity linking and TikTok upload service.

use anyhow::Result;
use clap::Parser;
use idlink::{config::ServerConfig, logging, server};
use tracing::{error, info};

/// Command line overrides for the environment configuration
#[derive(Parser)]
#[command(name = "idlink-server")]
#[command(about = "Identity linking server - local and social login with TikTok upload")]
pub struct Args {
    /// Override HTTP port
    #[arg(long)]
    http_port: Option<u16>,

    /// Override database URL
    #[arg(long)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    logging::init_from_env()?;

    let mut config = ServerConfig::from_env()?;
    if let Some(http_port) = args.http_port {
        config.http_port = http_port;
    }
    if let Some(database_url) = args.database_url {
        config.database_url = database_url;
    }

    info!(
        host = %config.host,
        port = config.http_port,
        environment = %config.environment,
        "Starting identity linking server"
    );

    if let Err(e) = server::run_server(config).await {
        error!("Server error: {e:#}");
        return Err(e);
    }
    Ok(())
}
