// ABOUTME: HTTP API binary: loads configuration, wires resources, serves /api
// ABOUTME: Heavy ingest work is enqueued; this process only answers requests
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! The strideline API server.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use strideline::config::ServerConfig;
use strideline::logging;
use strideline::server::{self, ServerResources};

#[derive(Parser)]
#[command(name = "strideline-server", about = "Strideline activity-processing API")]
struct Args {
    /// Override the HTTP port from configuration
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ServerConfig::from_env()?;
    if let Some(port) = args.port {
        config.http_port = port;
    }
    logging::init(config.environment);

    let resources = Arc::new(ServerResources::from_config(config).await?);
    server::serve(resources).await
}
