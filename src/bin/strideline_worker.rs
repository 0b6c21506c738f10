// ABOUTME: Queue worker binary: pops sync jobs and runs fetch + analysis
// ABOUTME: Horizontally scalable; run as many replicas as the rate limit affords
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! The strideline queue worker.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use strideline::config::ServerConfig;
use strideline::constants::jobs::SYNC_QUEUE;
use strideline::database::Database;
use strideline::jobs::{worker, JobQueue};
use strideline::logging;
use strideline::providers::{StravaClient, StravaConfig};

#[derive(Parser)]
#[command(name = "strideline-worker", about = "Strideline background sync worker")]
struct Args {
    /// Queue to consume
    #[arg(long, default_value = SYNC_QUEUE)]
    queue: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = ServerConfig::from_env()?;
    logging::init(config.environment);

    let database = Database::new(&config.database_url).await?;
    let strava = Arc::new(StravaClient::new(StravaConfig::from_credentials(
        &config.strava,
    )));
    let queue = JobQueue::connect(&config.redis_url, &args.queue).await?;

    tokio::select! {
        () = worker::run(database, strava, queue) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }
    Ok(())
}
