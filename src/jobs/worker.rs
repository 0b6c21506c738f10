// ABOUTME: Worker loop: block-pop sync jobs, execute with a wall-clock bound, log outcomes
// ABOUTME: Rate-limit failures are logged distinctly; retry policy belongs to the broker
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! The queue worker.
//!
//! Workers are interchangeable: each loop iteration pops one job, resolves
//! the linked account, and runs the single-activity sync under a timeout.
//! Events for unknown athletes are dropped with a log line, never retried.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{error, info, warn};

use crate::constants::jobs::{DEQUEUE_TIMEOUT_SECS, JOB_TIMEOUT_SECS};
use crate::database::Database;
use crate::ingest::sync;
use crate::jobs::{JobQueue, SyncJob};
use crate::providers::{ProviderError, StravaClient};

/// Run the worker loop until the process is stopped.
///
/// Broker errors back off briefly instead of crashing the worker; job
/// errors are logged and the job is considered consumed (at-least-once
/// delivery means a crashed worker loses at most the job it was holding).
pub async fn run(db: Database, strava: Arc<StravaClient>, queue: JobQueue) {
    info!("worker started");
    loop {
        match queue.dequeue(DEQUEUE_TIMEOUT_SECS).await {
            Ok(Some(job)) => execute(&db, &strava, &job).await,
            Ok(None) => {}
            Err(e) => {
                error!("broker error, backing off: {e}");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

async fn execute(db: &Database, strava: &Arc<StravaClient>, job: &SyncJob) {
    info!("running job {}", job.job_id);
    let outcome = tokio::time::timeout(
        Duration::from_secs(JOB_TIMEOUT_SECS),
        run_sync_job(db, strava, job),
    )
    .await;

    match outcome {
        Ok(Ok(())) => info!("job {} complete", job.job_id),
        Ok(Err(e)) => {
            if e.downcast_ref::<ProviderError>()
                .is_some_and(ProviderError::is_rate_limited)
            {
                warn!("job {} failed: provider rate limited", job.job_id);
            } else {
                error!("job {} failed: {e:#}", job.job_id);
            }
        }
        Err(_) => error!("job {} timed out after {JOB_TIMEOUT_SECS}s", job.job_id),
    }
}

/// Execute one sync job: resolve the account, then fetch + store + process.
///
/// # Errors
///
/// Returns an error when any provider or database step fails.
async fn run_sync_job(db: &Database, strava: &StravaClient, job: &SyncJob) -> Result<()> {
    let Some(account) = db.get_account_by_athlete_id(job.strava_athlete_id).await? else {
        warn!(
            "skipping job {}: unknown athlete {}",
            job.job_id, job.strava_athlete_id
        );
        return Ok(());
    };

    sync::sync_activity_by_id(db, strava, &account, job.strava_activity_id).await
}
