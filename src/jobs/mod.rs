// ABOUTME: Redis-backed job queue with deterministic job-id dedup
// ABOUTME: At-least-once delivery; duplicate job ids within the TTL never re-execute
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! Background job queue.
//!
//! Jobs ride a named Redis list; a `SET NX EX` dedup key per job id
//! collapses duplicate webhook deliveries to one execution within the
//! result TTL. Workers block-pop from the list and are interchangeable and
//! horizontally scalable.

pub mod worker;

use anyhow::Result;
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use tracing::info;

/// A single-activity sync job triggered by a webhook event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncJob {
    /// Deterministic job id: `sync_<activity_id>_<event_time>`
    pub job_id: String,
    /// Provider athlete id that owns the activity
    pub strava_athlete_id: i64,
    /// Provider activity id to sync
    pub strava_activity_id: i64,
    /// Provider event timestamp, unix seconds
    pub event_time: i64,
}

impl SyncJob {
    /// Build a job with its deterministic id
    #[must_use]
    pub fn new(strava_athlete_id: i64, strava_activity_id: i64, event_time: i64) -> Self {
        Self {
            job_id: format!("sync_{strava_activity_id}_{event_time}"),
            strava_athlete_id,
            strava_activity_id,
            event_time,
        }
    }
}

/// Whether an enqueue actually added work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Job accepted onto the queue
    Enqueued,
    /// Same job id seen within the TTL; nothing added
    Duplicate,
}

/// Named-queue handle over a Redis connection manager
#[derive(Clone)]
pub struct JobQueue {
    manager: ConnectionManager,
    queue_key: String,
    dedup_prefix: String,
}

impl JobQueue {
    /// Connect to the broker.
    ///
    /// # Errors
    ///
    /// Returns an error when the Redis URL is invalid or the initial
    /// connection fails.
    pub async fn connect(redis_url: &str, queue_name: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let manager = ConnectionManager::new(client).await?;
        info!("connected to job broker, queue '{queue_name}'");
        Ok(Self {
            manager,
            queue_key: format!("strideline:jobs:{queue_name}"),
            dedup_prefix: format!("strideline:jobs:{queue_name}:id:"),
        })
    }

    /// Enqueue a job unless its id was already seen within `result_ttl_secs`.
    ///
    /// # Errors
    ///
    /// Returns an error on broker failure or payload serialization.
    pub async fn enqueue(
        &self,
        job: &SyncJob,
        result_ttl_secs: u64,
    ) -> Result<EnqueueOutcome> {
        let mut conn = self.manager.clone();
        let dedup_key = format!("{}{}", self.dedup_prefix, job.job_id);

        // SET NX EX claims the id; a nil reply means a duplicate delivery
        let claimed: Option<String> = redis::cmd("SET")
            .arg(&dedup_key)
            .arg("queued")
            .arg("NX")
            .arg("EX")
            .arg(result_ttl_secs)
            .query_async(&mut conn)
            .await?;
        if claimed.is_none() {
            info!("duplicate job {} dropped", job.job_id);
            return Ok(EnqueueOutcome::Duplicate);
        }

        let payload = serde_json::to_string(job)?;
        let _: i64 = redis::cmd("LPUSH")
            .arg(&self.queue_key)
            .arg(payload)
            .query_async(&mut conn)
            .await?;
        info!("enqueued job {}", job.job_id);
        Ok(EnqueueOutcome::Enqueued)
    }

    /// Block-pop the next job, waiting up to `timeout_secs`.
    ///
    /// # Errors
    ///
    /// Returns an error on broker failure or payload deserialization.
    pub async fn dequeue(&self, timeout_secs: f64) -> Result<Option<SyncJob>> {
        let mut conn = self.manager.clone();
        let popped: Option<(String, String)> = redis::cmd("BRPOP")
            .arg(&self.queue_key)
            .arg(timeout_secs)
            .query_async(&mut conn)
            .await?;

        popped
            .map(|(_, payload)| Ok(serde_json::from_str(&payload)?))
            .transpose()
    }
}
