// ABOUTME: Sync orchestration: 30-day manual sync and single-activity webhook sync
// ABOUTME: Per-activity failures fold into the response; only global failures short-circuit
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! Sync orchestration.
//!
//! Manual sync fetches a page of recent summaries and handles each activity
//! independently: upsert, stream replace, and first-time processing. Every
//! per-activity failure becomes an entry in `SyncResponse.errors` and the
//! batch continues; a failure before the loop (token, listing) sets the
//! first error and returns.

use anyhow::Result;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::constants::sync::{ACTIVITIES_PER_PAGE, LOOKBACK_DAYS, STREAM_CHANNELS};
use crate::database::Database;
use crate::ingest::{token, upsert};
use crate::models::{Activity, StravaAccount};
use crate::processing::engine;
use crate::providers::StravaClient;

/// Outcome accounting for a manual sync
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncResponse {
    /// Summaries returned by the provider
    pub fetched: usize,
    /// Activities inserted or overwritten
    pub upserted: usize,
    /// Activities that already had a derived metric
    pub skipped: usize,
    /// Activities processed for the first time
    pub analyzed: usize,
    /// Per-activity (or global) error strings
    pub errors: Vec<String>,
}

/// Fetch streams from the provider and replace the stored set.
///
/// Returns `false` when the provider had no streams for the activity.
///
/// # Errors
///
/// Returns an error when the token refresh, fetch, or store fails.
pub async fn fetch_and_store_streams(
    db: &Database,
    strava: &StravaClient,
    account: &StravaAccount,
    activity: &Activity,
) -> Result<bool> {
    let access_token = token::ensure_valid_token(db, strava, account).await?;
    let streams = strava
        .fetch_streams(&access_token, activity.strava_activity_id, &STREAM_CHANNELS)
        .await?;

    if streams.is_empty() {
        return Ok(false);
    }
    db.replace_streams(activity.id, &streams).await?;
    Ok(true)
}

/// Sync the last 30 days of activities for a linked account.
///
/// Never returns an error: failures are reported through the response so
/// partial progress stays durable and visible.
pub async fn sync_recent_activities(
    db: &Database,
    strava: &StravaClient,
    account: &StravaAccount,
) -> SyncResponse {
    let mut stats = SyncResponse::default();

    let summaries = match list_recent_summaries(db, strava, account).await {
        Ok(summaries) => summaries,
        Err(e) => {
            let msg = format!("Sync failed globally: {e}");
            error!("{msg}");
            stats.errors.push(msg);
            return stats;
        }
    };
    stats.fetched = summaries.len();

    for raw in summaries {
        let activity_id = raw.get("id").and_then(serde_json::Value::as_i64);
        match sync_one(db, strava, account, &raw).await {
            Ok(analyzed) => {
                stats.upserted += 1;
                if analyzed {
                    stats.analyzed += 1;
                } else {
                    stats.skipped += 1;
                }
            }
            Err(e) => {
                let msg = format!(
                    "Error processing activity {}: {e}",
                    activity_id.map_or_else(|| "<unknown>".to_owned(), |id| id.to_string())
                );
                error!("{msg}");
                stats.errors.push(msg);
            }
        }
    }

    info!(
        "sync complete: fetched={} upserted={} analyzed={} skipped={} errors={}",
        stats.fetched,
        stats.upserted,
        stats.analyzed,
        stats.skipped,
        stats.errors.len()
    );
    stats
}

async fn list_recent_summaries(
    db: &Database,
    strava: &StravaClient,
    account: &StravaAccount,
) -> Result<Vec<serde_json::Value>> {
    let access_token = token::ensure_valid_token(db, strava, account).await?;
    let after = (Utc::now() - Duration::days(LOOKBACK_DAYS)).timestamp();
    Ok(strava
        .fetch_activities_since(&access_token, after, ACTIVITIES_PER_PAGE)
        .await?)
}

/// Handle one summary: upsert, streams, first-time processing.
/// Returns whether the activity was analyzed (vs. skipped as already done).
async fn sync_one(
    db: &Database,
    strava: &StravaClient,
    account: &StravaAccount,
    raw: &serde_json::Value,
) -> Result<bool> {
    let parsed = upsert::parse_summary(raw, account.user_id)?;
    let activity = db.upsert_activity(&parsed).await?;

    fetch_and_store_streams(db, strava, account, &activity).await?;

    // Skip analysis when a derived metric already exists so a routine sync
    // never recomputes the whole window
    if db.get_metric_by_activity(activity.id).await?.is_some() {
        return Ok(false);
    }
    engine::process_activity(db, activity.id).await?;
    Ok(true)
}

/// Explicitly refetch streams and re-run processing for one activity.
///
/// Used by the deep re-process endpoint. Stream refetch is best-effort:
/// without a linked account the stored streams are reused.
///
/// # Errors
///
/// Returns an error when a load, fetch, or the processing itself fails.
pub async fn process_deep(
    db: &Database,
    strava: &StravaClient,
    activity_id: uuid::Uuid,
) -> Result<Option<crate::models::DerivedMetric>> {
    let Some(activity) = db.get_activity(activity_id).await? else {
        return Ok(None);
    };

    if let Some(account) = db.get_account_by_user_id(activity.user_id).await? {
        fetch_and_store_streams(db, strava, &account, &activity).await?;
    }

    engine::process_activity(db, activity_id).await
}

/// Sync one activity by provider id (the webhook worker path): fetch the
/// detail document, upsert, replace streams, re-process.
///
/// # Errors
///
/// Returns an error when any fetch or store step fails; the queue decides
/// whether to retry.
pub async fn sync_activity_by_id(
    db: &Database,
    strava: &StravaClient,
    account: &StravaAccount,
    strava_activity_id: i64,
) -> Result<()> {
    let access_token = token::ensure_valid_token(db, strava, account).await?;
    let raw = strava
        .fetch_activity(&access_token, strava_activity_id)
        .await?;

    let parsed = upsert::parse_summary(&raw, account.user_id)?;
    let activity = db.upsert_activity(&parsed).await?;

    fetch_and_store_streams(db, strava, account, &activity).await?;
    engine::process_activity(db, activity.id).await?;

    info!("synced activity {strava_activity_id}");
    Ok(())
}
