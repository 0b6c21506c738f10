// ABOUTME: Activity routes: sync, listing, detail with splits, intent, check-in, deep re-process
// ABOUTME: Intent and check-in mutations re-run processing so metrics reflect the change
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::ingest::sync;
use crate::models::{Activity, CheckIn, DerivedMetric, StreamSet};
use crate::processing::splits::{self, Split};
use crate::processing::{classifier, engine};
use crate::server::ServerResources;
use crate::units::cadence;

#[derive(Debug, Deserialize)]
struct SyncQuery {
    strava_athlete_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct PageQuery {
    #[serde(default)]
    skip: i64,
    #[serde(default = "default_limit")]
    limit: i64,
}

const fn default_limit() -> i64 {
    20
}

/// Request body for the intent override
#[derive(Debug, Deserialize)]
pub struct ActivityIntentUpdate {
    /// New manual class, or null to clear the override
    pub user_intent: Option<String>,
}

/// Request body for a check-in upsert
#[derive(Debug, Deserialize)]
pub struct CheckInCreate {
    /// Rate of perceived exertion, 0-10
    pub rpe: Option<i64>,
    /// Pain score, 0-10
    pub pain_score: Option<i64>,
    /// Free-text pain location
    pub pain_location: Option<String>,
    /// Sleep quality, 0-10
    pub sleep_quality: Option<i64>,
    /// Free-text notes
    pub notes: Option<String>,
}

/// One stored stream channel on the detail read
#[derive(Debug, Serialize)]
pub struct StreamRead {
    /// Channel name
    pub stream_type: String,
    /// Sample array (cadence normalized for presentation)
    pub data: Value,
}

/// Activity detail including metrics, check-in, streams, and splits
#[derive(Debug, Serialize)]
pub struct ActivityDetailRead {
    /// The activity row
    #[serde(flatten)]
    pub activity: Activity,
    /// Derived metrics, when processed
    pub metrics: Option<DerivedMetric>,
    /// Check-in, when present
    pub check_in: Option<CheckIn>,
    /// Stored stream channels
    pub streams: Vec<StreamRead>,
    /// Per-kilometre splits computed on read
    pub splits: Vec<Split>,
}

/// Activity routes implementation
pub struct ActivityRoutes;

impl ActivityRoutes {
    /// Create all activity routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/sync", post(Self::handle_sync))
            .route("/activities", get(Self::handle_list))
            .route("/activities/:id", get(Self::handle_detail))
            .route("/activities/:id/intent", put(Self::handle_intent))
            .route("/activities/:id/checkin", post(Self::handle_checkin))
            .route(
                "/activities/:id/process_deep",
                post(Self::handle_process_deep),
            )
            .with_state(resources)
    }

    /// Trigger a manual 30-day sync for a linked account
    async fn handle_sync(
        State(resources): State<Arc<ServerResources>>,
        Query(query): Query<SyncQuery>,
    ) -> AppResult<Json<sync::SyncResponse>> {
        let db = &resources.database;
        let account = match query.strava_athlete_id {
            Some(athlete_id) => db.get_account_by_athlete_id(athlete_id).await?,
            None => db.get_first_account().await?,
        };
        let Some(account) = account else {
            return Err(AppError::not_found(
                "Linked Strava account (connect Strava first)",
            ));
        };

        let response = sync::sync_recent_activities(db, &resources.strava, &account).await;
        Ok(Json(response))
    }

    /// Paged activity listing, newest first
    async fn handle_list(
        State(resources): State<Arc<ServerResources>>,
        Query(page): Query<PageQuery>,
    ) -> AppResult<Json<Vec<Activity>>> {
        let activities = resources
            .database
            .list_activities(page.skip.max(0), page.limit.clamp(1, 200))
            .await?;
        Ok(Json(activities))
    }

    /// Activity detail with streams and computed splits
    async fn handle_detail(
        State(resources): State<Arc<ServerResources>>,
        Path(id): Path<Uuid>,
    ) -> AppResult<Json<ActivityDetailRead>> {
        let db = &resources.database;
        let activity = db
            .get_activity(id)
            .await?
            .ok_or_else(|| AppError::not_found("Activity"))?;

        let mut metrics = db.get_metric_by_activity(id).await?;

        // Lazy data repair: a stale "Easy Run" label on what is clearly an
        // indoor ride or walk is corrected on read. Gated by configuration.
        if resources.config.lazy_class_repair {
            if let Some(metric) = &mut metrics {
                if metric.activity_class == "Easy Run" {
                    let recomputed = classifier::classify(&activity, &[]);
                    if recomputed != "Easy Run" {
                        db.update_metric_class(id, &recomputed).await?;
                        metric.activity_class = recomputed;
                    }
                }
            }
        }

        let check_in = db.get_check_in(id).await?;
        let streams = db.get_streams(id).await?;
        let computed_splits = splits::calculate(&streams);

        Ok(Json(ActivityDetailRead {
            activity,
            metrics,
            check_in,
            streams: present_streams(&streams),
            splits: computed_splits,
        }))
    }

    /// Set the manual intent override and re-process
    async fn handle_intent(
        State(resources): State<Arc<ServerResources>>,
        Path(id): Path<Uuid>,
        Json(payload): Json<ActivityIntentUpdate>,
    ) -> AppResult<Json<Activity>> {
        let db = &resources.database;
        if !db.set_user_intent(id, payload.user_intent.as_deref()).await? {
            return Err(AppError::not_found("Activity"));
        }

        // Re-run the pipeline so class, flags, and risk reflect the intent
        engine::process_activity(db, id).await?;

        let activity = db
            .get_activity(id)
            .await?
            .ok_or_else(|| AppError::not_found("Activity"))?;
        Ok(Json(activity))
    }

    /// Upsert the check-in and re-process
    async fn handle_checkin(
        State(resources): State<Arc<ServerResources>>,
        Path(id): Path<Uuid>,
        Json(payload): Json<CheckInCreate>,
    ) -> AppResult<Json<CheckIn>> {
        let db = &resources.database;
        if db.get_activity(id).await?.is_none() {
            return Err(AppError::not_found("Activity"));
        }

        let check_in = db
            .upsert_check_in(&CheckIn {
                id: Uuid::new_v4(),
                activity_id: id,
                rpe: payload.rpe,
                pain_score: payload.pain_score,
                pain_location: payload.pain_location,
                sleep_quality: payload.sleep_quality,
                notes: payload.notes,
                created_at: Utc::now(),
            })
            .await?;

        engine::process_activity(db, id).await?;
        Ok(Json(check_in))
    }

    /// Refetch streams and re-run processing
    async fn handle_process_deep(
        State(resources): State<Arc<ServerResources>>,
        Path(id): Path<Uuid>,
    ) -> AppResult<Json<DerivedMetric>> {
        let metric = sync::process_deep(&resources.database, &resources.strava, id)
            .await
            .map_err(|e| {
                AppError::invalid_input(format!("Processing failed: {e}"))
            })?
            .ok_or_else(|| {
                AppError::invalid_input("Processing failed or activity not found")
            })?;
        Ok(Json(metric))
    }
}

/// Shape streams for the response, normalizing cadence for presentation.
/// Stored data is never mutated.
fn present_streams(streams: &StreamSet) -> Vec<StreamRead> {
    let mut result: Vec<StreamRead> = streams
        .iter()
        .map(|(channel, data)| {
            let data = if channel == "cadence" {
                normalize_cadence_value(data)
            } else {
                data.clone()
            };
            StreamRead {
                stream_type: channel.clone(),
                data,
            }
        })
        .collect();
    result.sort_by(|a, b| a.stream_type.cmp(&b.stream_type));
    result
}

fn normalize_cadence_value(data: &Value) -> Value {
    let Some(samples) = data.as_array() else {
        return data.clone();
    };
    let numbers: Vec<f64> = samples.iter().filter_map(Value::as_f64).collect();
    let normalized = cadence::normalize_stream(&numbers);
    if normalized.len() == samples.len() {
        Value::Array(normalized.into_iter().map(Value::from).collect())
    } else {
        data.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cadence_presentation_doubles_stride_streams() {
        let doubled = normalize_cadence_value(&json!([80.0, 84.0]));
        assert_eq!(doubled, json!([160.0, 168.0]));

        let kept = normalize_cadence_value(&json!([168.0, 172.0]));
        assert_eq!(kept, json!([168.0, 172.0]));
    }

    #[test]
    fn mixed_type_cadence_streams_pass_through() {
        let mixed = json!([80.0, null, 84.0]);
        assert_eq!(normalize_cadence_value(&mixed), mixed);
    }
}
