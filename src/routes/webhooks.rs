// ABOUTME: Webhook routes: subscription verification handshake and event intake
// ABOUTME: Heavy work is always enqueued; the endpoint answers inside the provider's retry budget
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info};

use crate::constants::jobs::RESULT_TTL_SECS;
use crate::errors::{AppError, AppResult};
use crate::jobs::SyncJob;
use crate::server::ServerResources;

#[derive(Debug, Deserialize)]
struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    mode: String,
    #[serde(rename = "hub.verify_token")]
    verify_token: String,
    #[serde(rename = "hub.challenge")]
    challenge: String,
}

#[derive(Debug, Serialize)]
struct VerifyResponse {
    #[serde(rename = "hub.challenge")]
    challenge: String,
}

/// Incoming provider event
#[derive(Debug, Deserialize)]
pub struct StravaEvent {
    /// `activity` or `athlete`
    pub object_type: String,
    /// Activity or athlete id
    pub object_id: i64,
    /// `create`, `update`, or `delete`
    pub aspect_type: String,
    /// Owning athlete id
    pub owner_id: i64,
    /// Subscription that delivered the event
    pub subscription_id: i64,
    /// Field-level changes, e.g. title edits
    #[serde(default)]
    pub updates: Value,
    /// Provider event timestamp, unix seconds
    pub event_time: i64,
}

/// Webhook routes implementation
pub struct WebhookRoutes;

impl WebhookRoutes {
    /// Create the verification and intake routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(
                "/webhooks/strava",
                get(Self::handle_verify).post(Self::handle_event),
            )
            .with_state(resources)
    }

    /// Subscription handshake: echo the challenge for a matching token
    async fn handle_verify(
        State(resources): State<Arc<ServerResources>>,
        Query(query): Query<VerifyQuery>,
    ) -> AppResult<Json<VerifyResponse>> {
        if query.mode == "subscribe"
            && query.verify_token == resources.config.strava.webhook_verify_token
        {
            return Ok(Json(VerifyResponse {
                challenge: query.challenge,
            }));
        }
        Err(AppError::permission_denied("Invalid verification token"))
    }

    /// Event intake. Always answers 2xx; failures never reach the provider.
    async fn handle_event(
        State(resources): State<Arc<ServerResources>>,
        Json(event): Json<StravaEvent>,
    ) -> Json<Value> {
        if event.object_type != "activity" {
            return Json(json!({ "status": "ignored", "reason": "not_activity" }));
        }

        match event.aspect_type.as_str() {
            "delete" => {
                match resources
                    .database
                    .soft_delete_by_strava_id(event.object_id)
                    .await
                {
                    Ok(found) => {
                        info!("webhook delete for activity {} (found={found})", event.object_id);
                        Json(json!({ "status": "processed", "action": "deleted" }))
                    }
                    Err(e) => {
                        error!("webhook delete failed: {e}");
                        Json(json!({ "status": "error", "action": "delete_failed" }))
                    }
                }
            }
            "create" | "update" => {
                let job = SyncJob::new(event.owner_id, event.object_id, event.event_time);
                match resources.queue.enqueue(&job, RESULT_TTL_SECS).await {
                    Ok(_) => Json(json!({ "status": "processed", "action": "enqueued" })),
                    Err(e) => {
                        error!("webhook enqueue failed: {e}");
                        Json(json!({ "status": "error", "action": "enqueue_failed" }))
                    }
                }
            }
            _ => Json(json!({ "status": "ignored", "reason": "unknown_aspect" })),
        }
    }
}
