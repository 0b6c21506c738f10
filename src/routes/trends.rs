// ABOUTME: Trends routes: aggregated report and the distinct-type listing
// ABOUTME: Type filters arrive comma-separated and match effective types case-insensitively
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;

use crate::errors::AppResult;
use crate::server::ServerResources;
use crate::trends::{self, TrendsResponse};

#[derive(Debug, Deserialize)]
struct TrendsQuery {
    #[serde(default = "default_range")]
    range: String,
    /// Comma-separated activity types to include
    types: Option<String>,
}

fn default_range() -> String {
    "30D".to_owned()
}

/// Trends routes implementation
pub struct TrendsRoutes;

impl TrendsRoutes {
    /// Create the trends routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/trends", get(Self::handle_trends))
            .route("/trends/types", get(Self::handle_types))
            .with_state(resources)
    }

    /// Aggregated trends for the requested range
    async fn handle_trends(
        State(resources): State<Arc<ServerResources>>,
        Query(query): Query<TrendsQuery>,
    ) -> AppResult<Json<TrendsResponse>> {
        let today = Utc::now().date_naive();
        let types: Option<Vec<String>> = query.types.map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(ToOwned::to_owned)
                .collect()
        });

        let Some(user) = resources.database.get_first_user().await? else {
            // No user yet: an empty, well-formed report
            return Ok(Json(trends::assemble_report("30D", &[], None, today)));
        };

        let report = trends::get_trends_report(
            &resources.database,
            user.id,
            &query.range,
            types.as_deref(),
            today,
        )
        .await?;
        Ok(Json(report))
    }

    /// Distinct activity types seen in storage
    async fn handle_types(
        State(resources): State<Arc<ServerResources>>,
    ) -> AppResult<Json<Vec<String>>> {
        Ok(Json(resources.database.distinct_activity_types().await?))
    }
}
