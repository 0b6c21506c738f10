// ABOUTME: Profile routes: read with default auto-creation, partial update
// ABOUTME: Single-athlete deployments resolve the first user implicitly
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::errors::AppResult;
use crate::models::{User, UserProfile};
use crate::server::ServerResources;

/// Partial profile update; absent fields stay unchanged
#[derive(Debug, Deserialize)]
pub struct UserProfileUpdate {
    /// Training goal
    pub goal_type: Option<String>,
    /// Goal target date
    pub target_date: Option<NaiveDate>,
    /// Experience level
    pub experience_level: Option<String>,
    /// Days per week available
    pub weekly_days_available: Option<i64>,
    /// Current weekly km
    pub current_weekly_km: Option<i64>,
    /// Explicit max HR
    pub max_hr: Option<i64>,
    /// Provenance of `max_hr`
    pub max_hr_source: Option<String>,
    /// Upcoming races
    pub upcoming_races: Option<Value>,
    /// Injury notes
    pub injury_notes: Option<String>,
}

/// Profile routes implementation
pub struct ProfileRoutes;

impl ProfileRoutes {
    /// Create the profile read/update routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(
                "/profile",
                get(Self::handle_read).put(Self::handle_update),
            )
            .with_state(resources)
    }

    /// Read the profile, creating user and defaults on first access
    async fn handle_read(
        State(resources): State<Arc<ServerResources>>,
    ) -> AppResult<Json<UserProfile>> {
        let profile = get_or_create_profile(&resources).await?;
        Ok(Json(profile))
    }

    /// Apply a partial update and re-persist
    async fn handle_update(
        State(resources): State<Arc<ServerResources>>,
        Json(update): Json<UserProfileUpdate>,
    ) -> AppResult<Json<UserProfile>> {
        let mut profile = get_or_create_profile(&resources).await?;

        if let Some(goal_type) = update.goal_type {
            profile.goal_type = goal_type;
        }
        if update.target_date.is_some() {
            profile.target_date = update.target_date;
        }
        if let Some(experience_level) = update.experience_level {
            profile.experience_level = experience_level;
        }
        if let Some(days) = update.weekly_days_available {
            profile.weekly_days_available = days;
        }
        if update.current_weekly_km.is_some() {
            profile.current_weekly_km = update.current_weekly_km;
        }
        if update.max_hr.is_some() {
            profile.max_hr = update.max_hr;
        }
        if update.max_hr_source.is_some() {
            profile.max_hr_source = update.max_hr_source;
        }
        if let Some(races) = update.upcoming_races {
            profile.upcoming_races = races;
        }
        if update.injury_notes.is_some() {
            profile.injury_notes = update.injury_notes;
        }
        profile.updated_at = Utc::now();

        resources.database.upsert_profile(&profile).await?;
        Ok(Json(profile))
    }
}

/// Resolve the first user's profile, creating both when absent
async fn get_or_create_profile(resources: &Arc<ServerResources>) -> AppResult<UserProfile> {
    let db = &resources.database;

    let user = match db.get_first_user().await? {
        Some(user) => user,
        None => {
            let user = User::new(Some("local@runner.com".to_owned()));
            db.create_user(&user).await?;
            user
        }
    };

    match db.get_profile(user.id).await? {
        Some(profile) => Ok(profile),
        None => {
            let profile = UserProfile::default_for(user.id);
            db.upsert_profile(&profile).await?;
            Ok(profile)
        }
    }
}
