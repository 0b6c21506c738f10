// ABOUTME: Shared test utilities: temp-file database setup and fixture builders
// ABOUTME: Keeps integration tests free of setup duplication
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
#![allow(dead_code, clippy::unwrap_used, clippy::missing_panics_doc)]

//! Shared test utilities for strideline integration tests.

use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use tempfile::TempDir;
use uuid::Uuid;

use strideline::database::Database;
use strideline::models::{Activity, StravaAccount, StreamSet, User};

/// A database backed by a temp file; the directory lives as long as this
pub struct TestDb {
    /// Database handle
    pub db: Database,
    _dir: TempDir,
}

/// Create a fresh migrated database in a temp directory
pub async fn test_db() -> TestDb {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("strideline-test.db");
    let url = format!("sqlite:{}", path.display());
    let db = Database::new(&url).await.unwrap();
    TestDb { db, _dir: dir }
}

/// Create a user row and return it
pub async fn create_user(db: &Database) -> User {
    let user = User::new(None);
    db.create_user(&user).await.unwrap();
    user
}

/// Create a linked account for a user
pub async fn create_account(db: &Database, user_id: Uuid, athlete_id: i64) -> StravaAccount {
    let now = Utc::now();
    let account = StravaAccount {
        id: Uuid::new_v4(),
        user_id,
        strava_athlete_id: athlete_id,
        access_token: "access-token".to_owned(),
        refresh_token: "refresh-token".to_owned(),
        expires_at: now.timestamp() + 21_600,
        scope: "read,activity:read_all".to_owned(),
        created_at: now,
        updated_at: now,
    };
    db.upsert_strava_account(&account).await.unwrap();
    account
}

/// Builder for activity fixtures
pub struct ActivityFixture {
    /// The activity under construction
    pub activity: Activity,
}

impl ActivityFixture {
    /// A plain run for the given user
    pub fn run(user_id: Uuid, strava_activity_id: i64) -> Self {
        let now = Utc::now();
        Self {
            activity: Activity {
                id: Uuid::new_v4(),
                user_id,
                strava_activity_id,
                start_date: now - Duration::hours(2),
                activity_type: "Run".to_owned(),
                name: "Morning Run".to_owned(),
                distance_m: 5000,
                moving_time_s: 1500,
                elapsed_time_s: 1560,
                elev_gain_m: 20.0,
                avg_hr: Some(150.0),
                max_hr: Some(200.0),
                avg_cadence: None,
                average_speed_mps: Some(3.33),
                user_intent: None,
                raw_summary: json!({"id": strava_activity_id, "type": "Run"}),
                is_deleted: false,
                created_at: now,
                updated_at: now,
            },
        }
    }

    /// Override the start time
    #[must_use]
    pub fn started_at(mut self, start: DateTime<Utc>) -> Self {
        self.activity.start_date = start;
        self
    }

    /// Override name
    #[must_use]
    pub fn named(mut self, name: &str) -> Self {
        self.activity.name = name.to_owned();
        self
    }

    /// Override distance and moving time
    #[must_use]
    pub fn sized(mut self, distance_m: i64, moving_time_s: i64) -> Self {
        self.activity.distance_m = distance_m;
        self.activity.moving_time_s = moving_time_s;
        self.activity.elapsed_time_s = moving_time_s;
        self
    }

    /// Override heart-rate summary fields
    #[must_use]
    pub fn with_hr(mut self, avg: Option<f64>, max: Option<f64>) -> Self {
        self.activity.avg_hr = avg;
        self.activity.max_hr = max;
        self
    }

    /// Override elevation gain
    #[must_use]
    pub fn with_elevation(mut self, gain_m: f64) -> Self {
        self.activity.elev_gain_m = gain_m;
        self
    }

    /// Persist and return the stored row
    pub async fn insert(self, db: &Database) -> Activity {
        db.upsert_activity(&self.activity).await.unwrap()
    }
}

/// Store a stream set built from `(channel, data)` pairs
pub async fn insert_streams(db: &Database, activity_id: Uuid, channels: &[(&str, Value)]) {
    let streams: StreamSet = channels
        .iter()
        .map(|(name, data)| ((*name).to_owned(), data.clone()))
        .collect();
    db.replace_streams(activity_id, &streams).await.unwrap();
}

/// Serialize a value and drop the row-identity fields so two processing
/// runs can be compared field-by-field
pub fn comparable(value: &impl serde::Serialize) -> Value {
    let mut json = serde_json::to_value(value).unwrap();
    if let Some(map) = json.as_object_mut() {
        map.remove("id");
        map.remove("created_at");
        map.remove("updated_at");
    }
    json
}
