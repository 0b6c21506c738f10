// ABOUTME: Core database management with startup migrations for SQLite
// ABOUTME: Owns the connection pool and schema; per-entity queries live in submodules
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! Database access layer.
//!
//! One [`Database`] value wraps the connection pool and is cloned freely.
//! Schema setup runs at construction time with idempotent DDL. Foreign keys
//! cascade from `activities` to streams, metrics, and check-ins so user and
//! activity deletion stay consistent.

pub mod activities;
pub mod checkins;
pub mod metrics;
pub mod streams;
pub mod users;

use std::str::FromStr;

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};

/// Database handle with connection pool
#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Create a new database connection and run migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid, the connection fails, or any
    /// migration statement fails.
    pub async fn new(database_url: &str) -> Result<Self> {
        // Create the file on first start; foreign keys must be enabled on
        // every pooled connection, not just the first
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.migrate().await?;

        Ok(db)
    }

    /// Get a reference to the database pool for advanced operations
    #[must_use]
    pub const fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Liveness probe used by the health endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error when the database is unreachable.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Run all database migrations
    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT UNIQUE,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS strava_accounts (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                strava_athlete_id INTEGER NOT NULL UNIQUE,
                access_token TEXT NOT NULL,
                refresh_token TEXT NOT NULL,
                expires_at INTEGER NOT NULL,
                scope TEXT NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS user_profiles (
                user_id TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
                goal_type TEXT NOT NULL,
                target_date TEXT,
                experience_level TEXT NOT NULL,
                weekly_days_available INTEGER NOT NULL,
                current_weekly_km INTEGER,
                max_hr INTEGER,
                max_hr_source TEXT,
                upcoming_races TEXT NOT NULL DEFAULT '[]',
                injury_notes TEXT,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS activities (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                strava_activity_id INTEGER NOT NULL UNIQUE,
                start_date TIMESTAMP NOT NULL,
                type TEXT NOT NULL,
                name TEXT NOT NULL,
                distance_m INTEGER NOT NULL,
                moving_time_s INTEGER NOT NULL,
                elapsed_time_s INTEGER NOT NULL,
                elev_gain_m REAL NOT NULL DEFAULT 0.0,
                avg_hr REAL,
                max_hr REAL,
                avg_cadence REAL,
                average_speed_mps REAL,
                user_intent TEXT,
                raw_summary TEXT NOT NULL DEFAULT '{}',
                is_deleted INTEGER NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_activities_user_start ON activities(user_id, start_date)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS activity_streams (
                id TEXT PRIMARY KEY,
                activity_id TEXT NOT NULL REFERENCES activities(id) ON DELETE CASCADE,
                stream_type TEXT NOT NULL,
                data TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_activity_streams_activity ON activity_streams(activity_id)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS derived_metrics (
                id TEXT PRIMARY KEY,
                activity_id TEXT NOT NULL UNIQUE REFERENCES activities(id) ON DELETE CASCADE,
                activity_class TEXT NOT NULL,
                effort_score REAL NOT NULL,
                pace_variability REAL,
                hr_drift REAL,
                time_in_zones TEXT,
                stops_analysis TEXT,
                efficiency_analysis TEXT,
                interval_structure TEXT,
                workout_match TEXT,
                interval_kpis TEXT,
                flags TEXT NOT NULL DEFAULT '[]',
                risk_level TEXT NOT NULL,
                risk_score INTEGER NOT NULL,
                risk_reasons TEXT NOT NULL DEFAULT '[]',
                confidence TEXT NOT NULL,
                confidence_reasons TEXT NOT NULL DEFAULT '[]',
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS check_ins (
                id TEXT PRIMARY KEY,
                activity_id TEXT NOT NULL UNIQUE REFERENCES activities(id) ON DELETE CASCADE,
                rpe INTEGER,
                pain_score INTEGER,
                pain_location TEXT,
                sleep_quality INTEGER,
                notes TEXT,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
