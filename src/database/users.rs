// ABOUTME: User, linked-account, and profile persistence
// ABOUTME: Account token updates use compare-and-set so concurrent refreshes never race
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use anyhow::Result;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use super::Database;
use crate::models::{StravaAccount, User, UserProfile};

fn row_to_user(row: &SqliteRow) -> Result<User> {
    Ok(User {
        id: Uuid::parse_str(row.try_get("id")?)?,
        email: row.try_get("email")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_account(row: &SqliteRow) -> Result<StravaAccount> {
    Ok(StravaAccount {
        id: Uuid::parse_str(row.try_get("id")?)?,
        user_id: Uuid::parse_str(row.try_get("user_id")?)?,
        strava_athlete_id: row.try_get("strava_athlete_id")?,
        access_token: row.try_get("access_token")?,
        refresh_token: row.try_get("refresh_token")?,
        expires_at: row.try_get("expires_at")?,
        scope: row.try_get("scope")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_profile(row: &SqliteRow) -> Result<UserProfile> {
    let upcoming_races: String = row.try_get("upcoming_races")?;
    Ok(UserProfile {
        user_id: Uuid::parse_str(row.try_get("user_id")?)?,
        goal_type: row.try_get("goal_type")?,
        target_date: row.try_get("target_date")?,
        experience_level: row.try_get("experience_level")?,
        weekly_days_available: row.try_get("weekly_days_available")?,
        current_weekly_km: row.try_get("current_weekly_km")?,
        max_hr: row.try_get("max_hr")?,
        max_hr_source: row.try_get("max_hr_source")?,
        upcoming_races: serde_json::from_str(&upcoming_races)?,
        injury_notes: row.try_get("injury_notes")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

impl Database {
    /// Insert a new user row.
    ///
    /// # Errors
    ///
    /// Returns an error on a unique-email conflict or connection failure.
    pub async fn create_user(&self, user: &User) -> Result<()> {
        sqlx::query("INSERT INTO users (id, email, created_at) VALUES ($1, $2, $3)")
            .bind(user.id.to_string())
            .bind(&user.email)
            .bind(user.created_at)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Get a user by id.
    ///
    /// # Errors
    ///
    /// Returns an error on connection failure or row decoding.
    pub async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE id = $1")
            .bind(id.to_string())
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(row_to_user).transpose()
    }

    /// Get the first user, if any (single-athlete deployments).
    ///
    /// # Errors
    ///
    /// Returns an error on connection failure or row decoding.
    pub async fn get_first_user(&self) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users ORDER BY created_at ASC LIMIT 1")
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(row_to_user).transpose()
    }

    /// Insert or update the linked account for an athlete id.
    ///
    /// On conflict the tokens, expiry, and scope are overwritten; the row id
    /// and user linkage are preserved.
    ///
    /// # Errors
    ///
    /// Returns an error on connection failure.
    pub async fn upsert_strava_account(&self, account: &StravaAccount) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO strava_accounts (
                id, user_id, strava_athlete_id, access_token, refresh_token,
                expires_at, scope, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT(strava_athlete_id) DO UPDATE SET
                access_token = excluded.access_token,
                refresh_token = excluded.refresh_token,
                expires_at = excluded.expires_at,
                scope = excluded.scope,
                updated_at = excluded.updated_at
            ",
        )
        .bind(account.id.to_string())
        .bind(account.user_id.to_string())
        .bind(account.strava_athlete_id)
        .bind(&account.access_token)
        .bind(&account.refresh_token)
        .bind(account.expires_at)
        .bind(&account.scope)
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Get a linked account by provider athlete id.
    ///
    /// # Errors
    ///
    /// Returns an error on connection failure or row decoding.
    pub async fn get_account_by_athlete_id(
        &self,
        strava_athlete_id: i64,
    ) -> Result<Option<StravaAccount>> {
        let row = sqlx::query("SELECT * FROM strava_accounts WHERE strava_athlete_id = $1")
            .bind(strava_athlete_id)
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(row_to_account).transpose()
    }

    /// Get the linked account for a user.
    ///
    /// # Errors
    ///
    /// Returns an error on connection failure or row decoding.
    pub async fn get_account_by_user_id(&self, user_id: Uuid) -> Result<Option<StravaAccount>> {
        let row = sqlx::query("SELECT * FROM strava_accounts WHERE user_id = $1")
            .bind(user_id.to_string())
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(row_to_account).transpose()
    }

    /// Get the first linked account, if any (single-athlete deployments).
    ///
    /// # Errors
    ///
    /// Returns an error on connection failure or row decoding.
    pub async fn get_first_account(&self) -> Result<Option<StravaAccount>> {
        let row = sqlx::query("SELECT * FROM strava_accounts ORDER BY created_at ASC LIMIT 1")
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(row_to_account).transpose()
    }

    /// Get a linked account by row id.
    ///
    /// # Errors
    ///
    /// Returns an error on connection failure or row decoding.
    pub async fn get_account(&self, id: Uuid) -> Result<Option<StravaAccount>> {
        let row = sqlx::query("SELECT * FROM strava_accounts WHERE id = $1")
            .bind(id.to_string())
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(row_to_account).transpose()
    }

    /// Overwrite the account's token triple, but only if the stored refresh
    /// token still matches `expected_refresh_token`.
    ///
    /// Returns `true` when this call performed the update. A `false` return
    /// means another worker refreshed first; the caller re-reads the row and
    /// uses the tokens it finds there.
    ///
    /// # Errors
    ///
    /// Returns an error on connection failure.
    pub async fn update_account_tokens(
        &self,
        account_id: Uuid,
        expected_refresh_token: &str,
        access_token: &str,
        refresh_token: &str,
        expires_at: i64,
    ) -> Result<bool> {
        let result = sqlx::query(
            r"
            UPDATE strava_accounts SET
                access_token = $3,
                refresh_token = $4,
                expires_at = $5,
                updated_at = $6
            WHERE id = $1 AND refresh_token = $2
            ",
        )
        .bind(account_id.to_string())
        .bind(expected_refresh_token)
        .bind(access_token)
        .bind(refresh_token)
        .bind(expires_at)
        .bind(Utc::now())
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Get a user's profile.
    ///
    /// # Errors
    ///
    /// Returns an error on connection failure or row decoding.
    pub async fn get_profile(&self, user_id: Uuid) -> Result<Option<UserProfile>> {
        let row = sqlx::query("SELECT * FROM user_profiles WHERE user_id = $1")
            .bind(user_id.to_string())
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(row_to_profile).transpose()
    }

    /// Insert or fully overwrite a user's profile.
    ///
    /// # Errors
    ///
    /// Returns an error on connection failure.
    pub async fn upsert_profile(&self, profile: &UserProfile) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO user_profiles (
                user_id, goal_type, target_date, experience_level,
                weekly_days_available, current_weekly_km, max_hr, max_hr_source,
                upcoming_races, injury_notes, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT(user_id) DO UPDATE SET
                goal_type = excluded.goal_type,
                target_date = excluded.target_date,
                experience_level = excluded.experience_level,
                weekly_days_available = excluded.weekly_days_available,
                current_weekly_km = excluded.current_weekly_km,
                max_hr = excluded.max_hr,
                max_hr_source = excluded.max_hr_source,
                upcoming_races = excluded.upcoming_races,
                injury_notes = excluded.injury_notes,
                updated_at = excluded.updated_at
            ",
        )
        .bind(profile.user_id.to_string())
        .bind(&profile.goal_type)
        .bind(profile.target_date)
        .bind(&profile.experience_level)
        .bind(profile.weekly_days_available)
        .bind(profile.current_weekly_km)
        .bind(profile.max_hr)
        .bind(&profile.max_hr_source)
        .bind(serde_json::to_string(&profile.upcoming_races)?)
        .bind(&profile.injury_notes)
        .bind(profile.created_at)
        .bind(Utc::now())
        .execute(self.pool())
        .await?;
        Ok(())
    }
}
