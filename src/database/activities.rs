// ABOUTME: Activity persistence: idempotent upsert, window queries, soft delete
// ABOUTME: History windows power the classifier, flags, trends, and training context
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use super::Database;
use crate::models::Activity;

pub(crate) fn row_to_activity(row: &SqliteRow) -> Result<Activity> {
    let raw_summary: String = row.try_get("raw_summary")?;
    Ok(Activity {
        id: Uuid::parse_str(row.try_get("id")?)?,
        user_id: Uuid::parse_str(row.try_get("user_id")?)?,
        strava_activity_id: row.try_get("strava_activity_id")?,
        start_date: row.try_get("start_date")?,
        activity_type: row.try_get("type")?,
        name: row.try_get("name")?,
        distance_m: row.try_get("distance_m")?,
        moving_time_s: row.try_get("moving_time_s")?,
        elapsed_time_s: row.try_get("elapsed_time_s")?,
        elev_gain_m: row.try_get("elev_gain_m")?,
        avg_hr: row.try_get("avg_hr")?,
        max_hr: row.try_get("max_hr")?,
        avg_cadence: row.try_get("avg_cadence")?,
        average_speed_mps: row.try_get("average_speed_mps")?,
        user_intent: row.try_get("user_intent")?,
        raw_summary: serde_json::from_str(&raw_summary)?,
        is_deleted: row.try_get("is_deleted")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

impl Database {
    /// Insert or overwrite the activity keyed on its provider id.
    ///
    /// Canonical fields and the raw payload are replaced; the row id,
    /// `user_intent`, and `is_deleted` survive re-syncs. Returns the stored
    /// row (with the preserved id when one already existed).
    ///
    /// # Errors
    ///
    /// Returns an error on connection failure or row decoding.
    pub async fn upsert_activity(&self, activity: &Activity) -> Result<Activity> {
        sqlx::query(
            r"
            INSERT INTO activities (
                id, user_id, strava_activity_id, start_date, type, name,
                distance_m, moving_time_s, elapsed_time_s, elev_gain_m,
                avg_hr, max_hr, avg_cadence, average_speed_mps,
                user_intent, raw_summary, is_deleted, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
            ON CONFLICT(strava_activity_id) DO UPDATE SET
                user_id = excluded.user_id,
                start_date = excluded.start_date,
                type = excluded.type,
                name = excluded.name,
                distance_m = excluded.distance_m,
                moving_time_s = excluded.moving_time_s,
                elapsed_time_s = excluded.elapsed_time_s,
                elev_gain_m = excluded.elev_gain_m,
                avg_hr = excluded.avg_hr,
                max_hr = excluded.max_hr,
                avg_cadence = excluded.avg_cadence,
                average_speed_mps = excluded.average_speed_mps,
                raw_summary = excluded.raw_summary,
                updated_at = excluded.updated_at
            ",
        )
        .bind(activity.id.to_string())
        .bind(activity.user_id.to_string())
        .bind(activity.strava_activity_id)
        .bind(activity.start_date)
        .bind(&activity.activity_type)
        .bind(&activity.name)
        .bind(activity.distance_m)
        .bind(activity.moving_time_s)
        .bind(activity.elapsed_time_s)
        .bind(activity.elev_gain_m)
        .bind(activity.avg_hr)
        .bind(activity.max_hr)
        .bind(activity.avg_cadence)
        .bind(activity.average_speed_mps)
        .bind(&activity.user_intent)
        .bind(serde_json::to_string(&activity.raw_summary)?)
        .bind(activity.is_deleted)
        .bind(activity.created_at)
        .bind(Utc::now())
        .execute(self.pool())
        .await?;

        // Re-read to pick up the preserved id and flags of an existing row
        self.get_activity_by_strava_id(activity.strava_activity_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("activity row vanished after upsert"))
    }

    /// Get an activity by row id.
    ///
    /// # Errors
    ///
    /// Returns an error on connection failure or row decoding.
    pub async fn get_activity(&self, id: Uuid) -> Result<Option<Activity>> {
        let row = sqlx::query("SELECT * FROM activities WHERE id = $1")
            .bind(id.to_string())
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(row_to_activity).transpose()
    }

    /// Get an activity by provider id.
    ///
    /// # Errors
    ///
    /// Returns an error on connection failure or row decoding.
    pub async fn get_activity_by_strava_id(
        &self,
        strava_activity_id: i64,
    ) -> Result<Option<Activity>> {
        let row = sqlx::query("SELECT * FROM activities WHERE strava_activity_id = $1")
            .bind(strava_activity_id)
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(row_to_activity).transpose()
    }

    /// Paged listing, newest first, excluding soft-deleted rows.
    ///
    /// # Errors
    ///
    /// Returns an error on connection failure or row decoding.
    pub async fn list_activities(&self, skip: i64, limit: i64) -> Result<Vec<Activity>> {
        let rows = sqlx::query(
            "SELECT * FROM activities WHERE is_deleted = 0 ORDER BY start_date DESC LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(skip)
        .fetch_all(self.pool())
        .await?;
        rows.iter().map(row_to_activity).collect()
    }

    /// The most recent activities of a user strictly before `before`,
    /// newest first. Soft-deleted rows stay visible here: processing still
    /// sees them even though read-side queries do not.
    ///
    /// # Errors
    ///
    /// Returns an error on connection failure or row decoding.
    pub async fn history_before(
        &self,
        user_id: Uuid,
        before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Activity>> {
        let rows = sqlx::query(
            r"
            SELECT * FROM activities
            WHERE user_id = $1 AND start_date < $2
            ORDER BY start_date DESC
            LIMIT $3
            ",
        )
        .bind(user_id.to_string())
        .bind(before)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;
        rows.iter().map(row_to_activity).collect()
    }

    /// Activities of a user in `[start, end)`, oldest first, excluding
    /// soft-deleted rows. Backs trends, training context, and the rolling
    /// summaries.
    ///
    /// # Errors
    ///
    /// Returns an error on connection failure or row decoding.
    pub async fn activities_in_window(
        &self,
        user_id: Uuid,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Activity>> {
        // Null bounds leave that side of the window open
        let rows = sqlx::query(
            r"
            SELECT * FROM activities
            WHERE user_id = $1 AND is_deleted = 0
              AND ($2 IS NULL OR start_date >= $2)
              AND ($3 IS NULL OR start_date < $3)
            ORDER BY start_date ASC
            ",
        )
        .bind(user_id.to_string())
        .bind(start)
        .bind(end)
        .fetch_all(self.pool())
        .await?;
        rows.iter().map(row_to_activity).collect()
    }

    /// Soft-delete by provider id. Returns whether a row matched.
    ///
    /// # Errors
    ///
    /// Returns an error on connection failure.
    pub async fn soft_delete_by_strava_id(&self, strava_activity_id: i64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE activities SET is_deleted = 1, updated_at = $2 WHERE strava_activity_id = $1",
        )
        .bind(strava_activity_id)
        .bind(Utc::now())
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Set or clear the manual intent override. Returns whether a row matched.
    ///
    /// # Errors
    ///
    /// Returns an error on connection failure.
    pub async fn set_user_intent(&self, id: Uuid, user_intent: Option<&str>) -> Result<bool> {
        let result =
            sqlx::query("UPDATE activities SET user_intent = $2, updated_at = $3 WHERE id = $1")
                .bind(id.to_string())
                .bind(user_intent)
                .bind(Utc::now())
                .execute(self.pool())
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Distinct provider types present (excluding soft-deleted), sorted.
    ///
    /// # Errors
    ///
    /// Returns an error on connection failure.
    pub async fn distinct_activity_types(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT DISTINCT type FROM activities WHERE is_deleted = 0 ORDER BY type ASC",
        )
        .fetch_all(self.pool())
        .await?;
        rows.iter()
            .map(|row| Ok(row.try_get::<String, _>("type")?))
            .collect()
    }
}
