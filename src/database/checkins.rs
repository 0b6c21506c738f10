// ABOUTME: Check-in persistence: one optional row per activity, upserted by the owner
// ABOUTME: Upserts trigger re-processing at the route layer so metrics reflect the mutation
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use anyhow::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use super::Database;
use crate::models::CheckIn;

fn row_to_check_in(row: &SqliteRow) -> Result<CheckIn> {
    Ok(CheckIn {
        id: Uuid::parse_str(row.try_get("id")?)?,
        activity_id: Uuid::parse_str(row.try_get("activity_id")?)?,
        rpe: row.try_get("rpe")?,
        pain_score: row.try_get("pain_score")?,
        pain_location: row.try_get("pain_location")?,
        sleep_quality: row.try_get("sleep_quality")?,
        notes: row.try_get("notes")?,
        created_at: row.try_get("created_at")?,
    })
}

impl Database {
    /// Insert or overwrite the check-in of an activity. Returns the stored
    /// row.
    ///
    /// # Errors
    ///
    /// Returns an error on connection failure or row decoding.
    pub async fn upsert_check_in(&self, check_in: &CheckIn) -> Result<CheckIn> {
        sqlx::query(
            r"
            INSERT INTO check_ins (
                id, activity_id, rpe, pain_score, pain_location, sleep_quality,
                notes, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT(activity_id) DO UPDATE SET
                rpe = excluded.rpe,
                pain_score = excluded.pain_score,
                pain_location = excluded.pain_location,
                sleep_quality = excluded.sleep_quality,
                notes = excluded.notes
            ",
        )
        .bind(check_in.id.to_string())
        .bind(check_in.activity_id.to_string())
        .bind(check_in.rpe)
        .bind(check_in.pain_score)
        .bind(&check_in.pain_location)
        .bind(check_in.sleep_quality)
        .bind(&check_in.notes)
        .bind(check_in.created_at)
        .execute(self.pool())
        .await?;

        self.get_check_in(check_in.activity_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("check-in row vanished after upsert"))
    }

    /// Get the check-in of an activity, if any.
    ///
    /// # Errors
    ///
    /// Returns an error on connection failure or row decoding.
    pub async fn get_check_in(&self, activity_id: Uuid) -> Result<Option<CheckIn>> {
        let row = sqlx::query("SELECT * FROM check_ins WHERE activity_id = $1")
            .bind(activity_id.to_string())
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(row_to_check_in).transpose()
    }
}
