// ABOUTME: Activity stream persistence with wholesale replace semantics
// ABOUTME: Streams are deleted and reinserted on refetch, never partially mutated
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use anyhow::Result;
use uuid::Uuid;

use super::Database;
use crate::models::StreamSet;
use sqlx::Row;

impl Database {
    /// Replace every stream channel of an activity (delete-then-insert in
    /// one transaction). Array order and element types are preserved through
    /// the JSON column.
    ///
    /// # Errors
    ///
    /// Returns an error on connection failure or serialization.
    pub async fn replace_streams(&self, activity_id: Uuid, streams: &StreamSet) -> Result<()> {
        let mut tx = self.pool().begin().await?;

        sqlx::query("DELETE FROM activity_streams WHERE activity_id = $1")
            .bind(activity_id.to_string())
            .execute(&mut *tx)
            .await?;

        for (channel, data) in streams.iter() {
            sqlx::query(
                "INSERT INTO activity_streams (id, activity_id, stream_type, data) VALUES ($1, $2, $3, $4)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(activity_id.to_string())
            .bind(channel)
            .bind(serde_json::to_string(data)?)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Load every stream channel of an activity into a [`StreamSet`].
    ///
    /// # Errors
    ///
    /// Returns an error on connection failure or deserialization.
    pub async fn get_streams(&self, activity_id: Uuid) -> Result<StreamSet> {
        let rows =
            sqlx::query("SELECT stream_type, data FROM activity_streams WHERE activity_id = $1")
                .bind(activity_id.to_string())
                .fetch_all(self.pool())
                .await?;

        let mut streams = StreamSet::new();
        for row in rows {
            let channel: String = row.try_get("stream_type")?;
            let data: String = row.try_get("data")?;
            streams.insert(channel, serde_json::from_str(&data)?);
        }
        Ok(streams)
    }
}
