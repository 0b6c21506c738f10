// ABOUTME: Derived-metric persistence: one row per activity, rewritten in place
// ABOUTME: Structured analysis documents round-trip through JSON columns
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use anyhow::Result;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use super::Database;
use crate::models::{ConfidenceLevel, DerivedMetric, RiskLevel};

fn json_column<T: DeserializeOwned>(row: &SqliteRow, column: &str) -> Result<Option<T>> {
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|s| Ok(serde_json::from_str(&s)?)).transpose()
}

fn to_json<T: Serialize>(value: &Option<T>) -> Result<Option<String>> {
    value
        .as_ref()
        .map(|v| Ok(serde_json::to_string(v)?))
        .transpose()
}

fn row_to_metric(row: &SqliteRow) -> Result<DerivedMetric> {
    let flags: String = row.try_get("flags")?;
    let risk_level: String = row.try_get("risk_level")?;
    let risk_reasons: String = row.try_get("risk_reasons")?;
    let confidence: String = row.try_get("confidence")?;
    let confidence_reasons: String = row.try_get("confidence_reasons")?;

    Ok(DerivedMetric {
        id: Uuid::parse_str(row.try_get("id")?)?,
        activity_id: Uuid::parse_str(row.try_get("activity_id")?)?,
        activity_class: row.try_get("activity_class")?,
        effort_score: row.try_get("effort_score")?,
        pace_variability: row.try_get("pace_variability")?,
        hr_drift: row.try_get("hr_drift")?,
        time_in_zones: json_column(row, "time_in_zones")?,
        stops_analysis: json_column(row, "stops_analysis")?,
        efficiency_analysis: json_column(row, "efficiency_analysis")?,
        interval_structure: json_column(row, "interval_structure")?,
        workout_match: json_column(row, "workout_match")?,
        interval_kpis: json_column(row, "interval_kpis")?,
        flags: serde_json::from_str(&flags)?,
        risk_level: serde_json::from_str::<RiskLevel>(&format!("\"{risk_level}\""))?,
        risk_score: row.try_get("risk_score")?,
        risk_reasons: serde_json::from_str(&risk_reasons)?,
        confidence: serde_json::from_str::<ConfidenceLevel>(&format!("\"{confidence}\""))?,
        confidence_reasons: serde_json::from_str(&confidence_reasons)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

impl Database {
    /// Insert or fully overwrite the derived metric of an activity.
    ///
    /// Set-valued fields (`flags`, reason lists) are replaced wholesale,
    /// never diffed. Returns the stored row.
    ///
    /// # Errors
    ///
    /// Returns an error on connection failure or serialization.
    pub async fn upsert_derived_metric(&self, metric: &DerivedMetric) -> Result<DerivedMetric> {
        sqlx::query(
            r"
            INSERT INTO derived_metrics (
                id, activity_id, activity_class, effort_score, pace_variability,
                hr_drift, time_in_zones, stops_analysis, efficiency_analysis,
                interval_structure, workout_match, interval_kpis, flags,
                risk_level, risk_score, risk_reasons, confidence,
                confidence_reasons, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)
            ON CONFLICT(activity_id) DO UPDATE SET
                activity_class = excluded.activity_class,
                effort_score = excluded.effort_score,
                pace_variability = excluded.pace_variability,
                hr_drift = excluded.hr_drift,
                time_in_zones = excluded.time_in_zones,
                stops_analysis = excluded.stops_analysis,
                efficiency_analysis = excluded.efficiency_analysis,
                interval_structure = excluded.interval_structure,
                workout_match = excluded.workout_match,
                interval_kpis = excluded.interval_kpis,
                flags = excluded.flags,
                risk_level = excluded.risk_level,
                risk_score = excluded.risk_score,
                risk_reasons = excluded.risk_reasons,
                confidence = excluded.confidence,
                confidence_reasons = excluded.confidence_reasons,
                updated_at = excluded.updated_at
            ",
        )
        .bind(metric.id.to_string())
        .bind(metric.activity_id.to_string())
        .bind(&metric.activity_class)
        .bind(metric.effort_score)
        .bind(metric.pace_variability)
        .bind(metric.hr_drift)
        .bind(to_json(&metric.time_in_zones)?)
        .bind(to_json(&metric.stops_analysis)?)
        .bind(to_json(&metric.efficiency_analysis)?)
        .bind(to_json(&metric.interval_structure)?)
        .bind(to_json(&metric.workout_match)?)
        .bind(to_json(&metric.interval_kpis)?)
        .bind(serde_json::to_string(&metric.flags)?)
        .bind(metric.risk_level.as_str())
        .bind(metric.risk_score)
        .bind(serde_json::to_string(&metric.risk_reasons)?)
        .bind(metric.confidence.as_str())
        .bind(serde_json::to_string(&metric.confidence_reasons)?)
        .bind(metric.created_at)
        .bind(Utc::now())
        .execute(self.pool())
        .await?;

        self.get_metric_by_activity(metric.activity_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("derived metric row vanished after upsert"))
    }

    /// Get the derived metric of an activity, if processed.
    ///
    /// # Errors
    ///
    /// Returns an error on connection failure or row decoding.
    pub async fn get_metric_by_activity(
        &self,
        activity_id: Uuid,
    ) -> Result<Option<DerivedMetric>> {
        let row = sqlx::query("SELECT * FROM derived_metrics WHERE activity_id = $1")
            .bind(activity_id.to_string())
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(row_to_metric).transpose()
    }

    /// Derived metrics for a set of activities, loaded in one round-trip
    /// (history lookups, trends).
    ///
    /// # Errors
    ///
    /// Returns an error on connection failure or row decoding.
    pub async fn metrics_for_activities(
        &self,
        activity_ids: &[Uuid],
    ) -> Result<Vec<DerivedMetric>> {
        if activity_ids.is_empty() {
            return Ok(vec![]);
        }

        let mut builder =
            sqlx::QueryBuilder::new("SELECT * FROM derived_metrics WHERE activity_id IN (");
        let mut separated = builder.separated(", ");
        for id in activity_ids {
            separated.push_bind(id.to_string());
        }
        builder.push(")");

        let rows = builder.build().fetch_all(self.pool()).await?;
        rows.iter().map(row_to_metric).collect()
    }

    /// Overwrite just the stored class (lazy repair on detail read).
    ///
    /// # Errors
    ///
    /// Returns an error on connection failure.
    pub async fn update_metric_class(&self, activity_id: Uuid, class: &str) -> Result<()> {
        sqlx::query(
            "UPDATE derived_metrics SET activity_class = $2, updated_at = $3 WHERE activity_id = $1",
        )
        .bind(activity_id.to_string())
        .bind(class)
        .bind(Utc::now())
        .execute(self.pool())
        .await?;
        Ok(())
    }
}
