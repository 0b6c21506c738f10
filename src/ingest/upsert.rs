// ABOUTME: Provider payload parsing into the canonical activity record
// ABOUTME: The raw document is retained verbatim; absent fields take defaults, never errors
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! Activity upsert parsing.
//!
//! The provider summary is duck-typed: only the activity id is mandatory.
//! Everything else falls back to defaults so late-arriving or trimmed
//! payloads never abort a sync. The raw payload rides along for forensic
//! and late-field purposes.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::models::Activity;

/// Parse a raw provider summary into a canonical activity for `user_id`.
///
/// Invoking the upsert twice with the same payload produces the same row.
///
/// # Errors
///
/// Returns an error only when the payload has no numeric `id` or an
/// unparseable `start_date`.
pub fn parse_summary(raw: &Value, user_id: Uuid) -> Result<Activity> {
    let strava_activity_id = raw
        .get("id")
        .and_then(Value::as_i64)
        .context("provider payload has no activity id")?;

    let start_date: DateTime<Utc> = raw
        .get("start_date")
        .and_then(Value::as_str)
        .context("provider payload has no start_date")?
        .parse()
        .context("provider start_date is not a valid timestamp")?;

    let str_or = |key: &str, default: &str| -> String {
        raw.get(key)
            .and_then(Value::as_str)
            .unwrap_or(default)
            .to_owned()
    };
    let f64_of = |key: &str| raw.get(key).and_then(Value::as_f64);

    let now = Utc::now();
    Ok(Activity {
        id: Uuid::new_v4(),
        user_id,
        strava_activity_id,
        start_date,
        activity_type: str_or("type", "Run"),
        name: str_or("name", "Unknown Run"),
        distance_m: f64_of("distance").unwrap_or(0.0) as i64,
        moving_time_s: raw.get("moving_time").and_then(Value::as_i64).unwrap_or(0),
        elapsed_time_s: raw.get("elapsed_time").and_then(Value::as_i64).unwrap_or(0),
        elev_gain_m: f64_of("total_elevation_gain").unwrap_or(0.0),
        avg_hr: f64_of("average_heartrate"),
        max_hr: f64_of("max_heartrate"),
        avg_cadence: f64_of("average_cadence"),
        average_speed_mps: f64_of("average_speed"),
        user_intent: None,
        raw_summary: raw.clone(),
        is_deleted: false,
        created_at: now,
        updated_at: now,
    })
}
