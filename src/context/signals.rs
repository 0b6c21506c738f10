// ABOUTME: Deterministic signal availability detection for the context pack
// ABOUTME: Summary fields and stream presence decide what the coaching layer may reference
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! Signal availability.
//!
//! The universe of desirable signals is fixed; whatever is not detected as
//! available is reported missing so the coaching layer never invents data.

use serde_json::Value;

use crate::models::{Activity, StreamSet};

/// Signals a running coach cares about
const DESIRABLE_SIGNALS: [&str; 7] = [
    "cadence",
    "elevation",
    "gps",
    "heart_rate",
    "power",
    "splits",
    "weather",
];

/// Determine available and missing signals for an activity.
///
/// Returns `(available, missing)`, both sorted.
#[must_use]
pub fn infer_signals(activity: &Activity, streams: &StreamSet) -> (Vec<String>, Vec<String>) {
    let mut available: Vec<&str> = Vec::new();
    let raw = &activity.raw_summary;

    if activity.avg_hr.is_some()
        || activity.max_hr.is_some()
        || streams.has_channel("heartrate")
    {
        available.push("heart_rate");
    }

    if activity.avg_cadence.is_some() || streams.has_channel("cadence") {
        available.push("cadence");
    }

    if raw.get("average_watts").and_then(Value::as_f64).is_some()
        || streams.has_channel("watts")
    {
        available.push("power");
    }

    // Elevation gain is always recorded on the canonical row; an explicit
    // zero still tells the coach the route was flat
    available.push("elevation");

    let polyline = raw
        .get("map")
        .and_then(|m| m.get("summary_polyline").or_else(|| m.get("polyline")))
        .and_then(Value::as_str)
        .is_some_and(|p| !p.is_empty());
    if polyline || streams.has_channel("latlng") {
        available.push("gps");
    }

    if streams.has_channel("distance")
        || raw.get("splits_metric").is_some()
        || raw.get("splits_standard").is_some()
    {
        available.push("splits");
    }

    // No weather collaborator is wired in; the signal stays missing

    available.sort_unstable();
    let missing: Vec<String> = DESIRABLE_SIGNALS
        .iter()
        .filter(|s| !available.contains(s))
        .map(|s| (*s).to_owned())
        .collect();
    let available = available.into_iter().map(ToOwned::to_owned).collect();
    (available, missing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn activity(raw: Value) -> Activity {
        Activity {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            strava_activity_id: 1,
            start_date: Utc::now(),
            activity_type: "Run".to_owned(),
            name: "Run".to_owned(),
            distance_m: 5000,
            moving_time_s: 1500,
            elapsed_time_s: 1500,
            elev_gain_m: 0.0,
            avg_hr: None,
            max_hr: None,
            avg_cadence: None,
            average_speed_mps: None,
            user_intent: None,
            raw_summary: raw,
            is_deleted: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn bare_summary_has_elevation_only() {
        let (available, missing) = infer_signals(&activity(json!({})), &StreamSet::new());
        assert_eq!(available, vec!["elevation"]);
        assert_eq!(
            missing,
            vec!["cadence", "gps", "heart_rate", "power", "splits", "weather"]
        );
    }

    #[test]
    fn streams_unlock_signals() {
        let mut streams = StreamSet::new();
        streams.insert("heartrate", json!([150]));
        streams.insert("latlng", json!([[48.0, 2.0]]));
        streams.insert("distance", json!([0.0, 4.0]));
        streams.insert("watts", json!([210]));
        streams.insert("cadence", json!([82]));

        let (available, missing) = infer_signals(&activity(json!({})), &streams);
        assert_eq!(
            available,
            vec!["cadence", "elevation", "gps", "heart_rate", "power", "splits"]
        );
        assert_eq!(missing, vec!["weather"]);
    }

    #[test]
    fn summary_fields_also_count() {
        let mut a = activity(json!({
            "map": {"summary_polyline": "abc123"},
            "splits_metric": [{"distance": 1000}]
        }));
        a.avg_hr = Some(150.0);
        a.avg_cadence = Some(82.0);

        let (available, _) = infer_signals(&a, &StreamSet::new());
        assert!(available.contains(&"heart_rate".to_owned()));
        assert!(available.contains(&"cadence".to_owned()));
        assert!(available.contains(&"gps".to_owned()));
        assert!(available.contains(&"splits".to_owned()));
    }

    #[test]
    fn lists_are_sorted_and_disjoint() {
        let mut streams = StreamSet::new();
        streams.insert("heartrate", json!([150]));
        let (available, missing) = infer_signals(&activity(json!({})), &streams);
        let mut sorted = available.clone();
        sorted.sort();
        assert_eq!(available, sorted);
        for signal in &available {
            assert!(!missing.contains(signal));
        }
    }
}
