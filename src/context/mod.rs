// ABOUTME: Context pack assembly: every fact the coaching layer consumes, in one document
// ABOUTME: Values are copied, never referenced, so the hash is stable and the consumer stateless
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! Context pack builder.
//!
//! Gathers and shapes existing data (activity, metrics, check-in, profile,
//! training context, rolling summaries, signal availability) into one
//! deterministic JSON document. No computation happens here beyond the
//! gathering. Serialization sorts keys at every level, so
//! `SHA-256(canonical_json)` is reproducible across invocations.

pub mod signals;

use anyhow::Result;
use chrono::Duration;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use uuid::Uuid;

use crate::database::Database;
use crate::models::{Activity, DerivedMetric};
use crate::processing::engine;
use crate::units::cadence;
use crate::utils::stats::round_to;

/// Assemble the context pack for one activity.
///
/// Every top-level key is present even when its nested values are null.
///
/// # Errors
///
/// Returns an error on database failure.
pub async fn build_context_pack(db: &Database, activity: &Activity) -> Result<Value> {
    let metrics = db.get_metric_by_activity(activity.id).await?;
    let check_in = db.get_check_in(activity.id).await?;
    let profile = db.get_profile(activity.user_id).await?;
    let streams = db.get_streams(activity.id).await?;

    // Training context from the same history window processing uses
    let history = db
        .history_before(activity.user_id, activity.start_date, 20)
        .await?;
    let history_ids: Vec<Uuid> = history.iter().map(|a| a.id).collect();
    let history_metrics = db.metrics_for_activities(&history_ids).await?;
    let training_ctx = engine::build_training_ctx(activity, &history, &history_metrics);

    // Rolling summaries relative to this activity's date
    let summarize_window = |start_days: i64, end_days: i64| {
        let start = activity.start_date - Duration::days(start_days);
        let end = activity.start_date - Duration::days(end_days);
        async move {
            let window = db
                .activities_in_window(activity.user_id, Some(start), Some(end))
                .await?;
            let ids: Vec<Uuid> = window.iter().map(|a| a.id).collect();
            let window_metrics = db.metrics_for_activities(&ids).await?;
            Ok::<Value, anyhow::Error>(summarize(&window, &window_metrics))
        }
    };
    let last_7d = summarize_window(7, 0).await?;
    let last_28d = summarize_window(28, 0).await?;
    let previous_28d = summarize_window(56, 28).await?;

    let (available_signals, missing_signals) = signals::infer_signals(activity, &streams);

    let zones_calibrated = profile.as_ref().is_some_and(|p| p.zones_calibrated());
    let zones_basis = profile
        .as_ref()
        .map_or_else(|| "uncalibrated".to_owned(), |p| p.zones_basis());

    let avg_pace_s_per_km = (activity.distance_m > 0).then(|| {
        round_to(
            activity.moving_time_s as f64 / (activity.distance_m as f64 / 1000.0),
            1,
        )
    });

    let pack = json!({
        "activity": {
            "id": activity.id.to_string(),
            "date": activity.start_date.to_rfc3339(),
            "type": activity.effective_type(),
            "name": activity.name,
            "distance_m": activity.distance_m,
            "moving_time_s": activity.moving_time_s,
            "elapsed_time_s": activity.elapsed_time_s,
            "avg_pace_s_per_km": avg_pace_s_per_km,
            "avg_hr": activity.avg_hr,
            "max_hr": activity.max_hr,
            "avg_cadence": activity.avg_cadence.map(cadence::normalize_spm),
            "elev_gain_m": activity.elev_gain_m,
        },
        "metrics": metrics_section(metrics.as_ref(), zones_calibrated, &zones_basis),
        "check_in": {
            "rpe": check_in.as_ref().and_then(|c| c.rpe),
            "pain_score": check_in.as_ref().and_then(|c| c.pain_score),
            "pain_location": check_in.as_ref().and_then(|c| c.pain_location.clone()),
            "sleep_quality": check_in.as_ref().and_then(|c| c.sleep_quality),
            "notes": check_in.as_ref().and_then(|c| c.notes.clone()),
        },
        "profile": {
            "goal_type": profile.as_ref().map(|p| p.goal_type.clone()),
            "experience_level": profile.as_ref().map(|p| p.experience_level.clone()),
            "weekly_days_available": profile.as_ref().map(|p| p.weekly_days_available),
            "current_weekly_km": profile.as_ref().and_then(|p| p.current_weekly_km),
            "max_hr": profile.as_ref().and_then(|p| p.max_hr),
            "max_hr_source": profile.as_ref().and_then(|p| p.max_hr_source.clone()),
            "injury_notes": profile.as_ref().and_then(|p| p.injury_notes.clone()),
        },
        "training_context": training_ctx,
        "recent_training_summary": {
            "last_7d": last_7d,
            "last_28d": last_28d,
            "previous_28d": previous_28d,
        },
        "safety_rules": {
            "never_diagnose": true,
            "pain_severe_threshold": 7,
            "no_invented_facts": true,
        },
        "available_signals": available_signals,
        "missing_signals": missing_signals,
    });

    Ok(pack)
}

fn metrics_section(
    metrics: Option<&DerivedMetric>,
    zones_calibrated: bool,
    zones_basis: &str,
) -> Value {
    json!({
        "activity_class": metrics.map(|m| m.activity_class.clone()),
        "effort_score": metrics.map(|m| round_to(m.effort_score, 1)),
        "hr_drift": metrics.and_then(|m| m.hr_drift).map(|v| round_to(v, 1)),
        "pace_variability": metrics
            .and_then(|m| m.pace_variability)
            .map(|v| round_to(v, 1)),
        "flags": metrics.map_or_else(Vec::new, |m| {
            m.flags.iter().map(|f| f.as_str().to_owned()).collect()
        }),
        "confidence": metrics.map_or("low", |m| m.confidence.as_str()),
        "confidence_reasons": metrics.map_or_else(Vec::new, |m| m.confidence_reasons.clone()),
        "time_in_zones": metrics.and_then(|m| m.time_in_zones),
        "zones_calibrated": zones_calibrated,
        "zones_basis": zones_basis,
        "efficiency": metrics.and_then(|m| m.efficiency_analysis.clone()),
        "stops": metrics.and_then(|m| m.stops_analysis.clone()),
        "interval_structure": metrics.and_then(|m| m.interval_structure.clone()),
        "workout_match": metrics.and_then(|m| m.workout_match.clone()),
        "interval_kpis": metrics.and_then(|m| m.interval_kpis.clone()),
        "risk_level": metrics.map(|m| m.risk_level.as_str()),
        "risk_score": metrics.map(|m| m.risk_score),
        "risk_reasons": metrics.map_or_else(Vec::new, |m| m.risk_reasons.clone()),
    })
}

fn summarize(activities: &[Activity], metrics: &[DerivedMetric]) -> Value {
    let by_activity: HashMap<Uuid, &DerivedMetric> =
        metrics.iter().map(|m| (m.activity_id, m)).collect();
    let total_effort: f64 = activities
        .iter()
        .filter_map(|a| by_activity.get(&a.id).map(|m| m.effort_score))
        .sum();
    json!({
        "activity_count": activities.len(),
        "total_distance_m": activities.iter().map(|a| a.distance_m).sum::<i64>(),
        "total_moving_time_s": activities.iter().map(|a| a.moving_time_s).sum::<i64>(),
        "total_effort": round_to(total_effort, 1),
    })
}

/// Deterministic SHA-256 of the pack's canonical JSON.
///
/// `serde_json` maps iterate in sorted key order, so serialization is
/// canonical without extra work; the hash is stable across invocations
/// with identical inputs.
#[must_use]
pub fn hash_context_pack(pack: &Value) -> String {
    let canonical = pack.to_string();
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_across_invocations() {
        let pack = json!({
            "activity": {"type": "Easy Run", "distance_m": 5000},
            "metrics": {"effort_score": 105.5},
            "safety_rules": {"never_diagnose": true},
        });
        assert_eq!(hash_context_pack(&pack), hash_context_pack(&pack));
    }

    #[test]
    fn hash_is_insertion_order_independent() {
        let a = json!({"b": 2, "a": 1, "nested": {"y": 2, "x": 1}});
        let b = json!({"a": 1, "nested": {"x": 1, "y": 2}, "b": 2});
        assert_eq!(hash_context_pack(&a), hash_context_pack(&b));
    }

    #[test]
    fn hash_differs_on_content_change() {
        let a = json!({"metrics": {"effort_score": 105.5}});
        let b = json!({"metrics": {"effort_score": 105.6}});
        assert_ne!(hash_context_pack(&a), hash_context_pack(&b));
    }

    #[test]
    fn metrics_section_defaults_without_a_record() {
        let section = metrics_section(None, false, "uncalibrated");
        assert_eq!(section["confidence"], "low");
        assert_eq!(section["zones_calibrated"], false);
        assert!(section["activity_class"].is_null());
        assert!(section["flags"].as_array().unwrap().is_empty());
    }
}
