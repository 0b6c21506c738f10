// ABOUTME: Processing orchestrator: loads inputs, runs the analysis stages in order, upserts
// ABOUTME: Also computes the confidence gate from data presence and interval sanity checks
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! The processing engine.
//!
//! One invocation is strictly sequential: load activity, history, streams,
//! check-in, and profile; compute metrics; classify; detect intervals;
//! match the plan; generate flags; score risk; compute confidence; upsert
//! the derived-metric row. Any failure aborts the single activity's
//! processing with no partial row written.

use anyhow::Result;
use chrono::Utc;
use std::collections::HashMap;
use uuid::Uuid;

use crate::database::Database;
use crate::models::{
    Activity, CheckIn, ConfidenceLevel, DerivedMetric, IntervalStructure, PlannedWorkout,
    StreamSet, TrainingContext, WorkoutMatch,
};
use crate::processing::{classifier, flags, intervals, matching, metrics, training_context};

/// Total work beyond this many seconds is implausible for a rep session
const MAX_PLAUSIBLE_WORK_TIME_S: i64 = 2700;

/// Match scores under this trigger the structure-mismatch confidence reason
const STRUCTURE_MISMATCH_SCORE: f64 = 0.7;

/// Reasons that weigh heaviest when grading confidence
const CRITICAL_REASONS: [&str; 5] = [
    "no_heart_rate_data",
    "no_stream_data",
    "interval_structure_mismatch",
    "work_time_implausibly_high",
    "high_rep_distance_variability",
];

/// Extract a structured planned workout from the check-in.
///
/// Plan capture has no input surface yet, so this always resolves to no
/// plan; the matcher then grades detection quality alone.
fn extract_planned_workout(_check_in: Option<&CheckIn>) -> Option<PlannedWorkout> {
    None
}

/// Process one activity end to end and upsert its derived metric.
///
/// Returns `Ok(None)` when the activity does not exist. Re-running with
/// unchanged inputs produces field-identical output.
///
/// # Errors
///
/// Returns an error when any load or the final upsert fails; no partial
/// derived-metric row is written in that case.
pub async fn process_activity(
    db: &Database,
    activity_id: Uuid,
) -> Result<Option<DerivedMetric>> {
    // 1. Load the activity
    let Some(activity) = db.get_activity(activity_id).await? else {
        return Ok(None);
    };

    // 2. Up to 20 most recent prior activities for classification and
    //    load-spike detection
    let history = db
        .history_before(activity.user_id, activity.start_date, 20)
        .await?;

    // 3. Streams
    let streams = db.get_streams(activity.id).await?;

    // 4. Check-in and profile
    let check_in = db.get_check_in(activity.id).await?;
    let profile = db.get_profile(activity.user_id).await?;
    let max_hr = profile
        .as_ref()
        .map_or(crate::constants::physiology::DEFAULT_MAX_HR, |p| {
            p.effective_max_hr()
        });
    let zones_calibrated = profile.as_ref().is_some_and(|p| p.zones_calibrated());

    // 5. Stream metrics
    let stream_metrics = metrics::compute(&activity, &streams, max_hr);

    // 6. Classification
    let activity_class = classifier::classify(&activity, &history);

    // 7. Interval detection, only meaningful for interval sessions
    let interval_structure = if streams.is_empty() {
        None
    } else {
        intervals::detect(&streams, &activity_class)
    };

    // 8. Workout matching and interval KPIs
    let planned = extract_planned_workout(check_in.as_ref());
    let workout_match =
        matching::match_planned_to_detected(interval_structure.as_ref(), planned.as_ref());
    let interval_kpis = interval_structure.as_ref().map(|structure| {
        matching::build_interval_kpis(
            structure,
            zones_calibrated,
            stream_metrics.time_in_zones.as_ref(),
        )
    });

    // 9. Flags need the history's derived metrics for load-spike detection
    let history_ids: Vec<Uuid> = history.iter().map(|a| a.id).collect();
    let history_metrics = db.metrics_for_activities(&history_ids).await?;
    let flag_set = flags::generate(
        &activity,
        &activity_class,
        &stream_metrics,
        &history_metrics,
        check_in.as_ref(),
    );

    // 10. Risk over flags + check-in + training context
    let training_ctx = build_training_ctx(&activity, &history, &history_metrics);
    let risk = crate::processing::risk::compute(&flag_set, check_in.as_ref(), &training_ctx);

    // 11. Confidence
    let (confidence, confidence_reasons) = compute_confidence(
        &activity,
        &streams,
        check_in.as_ref(),
        interval_structure.as_ref(),
        &workout_match,
    );

    // 12. Upsert
    let metric = DerivedMetric {
        id: Uuid::new_v4(),
        activity_id: activity.id,
        activity_class,
        effort_score: stream_metrics.effort_score,
        pace_variability: stream_metrics.pace_variability,
        hr_drift: stream_metrics.hr_drift,
        time_in_zones: stream_metrics.time_in_zones,
        stops_analysis: stream_metrics.stops_analysis,
        efficiency_analysis: stream_metrics.efficiency_analysis,
        interval_structure,
        workout_match: Some(workout_match),
        interval_kpis,
        flags: flag_set,
        risk_level: risk.risk_level,
        risk_score: risk.risk_score,
        risk_reasons: risk.risk_reasons,
        confidence,
        confidence_reasons,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };

    Ok(Some(db.upsert_derived_metric(&metric).await?))
}

/// Training context from the already-loaded history window
pub(crate) fn build_training_ctx(
    activity: &Activity,
    history: &[Activity],
    history_metrics: &[DerivedMetric],
) -> TrainingContext {
    let by_activity: HashMap<Uuid, &DerivedMetric> = history_metrics
        .iter()
        .map(|m| (m.activity_id, m))
        .collect();
    let prior: Vec<(Activity, Option<DerivedMetric>)> = history
        .iter()
        .map(|a| (a.clone(), by_activity.get(&a.id).map(|m| (*m).clone())))
        .collect();
    training_context::build(activity.start_date, &prior)
}

/// Determine the confidence level and reasons.
///
/// Data-presence reasons come first, then the matcher's reason codes
/// (deduplicated), then interval sanity checks. The critical subset drives
/// the level: two or more critical reasons mean `low`, one critical or
/// three total mean `medium`, a clean slate means `high`.
#[must_use]
pub fn compute_confidence(
    activity: &Activity,
    streams: &StreamSet,
    check_in: Option<&CheckIn>,
    interval_structure: Option<&IntervalStructure>,
    workout_match: &WorkoutMatch,
) -> (ConfidenceLevel, Vec<String>) {
    let mut reasons: Vec<String> = Vec::new();

    if activity.avg_hr.is_none() {
        reasons.push("no_heart_rate_data".to_owned());
    }
    if streams.is_empty() {
        reasons.push("no_stream_data".to_owned());
    } else if !streams.has_channel("latlng") {
        reasons.push("no_gps_data".to_owned());
    }
    if check_in.is_none() {
        reasons.push("no_user_checkin".to_owned());
    }

    for reason in &workout_match.confidence_reasons {
        if !reasons.contains(reason) {
            reasons.push(reason.clone());
        }
    }
    if workout_match
        .match_score
        .is_some_and(|score| score < STRUCTURE_MISMATCH_SCORE)
    {
        reasons.push("interval_structure_mismatch".to_owned());
    }

    if let Some(structure) = interval_structure {
        if structure.summary.total_work_time_s > MAX_PLAUSIBLE_WORK_TIME_S {
            reasons.push("work_time_implausibly_high".to_owned());
        }
        if structure.warmup_duration_s.is_none() {
            reasons.push("no_warmup_detected".to_owned());
        }
    }

    let critical_hits = reasons
        .iter()
        .filter(|r| CRITICAL_REASONS.contains(&r.as_str()))
        .count();

    let level = if critical_hits >= 2 {
        ConfidenceLevel::Low
    } else if critical_hits >= 1 || reasons.len() >= 3 {
        ConfidenceLevel::Medium
    } else if reasons.is_empty() {
        ConfidenceLevel::High
    } else {
        ConfidenceLevel::Medium
    };

    (level, reasons)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{IntervalSummary, WorkSegment};
    use serde_json::json;

    fn activity(avg_hr: Option<f64>) -> Activity {
        Activity {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            strava_activity_id: 1,
            start_date: Utc::now(),
            activity_type: "Run".to_owned(),
            name: "Morning Run".to_owned(),
            distance_m: 5000,
            moving_time_s: 1500,
            elapsed_time_s: 1500,
            elev_gain_m: 0.0,
            avg_hr,
            max_hr: Some(200.0),
            avg_cadence: None,
            average_speed_mps: None,
            user_intent: None,
            raw_summary: json!({}),
            is_deleted: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn empty_match() -> WorkoutMatch {
        WorkoutMatch {
            match_score: None,
            detection_confidence: ConfidenceLevel::Low,
            confidence_reasons: vec!["no_intervals_detected".to_owned()],
            detected_workout: None,
        }
    }

    fn structure_with(total_work: i64, warmup: Option<i64>) -> IntervalStructure {
        IntervalStructure {
            warmup_duration_s: warmup,
            cooldown_duration_s: None,
            work_segments: vec![
                WorkSegment {
                    segment_number: 1,
                    start_time_s: 0,
                    duration_s: total_work / 2,
                    distance_m: None,
                    avg_speed_mps: 4.0,
                    avg_hr: None,
                    peak_hr: None,
                },
                WorkSegment {
                    segment_number: 2,
                    start_time_s: total_work,
                    duration_s: total_work / 2,
                    distance_m: None,
                    avg_speed_mps: 4.0,
                    avg_hr: None,
                    peak_hr: None,
                },
            ],
            rest_segments: vec![],
            summary: IntervalSummary {
                total_work_time_s: total_work,
                total_rest_time_s: 0,
                work_to_rest_ratio: None,
                rep_count: 2,
                avg_work_duration_s: total_work / 2,
                work_duration_cv: Some(1.0),
                avg_work_speed_mps: 4.0,
                work_speed_cv: Some(1.0),
                avg_rest_duration_s: None,
                avg_hr_recovery_bpm: None,
                consistency_score: crate::models::ConsistencyLabel::High,
            },
        }
    }

    #[test]
    fn no_streams_no_checkin_is_medium() {
        let (level, reasons) = compute_confidence(
            &activity(Some(150.0)),
            &StreamSet::new(),
            None,
            None,
            &empty_match(),
        );
        assert!(reasons.contains(&"no_stream_data".to_owned()));
        assert!(reasons.contains(&"no_user_checkin".to_owned()));
        assert_eq!(level, ConfidenceLevel::Medium);
    }

    #[test]
    fn two_critical_reasons_mean_low() {
        let (level, reasons) = compute_confidence(
            &activity(None),
            &StreamSet::new(),
            None,
            None,
            &empty_match(),
        );
        assert!(reasons.contains(&"no_heart_rate_data".to_owned()));
        assert!(reasons.contains(&"no_stream_data".to_owned()));
        assert_eq!(level, ConfidenceLevel::Low);
    }

    #[test]
    fn full_data_is_high() {
        let mut streams = StreamSet::new();
        streams.insert("latlng", json!([[48.0, 2.0]]));
        let check_in = CheckIn {
            id: Uuid::new_v4(),
            activity_id: Uuid::new_v4(),
            rpe: Some(5),
            pain_score: None,
            pain_location: None,
            sleep_quality: Some(7),
            notes: None,
            created_at: Utc::now(),
        };
        let clean_match = WorkoutMatch {
            match_score: None,
            detection_confidence: ConfidenceLevel::Low,
            confidence_reasons: vec![],
            detected_workout: None,
        };
        let (level, reasons) = compute_confidence(
            &activity(Some(150.0)),
            &streams,
            Some(&check_in),
            None,
            &clean_match,
        );
        assert!(reasons.is_empty());
        assert_eq!(level, ConfidenceLevel::High);
    }

    #[test]
    fn streams_without_gps_are_noted() {
        let mut streams = StreamSet::new();
        streams.insert("heartrate", json!([150.0]));
        let (_, reasons) = compute_confidence(
            &activity(Some(150.0)),
            &streams,
            None,
            None,
            &empty_match(),
        );
        assert!(reasons.contains(&"no_gps_data".to_owned()));
    }

    #[test]
    fn low_match_score_is_a_structure_mismatch() {
        let mut workout_match = empty_match();
        workout_match.match_score = Some(0.6);
        let mut streams = StreamSet::new();
        streams.insert("latlng", json!([[48.0, 2.0]]));
        let (_, reasons) = compute_confidence(
            &activity(Some(150.0)),
            &streams,
            None,
            None,
            &workout_match,
        );
        assert!(reasons.contains(&"interval_structure_mismatch".to_owned()));
    }

    #[test]
    fn interval_sanity_checks_fire() {
        let mut streams = StreamSet::new();
        streams.insert("latlng", json!([[48.0, 2.0]]));
        let structure = structure_with(2800, None);
        let (_, reasons) = compute_confidence(
            &activity(Some(150.0)),
            &streams,
            None,
            Some(&structure),
            &empty_match(),
        );
        assert!(reasons.contains(&"work_time_implausibly_high".to_owned()));
        assert!(reasons.contains(&"no_warmup_detected".to_owned()));

        // plausible work with a warmup raises neither
        let structure = structure_with(1200, Some(300));
        let (_, reasons) = compute_confidence(
            &activity(Some(150.0)),
            &streams,
            None,
            Some(&structure),
            &empty_match(),
        );
        assert!(!reasons.contains(&"work_time_implausibly_high".to_owned()));
        assert!(!reasons.contains(&"no_warmup_detected".to_owned()));
    }
}
