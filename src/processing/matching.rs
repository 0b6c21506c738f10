// ABOUTME: Workout matching: planned-vs-detected comparison and interval KPIs
// ABOUTME: The detection confidence here gates what downstream consumers may claim
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! Workout matcher.
//!
//! Compares a declared plan (reps, rep distance, rest) against what the
//! interval detector found. Without a plan, confidence derives from
//! detection quality alone. Reason codes are machine-readable and feed both
//! the match result and the overall confidence computation.

use crate::models::{
    ConfidenceLevel, ConsistencyLabel, DetectedWorkout, IntervalKpis, IntervalStructure,
    PlannedWorkout, TimeInZones, WorkoutMatch,
};
use crate::utils::stats::{cv_percent, mean, median, round_to};

/// Rep distances more than this fraction off the median are outliers
const DISTANCE_OUTLIER_FRACTION: f64 = 0.5;

/// Rep distance/duration CV above this is flagged as high variability
const HIGH_VARIABILITY_CV: f64 = 30.0;

/// Assumed typical work speed for the expected-work-time sanity check, m/s
const PLAN_SANITY_SPEED_MPS: f64 = 4.0;

/// Compare the detected interval structure against an optional plan.
///
/// With no structure the result is low confidence with the single reason
/// `no_intervals_detected` and a null score. With structure but no plan the
/// confidence derives from detection quality alone (at best `medium`).
#[must_use]
pub fn match_planned_to_detected(
    structure: Option<&IntervalStructure>,
    planned: Option<&PlannedWorkout>,
) -> WorkoutMatch {
    let mut result = WorkoutMatch {
        match_score: None,
        detection_confidence: ConfidenceLevel::Low,
        confidence_reasons: Vec::new(),
        detected_workout: None,
    };

    let Some(structure) = structure else {
        result
            .confidence_reasons
            .push("no_intervals_detected".to_owned());
        return result;
    };

    let work = &structure.work_segments;
    if work.is_empty() {
        result.confidence_reasons.push("no_work_segments".to_owned());
        return result;
    }
    let summary = &structure.summary;

    let distances: Vec<f64> = work.iter().filter_map(|w| w.distance_m).collect();
    let durations: Vec<f64> = work.iter().map(|w| w.duration_s as f64).collect();

    let detected = DetectedWorkout {
        reps_detected: summary.rep_count,
        rep_distance_mean_m: mean(&distances).map(|m| round_to(m, 1)),
        rep_distance_cv: cv_percent(&distances).map(|v| round_to(v, 1)),
        rep_duration_mean_s: round_to(mean(&durations).unwrap_or(0.0), 1),
        rep_duration_cv: summary.work_duration_cv,
        total_work_time_s: summary.total_work_time_s,
        total_rest_time_s: summary.total_rest_time_s,
        work_to_rest_ratio: summary.work_to_rest_ratio,
        consistency_score: summary.consistency_score,
    };

    // Distance outliers relative to the median
    if distances.len() >= 3 {
        if let Some(med) = median(&distances) {
            if med > 0.0 {
                let outliers = distances
                    .iter()
                    .filter(|d| ((*d - med).abs() / med) > DISTANCE_OUTLIER_FRACTION)
                    .count();
                if outliers > 0 {
                    result.confidence_reasons.push(format!(
                        "distance_outliers_{outliers}_of_{}",
                        distances.len()
                    ));
                }
            }
        }
    }

    if detected
        .rep_distance_cv
        .is_some_and(|cv| cv > HIGH_VARIABILITY_CV)
    {
        result
            .confidence_reasons
            .push("high_rep_distance_variability".to_owned());
    }
    if detected
        .rep_duration_cv
        .is_some_and(|cv| cv > HIGH_VARIABILITY_CV)
    {
        result
            .confidence_reasons
            .push("high_rep_duration_variability".to_owned());
    }

    let Some(planned) = planned else {
        result
            .confidence_reasons
            .push("no_planned_workout".to_owned());
        // Without a plan, detection quality alone decides
        let clean = !result
            .confidence_reasons
            .iter()
            .any(|r| r.contains("outlier"));
        result.detection_confidence =
            if detected.consistency_score == ConsistencyLabel::High && clean {
                ConfidenceLevel::Medium
            } else {
                ConfidenceLevel::Low
            };
        result.detected_workout = Some(detected);
        return result;
    };

    // With a plan: per-criterion min/max ratios averaged into the score
    let mut scores: Vec<f64> = Vec::new();

    if let Some(reps_planned) = planned.reps_planned.filter(|r| *r > 0) {
        let reps_detected = detected.reps_detected;
        if reps_detected > 0 {
            let planned_f = f64::from(reps_planned);
            let detected_f = reps_detected as f64;
            scores.push(planned_f.min(detected_f) / planned_f.max(detected_f));
            if reps_planned as usize != reps_detected {
                result.confidence_reasons.push(format!(
                    "rep_count_mismatch_planned_{reps_planned}_detected_{reps_detected}"
                ));
            }
        }
    }

    if let (Some(planned_dist), Some(detected_dist)) = (
        planned.rep_distance_m.filter(|d| *d > 0.0),
        detected.rep_distance_mean_m,
    ) {
        let ratio = planned_dist.min(detected_dist) / planned_dist.max(detected_dist);
        scores.push(ratio);
        if ratio < 0.7 {
            result
                .confidence_reasons
                .push("rep_distance_mismatch".to_owned());
        }
    }

    if let (Some(planned_rest), Some(avg_rest)) = (
        planned.rest_s.filter(|r| *r > 0.0),
        summary.avg_rest_duration_s.map(|r| r as f64),
    ) {
        if avg_rest > 0.0 {
            let ratio = planned_rest.min(avg_rest) / planned_rest.max(avg_rest);
            scores.push(ratio);
            if ratio < 0.5 {
                result
                    .confidence_reasons
                    .push("rest_duration_mismatch".to_owned());
            }
        }
    }

    // Plausibility of total work time against the plan
    if let (Some(reps), Some(dist)) = (planned.reps_planned, planned.rep_distance_m) {
        let total_work = detected.total_work_time_s as f64;
        if reps > 0 && dist > 0.0 && total_work > 0.0 {
            let expected_work = f64::from(reps) * (dist / PLAN_SANITY_SPEED_MPS);
            let ratio = expected_work.min(total_work) / expected_work.max(total_work);
            if ratio < 0.4 {
                result
                    .confidence_reasons
                    .push("work_time_implausible_for_plan".to_owned());
                scores.push(ratio);
            }
        }
    }

    let match_score = round_to(mean(&scores).unwrap_or(0.0), 2);
    result.match_score = Some(match_score);

    let critical_reasons = result
        .confidence_reasons
        .iter()
        .filter(|r| r.as_str() != "no_planned_workout")
        .count();
    result.detection_confidence = if match_score >= 0.8 && critical_reasons <= 1 {
        ConfidenceLevel::High
    } else if match_score >= 0.5 {
        ConfidenceLevel::Medium
    } else {
        ConfidenceLevel::Low
    };

    result.detected_workout = Some(detected);
    result
}

/// Interval-specific coaching KPIs from the detected structure.
///
/// `total_z4_plus_s` only appears when the athlete's zones are calibrated;
/// uncalibrated zone seconds would be guesses.
#[must_use]
pub fn build_interval_kpis(
    structure: &IntervalStructure,
    zones_calibrated: bool,
    time_in_zones: Option<&TimeInZones>,
) -> IntervalKpis {
    let work = &structure.work_segments;
    let summary = &structure.summary;

    let first_vs_last_fade = if work.len() >= 2 {
        let first = work[0].avg_speed_mps;
        let last = work[work.len() - 1].avg_speed_mps;
        (first > 0.0 && last > 0.0).then(|| round_to(last / first, 2))
    } else {
        None
    };

    let drops_per_60: Vec<f64> = structure
        .rest_segments
        .iter()
        .filter_map(|rest| {
            let recovery = rest.hr_recovery_bpm?;
            (rest.duration_s > 0).then(|| recovery / rest.duration_s as f64 * 60.0)
        })
        .collect();

    IntervalKpis {
        rep_pace_consistency_cv: summary.work_speed_cv,
        first_vs_last_fade,
        recovery_quality_per_60s: mean(&drops_per_60).map(|m| round_to(m, 1)),
        work_rest_ratio: summary.work_to_rest_ratio,
        total_z4_plus_s: if zones_calibrated {
            time_in_zones.map(|z| z.z4 + z.z5)
        } else {
            None
        },
    }
}
