// ABOUTME: Flag generation from data quality, intensity, fatigue, load, and check-in signals
// ABOUTME: Flags come from a closed taxonomy and are returned as an unordered set
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! Flag generator.
//!
//! Every flag is a code from the closed taxonomy in [`crate::models::Flag`].
//! History effort scores come from the most recent prior derived metrics;
//! only the latest seven feed the load-spike comparison.

use crate::models::{Activity, CheckIn, DerivedMetric, Flag, FlagSet};
use crate::processing::metrics::StreamMetrics;

/// Drift above this percentage suggests accumulated fatigue
const DRIFT_FATIGUE_THRESHOLD: f64 = 5.0;

/// Pace CV above this on a tempo marks unstable pacing
const TEMPO_PACE_CV_THRESHOLD: f64 = 15.0;

/// Effort this many times the recent mean is a load spike
const LOAD_SPIKE_FACTOR: f64 = 1.8;

/// Easy runs above this fraction of max HR are mismatched intensity
const EASY_INTENSITY_HR_RATIO: f64 = 0.8;

/// Generate the flag set for one processed activity.
///
/// `activity_class` is the class assigned earlier in the pipeline;
/// `history_metrics` are the derived metrics of the history window, newest
/// first.
#[must_use]
pub fn generate(
    activity: &Activity,
    activity_class: &str,
    metrics: &StreamMetrics,
    history_metrics: &[DerivedMetric],
    check_in: Option<&CheckIn>,
) -> FlagSet {
    let mut flags = FlagSet::new();

    // Data quality
    if activity.avg_hr.is_none() {
        flags.insert(Flag::DataLowConfidenceHr);
    }

    // Intensity mismatch on easy runs
    if activity_class == "Easy Run" {
        if let (Some(avg), Some(max)) = (activity.avg_hr, activity.max_hr) {
            if max > 0.0 && avg / max > EASY_INTENSITY_HR_RATIO {
                flags.insert(Flag::IntensityMismatch);
            }
        }
    }

    // Cardiac drift
    if metrics
        .hr_drift
        .is_some_and(|d| d > DRIFT_FATIGUE_THRESHOLD)
    {
        flags.insert(Flag::FatiguePossible);
    }

    // Unstable pacing on tempos
    if activity_class == "Tempo"
        && metrics
            .pace_variability
            .is_some_and(|cv| cv > TEMPO_PACE_CV_THRESHOLD)
    {
        flags.insert(Flag::PaceUnstable);
    }

    // Load spike against the latest seven efforts
    let recent_efforts: Vec<f64> = history_metrics
        .iter()
        .take(7)
        .map(|m| m.effort_score)
        .collect();
    if !recent_efforts.is_empty() {
        let mean_effort = recent_efforts.iter().sum::<f64>() / recent_efforts.len() as f64;
        if mean_effort > 0.0 && metrics.effort_score > LOAD_SPIKE_FACTOR * mean_effort {
            flags.insert(Flag::LoadSpike);
        }
    }

    if let Some(check_in) = check_in {
        let rpe = check_in.rpe.unwrap_or(0);
        // default high so a missing answer never looks like bad sleep
        let sleep = check_in.sleep_quality.unwrap_or(10);
        let pain = check_in.pain_score.unwrap_or(0);

        if rpe >= 8 && sleep <= 2 && pain >= 5 {
            flags.insert(Flag::IllnessOrExtremeFatigue);
        }
        if pain >= 4 {
            flags.insert(Flag::PainReported);
        }
        if pain >= 7 {
            flags.insert(Flag::PainSevere);
        }
    }

    flags
}
