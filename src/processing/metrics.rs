// ABOUTME: Derived-metric computations over aligned sample streams
// ABOUTME: Effort score, HR zones, pace variability, cardiac drift, efficiency
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! The metrics engine.
//!
//! Samples below the filter thresholds are excluded rather than imputed.
//! Every function returns `None` when its preconditions are unmet; only the
//! effort score is always computable.

use crate::models::{Activity, EfficiencyAnalysis, StreamSet, TimeInZones};
use crate::processing::stops;
use crate::utils::stats::{boxcar_same, boxcar_valid, mean, round_to, std_population};

/// HR samples at or below this are sensor noise and dropped
const MIN_VALID_HR: f64 = 30.0;

/// Velocity at or below this counts as stopped for CV and drift purposes
const MIN_MOVING_VELOCITY: f64 = 0.5;

/// Drift needs at least ten minutes of clean samples per the 1 Hz assumption
const MIN_DRIFT_SAMPLES: usize = 600;

/// Minimum stream length for pace variability
const MIN_CV_SAMPLES: usize = 60;

/// Efficiency needs three minutes of aligned samples
const MIN_EFFICIENCY_SAMPLES: usize = 180;

/// Best-sustained efficiency window, in samples
const SUSTAINED_WINDOW: usize = 180;

/// Chart curve smoothing window, in samples
const CURVE_WINDOW: usize = 60;

/// Stream-derived metric bundle assembled for the derived-metric row
#[derive(Debug, Clone)]
pub struct StreamMetrics {
    /// Training-load proxy, always present
    pub effort_score: f64,
    /// Pace coefficient of variation, percent
    pub pace_variability: Option<f64>,
    /// Cardiac decoupling, percent
    pub hr_drift: Option<f64>,
    /// Seconds per heart-rate zone
    pub time_in_zones: Option<TimeInZones>,
    /// Stop analysis
    pub stops_analysis: Option<crate::models::StopsAnalysis>,
    /// Efficiency statistics
    pub efficiency_analysis: Option<EfficiencyAnalysis>,
}

/// Compute every stream metric for one activity.
///
/// The effort score never depends on streams; everything else is `None`
/// when the stream set is empty or preconditions fail.
#[must_use]
pub fn compute(activity: &Activity, streams: &StreamSet, max_hr: i64) -> StreamMetrics {
    let effort = effort_score(activity);

    if streams.is_empty() {
        return StreamMetrics {
            effort_score: effort,
            pace_variability: None,
            hr_drift: None,
            time_in_zones: None,
            stops_analysis: None,
            efficiency_analysis: None,
        };
    }

    StreamMetrics {
        effort_score: effort,
        pace_variability: pace_variability(streams),
        hr_drift: hr_drift(streams),
        time_in_zones: time_in_zones(streams, max_hr),
        stops_analysis: stops::analyze(streams),
        efficiency_analysis: efficiency(streams),
    }
}

/// TRIMP-like effort score.
///
/// With both average and max HR: `minutes * (avg/max)^3 * 10`, rounded to
/// one decimal. Without HR the duration in minutes stands in. Never null.
#[must_use]
pub fn effort_score(activity: &Activity) -> f64 {
    let minutes = activity.moving_time_s as f64 / 60.0;
    match (activity.avg_hr, activity.max_hr) {
        (Some(avg), Some(max)) if max > 0.0 => {
            let hr_ratio = avg / max;
            round_to(minutes * hr_ratio.powi(3) * 10.0, 1)
        }
        _ => round_to(minutes, 1),
    }
}

/// Seconds in each of the five heart-rate zones.
///
/// Zone bounds are percentages of max HR: Z1 50-60, Z2 60-70, Z3 70-80,
/// Z4 80-90, Z5 90+. Samples under 50 % are dropped. One sample counts as
/// one second (streams are assumed 1 Hz).
#[must_use]
pub fn time_in_zones(streams: &StreamSet, max_hr: i64) -> Option<TimeInZones> {
    let hr = streams.samples("heartrate")?;
    let valid: Vec<f64> = hr.into_iter().filter(|h| *h > MIN_VALID_HR).collect();
    if valid.is_empty() {
        return None;
    }

    let max = max_hr as f64;
    let bounds = [0.5 * max, 0.6 * max, 0.7 * max, 0.8 * max, 0.9 * max];

    let mut zones = TimeInZones::default();
    for sample in valid {
        if sample >= bounds[4] {
            zones.z5 += 1;
        } else if sample >= bounds[3] {
            zones.z4 += 1;
        } else if sample >= bounds[2] {
            zones.z3 += 1;
        } else if sample >= bounds[1] {
            zones.z2 += 1;
        } else if sample >= bounds[0] {
            zones.z1 += 1;
        }
        // below 50 %: dropped
    }
    Some(zones)
}

/// Coefficient of variation of instantaneous speed, as a percentage.
///
/// Requires at least 60 velocity samples; near-stationary samples are
/// filtered before the statistics.
#[must_use]
pub fn pace_variability(streams: &StreamSet) -> Option<f64> {
    let velocity = streams.samples("velocity_smooth")?;
    if velocity.len() < MIN_CV_SAMPLES {
        return None;
    }

    let moving: Vec<f64> = velocity
        .into_iter()
        .filter(|v| *v > MIN_MOVING_VELOCITY)
        .collect();
    let mean_v = mean(&moving)?;
    if mean_v == 0.0 {
        return None;
    }
    let std_v = std_population(&moving)?;
    Some(round_to(std_v / mean_v * 100.0, 2))
}

/// Pace:HR decoupling over the run, as a percentage.
///
/// Positive drift means the second half needed more heartbeats per unit of
/// speed than the first. Requires ten minutes of clean, aligned samples.
#[must_use]
pub fn hr_drift(streams: &StreamSet) -> Option<f64> {
    let hr = streams.samples("heartrate")?;
    let velocity = streams.samples("velocity_smooth")?;
    if hr.len() != velocity.len() || hr.len() < MIN_DRIFT_SAMPLES {
        return None;
    }

    let mut clean: Vec<(f64, f64)> = Vec::with_capacity(hr.len());
    for (v, h) in velocity.iter().zip(&hr) {
        if *v > MIN_MOVING_VELOCITY && *h > 60.0 {
            clean.push((*v, *h));
        }
    }
    if clean.len() < MIN_DRIFT_SAMPLES {
        return None;
    }

    let half = clean.len() / 2;
    let ef = |window: &[(f64, f64)]| -> f64 {
        window.iter().map(|(v, h)| v / h).sum::<f64>() / window.len() as f64
    };
    let ef_first = ef(&clean[..half]);
    let ef_second = ef(&clean[half..]);
    if ef_first == 0.0 {
        return None;
    }

    Some(round_to((1.0 - ef_second / ef_first) * 100.0, 2))
}

/// Efficiency factor statistics in m/min per bpm.
///
/// `average` runs over samples that are clearly moving with a live HR
/// signal. `best_sustained` is the maximum 3-minute boxcar of a per-sample
/// efficiency stream where invalid samples count as zero, so stops penalize
/// the window. The chart curve is smoothed over 60 s and downsampled 10:1.
#[must_use]
pub fn efficiency(streams: &StreamSet) -> Option<EfficiencyAnalysis> {
    let velocity = streams.samples("velocity_smooth")?;
    let hr = streams.samples("heartrate")?;

    let length = velocity.len().min(hr.len());
    if length < MIN_EFFICIENCY_SAMPLES {
        return None;
    }
    let velocity = &velocity[..length];
    let hr = &hr[..length];

    let valid: Vec<f64> = velocity
        .iter()
        .zip(hr)
        .filter(|(v, h)| **v > 0.8 && **h > 40.0)
        .map(|(v, h)| (v * 60.0) / h)
        .collect();
    if valid.len() < 60 {
        return None;
    }
    let average = mean(&valid)?;

    // Per-sample stream with invalid samples zeroed
    let raw_eff: Vec<f64> = velocity
        .iter()
        .zip(hr)
        .map(|(v, h)| {
            if *v > 0.8 && *h > 40.0 {
                (v * 60.0) / h
            } else {
                0.0
            }
        })
        .collect();

    let rolling = boxcar_valid(&raw_eff, SUSTAINED_WINDOW);
    let best_sustained = rolling
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);
    let best_sustained = if best_sustained.is_finite() {
        best_sustained
    } else {
        average
    };

    let curve: Vec<f64> = boxcar_same(&raw_eff, CURVE_WINDOW)
        .into_iter()
        .step_by(10)
        .map(|x| round_to(x, 3))
        .collect();

    Some(EfficiencyAnalysis {
        average: round_to(average, 2),
        best_sustained: round_to(best_sustained, 2),
        curve,
        unit: "m/min/bpm".to_owned(),
    })
}
