// ABOUTME: Per-kilometre split computation from cumulative distance and time streams
// ABOUTME: Computed on detail reads; cadence is normalized here, never in storage
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! Split calculation.
//!
//! Walks the cumulative distance stream, cutting a split each time a
//! kilometre boundary is crossed. A partial trailing split is reported when
//! more than 100 m remain. HR, grade, and cadence averages are attached
//! when those channels exist.

use serde::{Deserialize, Serialize};

use crate::models::StreamSet;
use crate::units::cadence;
use crate::utils::stats::mean;

/// Default split length in meters
const SPLIT_DISTANCE_M: f64 = 1000.0;

/// A trailing partial split is only shown over this many meters
const MIN_PARTIAL_SPLIT_M: f64 = 100.0;

/// One computed split
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Split {
    /// 1-based split number
    pub split: usize,
    /// Distance covered in this split, meters
    pub distance: f64,
    /// Elapsed seconds in this split
    pub elapsed_time: f64,
    /// Pace in seconds per kilometre
    pub pace: f64,
    /// Speed in m/s
    pub speed: f64,
    /// Average HR over the split
    pub avg_hr: Option<f64>,
    /// Average grade over the split, percent
    pub avg_grade: Option<f64>,
    /// Average cadence over the split, steps/min
    pub avg_cadence: Option<f64>,
}

/// Compute per-kilometre splits for an activity's streams.
///
/// Requires `distance` and `time` channels of equal length; anything else
/// yields an empty list rather than an error.
#[must_use]
pub fn calculate(streams: &StreamSet) -> Vec<Split> {
    let Some(distance) = streams.samples("distance") else {
        return vec![];
    };
    let Some(time) = streams.samples("time") else {
        return vec![];
    };
    let n_points = distance.len();
    if time.len() != n_points || n_points < 2 {
        return vec![];
    }

    let heartrate = streams.samples("heartrate");
    let grade = streams.samples("grade_smooth");
    let cadence_raw = streams.samples("cadence");
    // Strides/min streams double wholesale; stored data stays raw
    let cadence = cadence_raw.map(|c| cadence::normalize_stream(&c));

    let mut splits: Vec<Split> = Vec::new();
    let mut start_idx = 0usize;
    let mut target = SPLIT_DISTANCE_M;
    let mut number = 1usize;

    for i in 1..n_points {
        while distance[i] >= target {
            splits.push(compute_split(
                number,
                start_idx,
                i,
                &distance,
                &time,
                heartrate.as_deref(),
                grade.as_deref(),
                cadence.as_deref(),
            ));
            target += SPLIT_DISTANCE_M;
            start_idx = i;
            number += 1;
            if start_idx >= n_points {
                break;
            }
        }
    }

    // Partial tail over 100 m
    if start_idx < n_points - 1 {
        let total = distance[n_points - 1];
        let covered = (number - 1) as f64 * SPLIT_DISTANCE_M;
        if total - covered > MIN_PARTIAL_SPLIT_M {
            splits.push(compute_split(
                number,
                start_idx,
                n_points,
                &distance,
                &time,
                heartrate.as_deref(),
                grade.as_deref(),
                cadence.as_deref(),
            ));
        }
    }

    splits
}

#[allow(clippy::too_many_arguments)]
fn compute_split(
    number: usize,
    start_idx: usize,
    end_idx: usize,
    distance: &[f64],
    time: &[f64],
    heartrate: Option<&[f64]>,
    grade: Option<&[f64]>,
    cadence: Option<&[f64]>,
) -> Split {
    let last = end_idx.saturating_sub(1);
    let mut dist_diff = distance[last] - distance[start_idx];
    let mut time_diff = time[last] - time[start_idx];
    if time_diff <= 0.0 {
        time_diff = 1.0;
    }
    if dist_diff <= 0.0 {
        dist_diff = 1.0;
    }

    let window_avg = |stream: Option<&[f64]>| -> Option<f64> {
        stream.and_then(|s| mean(&s[start_idx.min(s.len())..end_idx.min(s.len())]))
    };

    Split {
        split: number,
        distance: dist_diff,
        elapsed_time: time_diff,
        pace: time_diff / (dist_diff / 1000.0),
        speed: dist_diff / time_diff,
        avg_hr: window_avg(heartrate),
        avg_grade: window_avg(grade),
        avg_cadence: window_avg(cadence),
    }
}
