// ABOUTME: Interval session structure detection from the velocity stream
// ABOUTME: Bimodal thresholding splits smoothed speed into work/rest segments with per-rep stats
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! Interval detector.
//!
//! Smoothed velocity is split into fast and slow clusters with an iterative
//! bimodal threshold; contiguous labeled runs become work reps and
//! recoveries. The detector only runs for sessions classified `Intervals`
//! and returns `None` whenever the data cannot support at least two reps.

use crate::models::{
    ConsistencyLabel, IntervalStructure, IntervalSummary, RestSegment, StreamSet, WorkSegment,
};
use crate::utils::stats::{boxcar_same, cv_percent, mean, round_to};

/// Smoothing window over the velocity stream, in samples
const SMOOTHING_WINDOW: usize = 30;

/// Smoothed speeds above this count as active (not stopped)
const ACTIVE_VELOCITY: f64 = 0.5;

/// Minimum active samples to attempt detection
const MIN_ACTIVE_SAMPLES: usize = 60;

/// Required separation between the fast and slow cluster means
const CLUSTER_SEPARATION: f64 = 1.3;

/// Work label margin above the threshold
const WORK_MARGIN: f64 = 1.05;

/// Rest label margin below the threshold
const REST_MARGIN: f64 = 0.95;

/// Minimum surviving work rep duration, seconds
const MIN_WORK_DURATION_S: usize = 30;

/// Minimum surviving rest duration, seconds
const MIN_REST_DURATION_S: usize = 15;

/// Minimum leading/trailing interval to call it a warmup or cooldown
const MIN_WARMUP_COOLDOWN_S: usize = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SegmentKind {
    Work,
    Rest,
    Transition,
}

#[derive(Debug, Clone, Copy)]
struct RawSegment {
    kind: SegmentKind,
    start: usize,
    duration: usize,
}

/// Detect work/rest structure in an interval session.
///
/// Returns `None` unless the class is `Intervals`, the velocity stream has
/// at least 60 samples, the speed distribution is convincingly bimodal, and
/// at least two work reps survive duration filtering.
#[must_use]
pub fn detect(streams: &StreamSet, activity_class: &str) -> Option<IntervalStructure> {
    if activity_class != "Intervals" {
        return None;
    }

    let velocity = streams.samples("velocity_smooth")?;
    if velocity.len() < MIN_ACTIVE_SAMPLES {
        return None;
    }
    let hr = streams.samples("heartrate");
    let distance = streams.samples("distance");

    let kernel = SMOOTHING_WINDOW.min(velocity.len());
    let smoothed = boxcar_same(&velocity, kernel);

    let active: Vec<f64> = smoothed
        .iter()
        .copied()
        .filter(|v| *v > ACTIVE_VELOCITY)
        .collect();
    if active.len() < MIN_ACTIVE_SAMPLES {
        return None;
    }

    let threshold = bimodal_threshold(&active)?;
    let work_threshold = threshold * WORK_MARGIN;
    let rest_threshold = threshold * REST_MARGIN;

    let labels: Vec<SegmentKind> = smoothed
        .iter()
        .map(|v| {
            if *v >= work_threshold {
                SegmentKind::Work
            } else if *v <= rest_threshold {
                SegmentKind::Rest
            } else {
                SegmentKind::Transition
            }
        })
        .collect();

    let raw_segments = extract_segments(&labels);

    let work_segs: Vec<RawSegment> = raw_segments
        .iter()
        .copied()
        .filter(|s| s.kind == SegmentKind::Work && s.duration >= MIN_WORK_DURATION_S)
        .collect();
    let rest_segs: Vec<RawSegment> = raw_segments
        .iter()
        .copied()
        .filter(|s| s.kind == SegmentKind::Rest && s.duration >= MIN_REST_DURATION_S)
        .collect();

    if work_segs.len() < 2 {
        return None;
    }

    let first_work_start = work_segs[0].start;
    let last_work_end = work_segs[work_segs.len() - 1].start + work_segs[work_segs.len() - 1].duration;

    let warmup_duration_s = (first_work_start >= MIN_WARMUP_COOLDOWN_S)
        .then_some(first_work_start as i64);
    let trailing = velocity.len().saturating_sub(last_work_end);
    let cooldown_duration_s = (trailing >= MIN_WARMUP_COOLDOWN_S).then_some(trailing as i64);

    // Per-rep details
    let mut work_details: Vec<WorkSegment> = Vec::with_capacity(work_segs.len());
    for (idx, seg) in work_segs.iter().enumerate() {
        let (s, e) = (seg.start, seg.start + seg.duration);
        let distance_m = distance.as_ref().map(|d| {
            let end_idx = e.min(d.len().saturating_sub(1));
            round_to(d[end_idx] - d[s], 1)
        });
        work_details.push(WorkSegment {
            segment_number: idx + 1,
            start_time_s: s as i64,
            duration_s: seg.duration as i64,
            distance_m,
            avg_speed_mps: round_to(mean(clamp_window(&velocity, s, e)).unwrap_or(0.0), 2),
            avg_hr: hr
                .as_deref()
                .and_then(|arr| mean(clamp_window(arr, s, e)))
                .map(|v| round_to(v, 1)),
            peak_hr: hr.as_deref().and_then(|arr| {
                clamp_window(arr, s, e)
                    .iter()
                    .copied()
                    .reduce(f64::max)
                    .map(|v| round_to(v, 1))
            }),
        });
    }

    // Rests between work segments only
    let mut rest_details: Vec<RestSegment> = Vec::new();
    for rest in &rest_segs {
        let rs = rest.start;
        if rs < first_work_start || rs >= last_work_end {
            continue;
        }
        let re = rs + rest.duration;
        let prev_peak_hr = work_details
            .iter()
            .rev()
            .find(|w| (w.start_time_s + w.duration_s) as usize <= rs)
            .and_then(|w| w.peak_hr);
        let avg_rest_hr = hr
            .as_deref()
            .and_then(|arr| mean(&arr[rs.min(arr.len())..re.min(arr.len())]))
            .map(|v| round_to(v, 1));
        rest_details.push(RestSegment {
            segment_number: rest_details.len() + 1,
            duration_s: rest.duration as i64,
            avg_hr: avg_rest_hr,
            hr_recovery_bpm: match (prev_peak_hr, avg_rest_hr) {
                (Some(peak), Some(avg)) => Some(round_to(peak - avg, 1)),
                _ => None,
            },
        });
    }

    let summary = summarize(&work_details, &rest_details);

    Some(IntervalStructure {
        warmup_duration_s,
        cooldown_duration_s,
        work_segments: work_details,
        rest_segments: rest_details,
        summary,
    })
}

/// Iterative bimodal threshold between fast and slow speed clusters.
///
/// Starts at the mean, then repeatedly replaces the threshold with the
/// midpoint of the below/above cluster means: at most 20 iterations or
/// until the change falls under 0.01. Fails when either cluster empties or
/// the final separation is below 30 %.
fn bimodal_threshold(speeds: &[f64]) -> Option<f64> {
    if speeds.len() < 10 {
        return None;
    }

    let cluster_means = |t: f64| -> Option<(f64, f64)> {
        let low: Vec<f64> = speeds.iter().copied().filter(|v| *v <= t).collect();
        let high: Vec<f64> = speeds.iter().copied().filter(|v| *v > t).collect();
        Some((mean(&low)?, mean(&high)?))
    };

    let mut threshold = mean(speeds)?;
    for _ in 0..20 {
        let (low_mean, high_mean) = cluster_means(threshold)?;
        let next = (low_mean + high_mean) / 2.0;
        if (next - threshold).abs() < 0.01 {
            break;
        }
        threshold = next;
    }

    let (low_mean, high_mean) = cluster_means(threshold)?;
    if high_mean < low_mean * CLUSTER_SEPARATION {
        return None;
    }

    Some(threshold)
}

/// Slice `[start, end)` clamped to the array bounds
fn clamp_window(arr: &[f64], start: usize, end: usize) -> &[f64] {
    &arr[start.min(arr.len())..end.min(arr.len())]
}

/// Contiguous same-label runs over the label array
fn extract_segments(labels: &[SegmentKind]) -> Vec<RawSegment> {
    let mut segments = Vec::new();
    let Some(&first) = labels.first() else {
        return segments;
    };

    let mut current = first;
    let mut start = 0usize;
    for (i, kind) in labels.iter().enumerate().skip(1) {
        if *kind != current {
            segments.push(RawSegment {
                kind: current,
                start,
                duration: i - start,
            });
            current = *kind;
            start = i;
        }
    }
    segments.push(RawSegment {
        kind: current,
        start,
        duration: labels.len() - start,
    });
    segments
}

fn summarize(work: &[WorkSegment], rests: &[RestSegment]) -> IntervalSummary {
    let work_durations: Vec<f64> = work.iter().map(|w| w.duration_s as f64).collect();
    let work_speeds: Vec<f64> = work.iter().map(|w| w.avg_speed_mps).collect();
    let rest_durations: Vec<f64> = rests.iter().map(|r| r.duration_s as f64).collect();
    let recoveries: Vec<f64> = rests.iter().filter_map(|r| r.hr_recovery_bpm).collect();

    let total_work: i64 = work.iter().map(|w| w.duration_s).sum();
    let total_rest: i64 = rests.iter().map(|r| r.duration_s).sum();

    let duration_cv = cv_percent(&work_durations).map(|v| round_to(v, 1));
    let speed_cv = cv_percent(&work_speeds).map(|v| round_to(v, 1));

    IntervalSummary {
        total_work_time_s: total_work,
        total_rest_time_s: total_rest,
        work_to_rest_ratio: (total_rest > 0)
            .then(|| round_to(total_work as f64 / total_rest as f64, 2)),
        rep_count: work.len(),
        avg_work_duration_s: mean(&work_durations).map_or(0, |m| m.round() as i64),
        work_duration_cv: duration_cv,
        avg_work_speed_mps: round_to(mean(&work_speeds).unwrap_or(0.0), 2),
        work_speed_cv: speed_cv,
        avg_rest_duration_s: mean(&rest_durations).map(|m| m.round() as i64),
        avg_hr_recovery_bpm: mean(&recoveries).map(|m| round_to(m, 1)),
        consistency_score: consistency_label(duration_cv, speed_cv),
    }
}

/// Consistency from the worse (higher) of the two CVs
fn consistency_label(dur_cv: Option<f64>, speed_cv: Option<f64>) -> ConsistencyLabel {
    let worst = match (dur_cv, speed_cv) {
        (Some(d), Some(s)) => d.max(s),
        (Some(v), None) | (None, Some(v)) => v,
        (None, None) => return ConsistencyLabel::Unknown,
    };
    if worst < 10.0 {
        ConsistencyLabel::High
    } else if worst < 20.0 {
        ConsistencyLabel::Medium
    } else {
        ConsistencyLabel::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// 300 s warmup, 4 x (180 s work @ 4.5, 90 s rest @ 2.0), 180 s cooldown
    fn synthetic_session() -> StreamSet {
        let mut velocity: Vec<f64> = Vec::new();
        velocity.extend(vec![2.0; 300]);
        for rep in 0..4 {
            velocity.extend(vec![4.5; 180]);
            if rep < 3 {
                velocity.extend(vec![2.0; 90]);
            }
        }
        velocity.extend(vec![2.0; 180]);

        // HR tracks effort: high during work, decaying at rest
        let hr: Vec<f64> = velocity
            .iter()
            .map(|v| if *v > 3.0 { 175.0 } else { 135.0 })
            .collect();
        // 1 Hz cumulative distance
        let mut distance = Vec::with_capacity(velocity.len());
        let mut total = 0.0;
        for v in &velocity {
            total += v;
            distance.push(total);
        }

        let mut streams = StreamSet::new();
        streams.insert("velocity_smooth", json!(velocity));
        streams.insert("heartrate", json!(hr));
        streams.insert("distance", json!(distance));
        streams
    }

    #[test]
    fn only_interval_sessions_are_detected() {
        let streams = synthetic_session();
        assert!(detect(&streams, "Easy Run").is_none());
        assert!(detect(&streams, "Intervals").is_some());
    }

    #[test]
    fn detects_reps_warmup_and_cooldown() {
        let structure = detect(&synthetic_session(), "Intervals").unwrap();

        assert_eq!(structure.summary.rep_count, 4);
        assert_eq!(structure.work_segments.len(), 4);
        assert_eq!(structure.rest_segments.len(), 3);

        // Boundaries blur by up to half the smoothing window
        let warmup = structure.warmup_duration_s.unwrap();
        assert!((270..=330).contains(&warmup), "warmup {warmup}");
        let cooldown = structure.cooldown_duration_s.unwrap();
        assert!((150..=210).contains(&cooldown), "cooldown {cooldown}");

        // Work:rest near the designed 2:1 per rep (3 inter-rep rests)
        let ratio = structure.summary.work_to_rest_ratio.unwrap();
        assert!((1.8..=3.2).contains(&ratio), "ratio {ratio}");

        assert!(matches!(
            structure.summary.consistency_score,
            ConsistencyLabel::High | ConsistencyLabel::Medium
        ));

        // Rep invariants
        let total: i64 = structure.work_segments.iter().map(|w| w.duration_s).sum();
        assert_eq!(structure.summary.total_work_time_s, total);
        for w in &structure.work_segments {
            assert!(w.duration_s >= 30);
            assert!(w.avg_speed_mps > 3.0);
        }
    }

    #[test]
    fn hr_recovery_is_peak_minus_rest_mean() {
        let structure = detect(&synthetic_session(), "Intervals").unwrap();
        for rest in &structure.rest_segments {
            let recovery = rest.hr_recovery_bpm.unwrap();
            // peak 175 minus rest mean (135 plus boundary bleed)
            assert!(recovery > 20.0 && recovery <= 40.0, "recovery {recovery}");
        }
    }

    #[test]
    fn steady_pace_is_not_bimodal() {
        let mut streams = StreamSet::new();
        streams.insert("velocity_smooth", json!(vec![3.0; 1200]));
        assert!(detect(&streams, "Intervals").is_none());
    }

    #[test]
    fn short_streams_are_rejected() {
        let mut streams = StreamSet::new();
        streams.insert("velocity_smooth", json!(vec![3.0; 59]));
        assert!(detect(&streams, "Intervals").is_none());
    }

    #[test]
    fn single_rep_is_rejected() {
        let mut velocity = vec![2.0; 300];
        velocity.extend(vec![4.5; 180]);
        velocity.extend(vec![2.0; 300]);
        let mut streams = StreamSet::new();
        streams.insert("velocity_smooth", json!(velocity));
        assert!(detect(&streams, "Intervals").is_none());
    }

    #[test]
    fn threshold_converges_on_bimodal_input() {
        let mut speeds = vec![2.0; 500];
        speeds.extend(vec![4.5; 500]);
        let t = bimodal_threshold(&speeds).unwrap();
        assert!(t > 2.0 && t < 4.5);

        // clearly unimodal: separation check fails
        assert!(bimodal_threshold(&vec![3.0; 100]).is_none());
        // too few samples
        assert!(bimodal_threshold(&[2.0, 4.0]).is_none());
    }
}
