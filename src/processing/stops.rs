// ABOUTME: Stop detection from the moving/time streams
// ABOUTME: Groups contiguous not-moving regions with location and distance context
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! Stop analysis.
//!
//! When the `moving` stream is absent, continuous motion is assumed and no
//! stops are detectable, so the analysis returns `None`.

use crate::models::{StopEvent, StopsAnalysis, StreamSet};

/// Analyze stops from the `moving` and `time` streams.
///
/// Walks the `moving` array, grouping contiguous `false` regions. Each stop
/// records its start time, duration from the time stream, and (when the
/// streams exist) the position and cumulative distance at stop start. An
/// activity with no stops yields zeroed totals and an empty list.
#[must_use]
pub fn analyze(streams: &StreamSet) -> Option<StopsAnalysis> {
    let moving = streams.bools("moving")?;
    let time = streams.samples("time")?;
    if moving.len() != time.len() {
        return None;
    }

    let latlng = streams.latlng();
    let distance = streams.samples("distance");

    let mut stops: Vec<StopEvent> = Vec::new();
    let mut stop_start: Option<usize> = None;

    let record = |start_idx: usize, end_idx: usize, stops: &mut Vec<StopEvent>| {
        let duration = time[end_idx] - time[start_idx];
        if duration <= 0.0 {
            return;
        }
        let location = latlng
            .as_ref()
            .and_then(|pairs| pairs.get(start_idx).copied().flatten());
        let distance_m = distance
            .as_ref()
            .and_then(|d| d.get(start_idx).copied());
        stops.push(StopEvent {
            start_time: time[start_idx],
            duration_s: duration,
            location,
            distance_m,
        });
    };

    for (i, is_moving) in moving.iter().enumerate() {
        if *is_moving {
            if let Some(start_idx) = stop_start.take() {
                // Stop ended at the previous index
                record(start_idx, i - 1, &mut stops);
            }
        } else if stop_start.is_none() {
            stop_start = Some(i);
        }
    }

    // Stop running through the very end of the recording
    if let Some(start_idx) = stop_start {
        record(start_idx, time.len() - 1, &mut stops);
    }

    let total: f64 = stops.iter().map(|s| s.duration_s).sum();
    let longest = stops.iter().map(|s| s.duration_s).fold(0.0, f64::max);

    Some(StopsAnalysis {
        total_stopped_time_s: total,
        stopped_count: stops.len() as i64,
        longest_stop_s: longest,
        stops,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn streams_with(moving: Vec<bool>, time: Vec<f64>) -> StreamSet {
        let mut streams = StreamSet::new();
        streams.insert("moving", json!(moving));
        streams.insert("time", json!(time));
        streams
    }

    #[test]
    fn no_moving_stream_means_no_analysis() {
        let mut streams = StreamSet::new();
        streams.insert("time", json!([0, 1, 2]));
        assert!(analyze(&streams).is_none());
    }

    #[test]
    fn mismatched_lengths_mean_no_analysis() {
        let streams = streams_with(vec![true, false], vec![0.0, 1.0, 2.0]);
        assert!(analyze(&streams).is_none());
    }

    #[test]
    fn continuous_motion_yields_zero_totals() {
        let streams = streams_with(vec![true; 10], (0..10).map(f64::from).collect());
        let result = analyze(&streams).unwrap();
        assert_eq!(result.stopped_count, 0);
        assert_eq!(result.total_stopped_time_s, 0.0);
        assert_eq!(result.longest_stop_s, 0.0);
        assert!(result.stops.is_empty());
    }

    #[test]
    fn groups_contiguous_stopped_regions() {
        // moving: 3 s, stopped covering time 3..5, moving, stopped at tail 7..9
        let moving = vec![true, true, true, false, false, true, true, false, false, false];
        let time: Vec<f64> = (0..10).map(f64::from).collect();
        let mut streams = streams_with(moving, time);
        streams.insert("latlng", json!(vec![[48.0, 2.0]; 10]));
        streams.insert("distance", json!((0..10).map(|i| i * 5).collect::<Vec<_>>()));

        let result = analyze(&streams).unwrap();
        assert_eq!(result.stopped_count, 2);
        // first stop: indices 3..=4 -> duration 1; tail stop: 7..=9 -> duration 2
        assert_eq!(result.stops[0].start_time, 3.0);
        assert_eq!(result.stops[0].duration_s, 1.0);
        assert_eq!(result.stops[1].start_time, 7.0);
        assert_eq!(result.stops[1].duration_s, 2.0);
        assert_eq!(result.total_stopped_time_s, 3.0);
        assert_eq!(result.longest_stop_s, 2.0);
        assert_eq!(result.stops[0].location, Some([48.0, 2.0]));
        assert_eq!(result.stops[0].distance_m, Some(15.0));
    }

    #[test]
    fn single_sample_stops_are_ignored() {
        // a lone false between trues spans zero seconds
        let streams = streams_with(
            vec![true, false, true],
            vec![0.0, 1.0, 2.0],
        );
        let result = analyze(&streams).unwrap();
        assert_eq!(result.stopped_count, 0);
    }
}
