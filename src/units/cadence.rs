// ABOUTME: Cadence normalization from strides/min to steps/min
// ABOUTME: Applied on read paths only; stored streams are never mutated
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! Cadence normalization.
//!
//! The provider sometimes reports running cadence as strides per minute
//! (around 80) instead of steps per minute (around 160). Values strictly
//! below the plausibility threshold are doubled, regardless of activity
//! type. Normalization happens at the presentation boundary (detail reads,
//! splits, context pack); stored streams keep the raw values.

/// Cadence below this is assumed to be strides/min
const SPM_PLAUSIBILITY_THRESHOLD: f64 = 130.0;

/// Normalize a single cadence average to steps per minute
#[must_use]
pub fn normalize_spm(avg_cadence: f64) -> f64 {
    if avg_cadence < SPM_PLAUSIBILITY_THRESHOLD {
        avg_cadence * 2.0
    } else {
        avg_cadence
    }
}

/// Normalize a whole cadence stream.
///
/// The decision is made once on the stream average so a mixed stream is
/// either doubled wholesale or left alone, never element-by-element.
#[must_use]
pub fn normalize_stream(samples: &[f64]) -> Vec<f64> {
    if samples.is_empty() {
        return vec![];
    }
    let avg = samples.iter().sum::<f64>() / samples.len() as f64;
    if avg < SPM_PLAUSIBILITY_THRESHOLD {
        samples.iter().map(|c| c * 2.0).collect()
    } else {
        samples.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strides_per_minute_are_doubled() {
        assert_eq!(normalize_spm(80.0), 160.0);
        assert_eq!(normalize_spm(129.9), 259.8);
    }

    #[test]
    fn steps_per_minute_pass_through() {
        assert_eq!(normalize_spm(130.0), 130.0);
        assert_eq!(normalize_spm(172.0), 172.0);
    }

    #[test]
    fn stream_decision_uses_the_average() {
        // average 85: the whole stream doubles, including the outlier
        let doubled = normalize_stream(&[80.0, 85.0, 90.0]);
        assert_eq!(doubled, vec![160.0, 170.0, 180.0]);

        // average over threshold: untouched
        let kept = normalize_stream(&[168.0, 172.0]);
        assert_eq!(kept, vec![168.0, 172.0]);

        assert!(normalize_stream(&[]).is_empty());
    }
}
