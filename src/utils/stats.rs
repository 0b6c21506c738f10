// ABOUTME: Numeric helpers for stream analysis: mean, deviation, CV, boxcar smoothing
// ABOUTME: Small, allocation-light replacements for the array math the analyses need
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! Shared numeric helpers for the processing pipeline.
//!
//! Boxcar smoothing mirrors a uniform-kernel convolution: `boxcar_same`
//! keeps the input length (window centered, edges averaged over the
//! overlapping part of the kernel), `boxcar_valid` yields only fully
//! covered windows.

/// Arithmetic mean. `None` for an empty slice.
#[must_use]
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation (divisor `n`). `None` for an empty slice.
#[must_use]
pub fn std_population(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    Some(var.sqrt())
}

/// Sample standard deviation (divisor `n - 1`). `None` below two samples.
#[must_use]
pub fn std_sample(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let var =
        values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() as f64 - 1.0);
    Some(var.sqrt())
}

/// Coefficient of variation as a percentage, using the sample deviation.
/// `None` below two samples or when the mean is zero.
#[must_use]
pub fn cv_percent(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    if m == 0.0 {
        return None;
    }
    Some(std_sample(values)? / m * 100.0)
}

/// Median of a slice. `None` for an empty slice.
#[must_use]
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Uniform moving average keeping the input length (window centered).
///
/// Matches a uniform-kernel convolution in "same" mode: near the edges the
/// average runs over the part of the kernel that overlaps the signal, still
/// divided by the full window width.
#[must_use]
pub fn boxcar_same(values: &[f64], window: usize) -> Vec<f64> {
    let n = values.len();
    if n == 0 || window == 0 {
        return vec![];
    }
    let w = window.min(n);
    let offset = (w - 1) / 2;
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let center = i + offset;
        let lo = center.saturating_sub(w - 1);
        let hi = center.min(n - 1);
        let sum: f64 = values[lo..=hi].iter().sum();
        out.push(sum / w as f64);
    }
    out
}

/// Uniform moving average over fully covered windows only.
/// Empty when the window exceeds the input length.
#[must_use]
pub fn boxcar_valid(values: &[f64], window: usize) -> Vec<f64> {
    let n = values.len();
    if window == 0 || window > n {
        return vec![];
    }
    let mut out = Vec::with_capacity(n - window + 1);
    let mut sum: f64 = values[..window].iter().sum();
    out.push(sum / window as f64);
    for i in window..n {
        sum += values[i] - values[i - window];
        out.push(sum / window as f64);
    }
    out
}

/// Round to the given number of decimal places
#[must_use]
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}
