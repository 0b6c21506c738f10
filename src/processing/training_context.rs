// ABOUTME: Seven-day training context: intensity distribution and hard-session recency
// ABOUTME: Categorizes prior sessions by their stored classification
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! Training context.
//!
//! Scans the user's activities in the seven days preceding the current
//! activity's start. Each is categorized by its previously assigned class:
//! `Intervals`, `Tempo`, `Race`, and `Hills` are hard; `Long Run` is
//! moderate; everything else is easy.

use chrono::{DateTime, Duration, Utc};

use crate::models::{Activity, DerivedMetric, TrainingContext};

const HARD_CLASSES: [&str; 4] = ["Intervals", "Tempo", "Race", "Hills"];

/// Build the training context for an activity starting at `start`.
///
/// `prior` holds `(activity, class)` pairs for the user's earlier sessions;
/// entries outside the trailing seven-day window are ignored, so callers
/// can pass a generous history slice.
#[must_use]
pub fn build(start: DateTime<Utc>, prior: &[(Activity, Option<DerivedMetric>)]) -> TrainingContext {
    let window_start = start - Duration::days(7);
    let mut context = TrainingContext::default();
    let mut last_hard: Option<DateTime<Utc>> = None;

    for (activity, metric) in prior {
        if activity.start_date < window_start || activity.start_date >= start {
            continue;
        }
        let class = metric
            .as_ref()
            .map_or("", |m| m.activity_class.as_str());

        if HARD_CLASSES.contains(&class) {
            context.intensity_distribution_7d.hard += 1;
            context.hard_sessions_this_week += 1;
            if last_hard.is_none_or(|prev| activity.start_date > prev) {
                last_hard = Some(activity.start_date);
            }
        } else if class == "Long Run" {
            context.intensity_distribution_7d.moderate += 1;
        } else {
            context.intensity_distribution_7d.easy += 1;
        }
    }

    context.days_since_last_hard = last_hard.map(|t| (start - t).num_days());
    context
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConfidenceLevel, FlagSet, RiskLevel};
    use serde_json::json;
    use uuid::Uuid;

    fn activity_at(start: DateTime<Utc>) -> Activity {
        Activity {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            strava_activity_id: 1,
            start_date: start,
            activity_type: "Run".to_owned(),
            name: "Run".to_owned(),
            distance_m: 5000,
            moving_time_s: 1500,
            elapsed_time_s: 1500,
            elev_gain_m: 0.0,
            avg_hr: None,
            max_hr: None,
            avg_cadence: None,
            average_speed_mps: None,
            user_intent: None,
            raw_summary: json!({}),
            is_deleted: false,
            created_at: start,
            updated_at: start,
        }
    }

    fn metric_with_class(class: &str) -> DerivedMetric {
        DerivedMetric {
            id: Uuid::new_v4(),
            activity_id: Uuid::new_v4(),
            activity_class: class.to_owned(),
            effort_score: 25.0,
            pace_variability: None,
            hr_drift: None,
            time_in_zones: None,
            stops_analysis: None,
            efficiency_analysis: None,
            interval_structure: None,
            workout_match: None,
            interval_kpis: None,
            flags: FlagSet::new(),
            risk_level: RiskLevel::Green,
            risk_score: 0,
            risk_reasons: vec![],
            confidence: ConfidenceLevel::High,
            confidence_reasons: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn categorizes_by_stored_class() {
        let now = Utc::now();
        let prior = vec![
            (
                activity_at(now - Duration::days(1)),
                Some(metric_with_class("Intervals")),
            ),
            (
                activity_at(now - Duration::days(2)),
                Some(metric_with_class("Long Run")),
            ),
            (
                activity_at(now - Duration::days(3)),
                Some(metric_with_class("Easy Run")),
            ),
            (
                activity_at(now - Duration::days(5)),
                Some(metric_with_class("Tempo")),
            ),
        ];

        let context = build(now, &prior);
        assert_eq!(context.intensity_distribution_7d.hard, 2);
        assert_eq!(context.intensity_distribution_7d.moderate, 1);
        assert_eq!(context.intensity_distribution_7d.easy, 1);
        assert_eq!(context.hard_sessions_this_week, 2);
        assert_eq!(context.days_since_last_hard, Some(1));
    }

    #[test]
    fn sessions_outside_the_window_are_ignored() {
        let now = Utc::now();
        let prior = vec![
            (
                activity_at(now - Duration::days(8)),
                Some(metric_with_class("Race")),
            ),
            (activity_at(now + Duration::days(1)), None),
        ];

        let context = build(now, &prior);
        assert_eq!(context.hard_sessions_this_week, 0);
        assert_eq!(context.days_since_last_hard, None);
        assert_eq!(context.intensity_distribution_7d.easy, 0);
    }

    #[test]
    fn unprocessed_sessions_count_as_easy() {
        let now = Utc::now();
        let prior = vec![(activity_at(now - Duration::days(1)), None)];
        let context = build(now, &prior);
        assert_eq!(context.intensity_distribution_7d.easy, 1);
    }
}
