// ABOUTME: Rule-ordered activity classification from summary fields and recent history
// ABOUTME: User intent always wins; sport-type fallbacks close the chain
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! Activity classifier.
//!
//! Rules fire in a fixed order: manual intent, trainer detection, the
//! zero-distance indoor-ride heuristic, name keywords, the long-run
//! duration threshold, elevation heuristics, then sport-type fallbacks.

use crate::models::Activity;

/// Long-run floor in seconds (75 minutes)
const LONG_RUN_FLOOR_S: f64 = 4500.0;

/// Long run also means 1.3x the recent average duration
const LONG_RUN_HISTORY_FACTOR: f64 = 1.3;

/// Gain per km that alone marks a hilly session
const HILLY_GAIN_PER_KM: f64 = 20.0;

/// Gain per km that marks hills when effort is also high
const ROLLING_GAIN_PER_KM: f64 = 15.0;

/// Classify one activity against its recent history.
///
/// `history` is the window of prior activities used for the long-run
/// threshold; entries with zero moving time are ignored.
#[must_use]
pub fn classify(activity: &Activity, history: &[Activity]) -> String {
    // 1. User intent override
    if let Some(intent) = &activity.user_intent {
        return intent.clone();
    }

    let sport_type = activity.sport_type();

    // 2. Trainer detection
    if activity.is_trainer() {
        if sport_type == "Ride" {
            return "Indoor Ride".to_owned();
        }
        if sport_type == "Run" {
            return "Treadmill".to_owned();
        }
    }

    // 3. Ride with no distance but elapsed time is a trainer without the flag
    if sport_type == "Ride" && activity.distance_m == 0 && activity.moving_time_s > 60 {
        return "Indoor Ride".to_owned();
    }

    // 4. Name keywords
    let name_lower = activity.name.to_lowercase();
    if !name_lower.is_empty() {
        if name_lower.contains("race") {
            return "Race".to_owned();
        }
        if name_lower.contains("workout") || name_lower.contains("interval") {
            return "Intervals".to_owned();
        }
        if name_lower.contains("hill") {
            return "Hills".to_owned();
        }
        if name_lower.contains("recovery") {
            return "Recovery".to_owned();
        }
    }

    // 5. Long run: over 75 minutes, or 1.3x the recent average
    let recent_durations: Vec<f64> = history
        .iter()
        .filter(|a| a.moving_time_s > 0)
        .map(|a| a.moving_time_s as f64)
        .collect();
    let avg_duration = if recent_durations.is_empty() {
        0.0
    } else {
        recent_durations.iter().sum::<f64>() / recent_durations.len() as f64
    };
    let threshold_s = LONG_RUN_FLOOR_S.max(avg_duration * LONG_RUN_HISTORY_FACTOR);
    if activity.moving_time_s as f64 > threshold_s {
        return "Long Run".to_owned();
    }

    // 6. Elevation heuristics
    if activity.distance_m > 0 {
        let km = activity.distance_m as f64 / 1000.0;
        let gain_per_km = activity.elev_gain_m / km;

        if gain_per_km > HILLY_GAIN_PER_KM {
            return "Hills".to_owned();
        }
        if gain_per_km > ROLLING_GAIN_PER_KM
            && activity.avg_hr.is_some_and(|hr| hr > 150.0)
        {
            return "Hills".to_owned();
        }
    }

    // 7. Sport-type fallbacks
    match sport_type.as_str() {
        "Ride" => "Easy Ride".to_owned(),
        "Walk" => "Leisure Walk".to_owned(),
        "Swim" => "Endurance".to_owned(),
        "Workout" | "WeightTraining" => "Strength".to_owned(),
        // 8. Default for runs and unknown types
        _ => "Easy Run".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn activity() -> Activity {
        Activity {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            strava_activity_id: 1,
            start_date: Utc::now(),
            activity_type: "Run".to_owned(),
            name: "Morning Run".to_owned(),
            distance_m: 8000,
            moving_time_s: 2400,
            elapsed_time_s: 2400,
            elev_gain_m: 20.0,
            avg_hr: None,
            max_hr: None,
            avg_cadence: None,
            average_speed_mps: None,
            user_intent: None,
            raw_summary: json!({}),
            is_deleted: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn history_of(durations: &[i64]) -> Vec<Activity> {
        durations
            .iter()
            .map(|d| {
                let mut a = activity();
                a.moving_time_s = *d;
                a
            })
            .collect()
    }

    #[test]
    fn user_intent_always_wins() {
        let mut a = activity();
        a.user_intent = Some("Tempo".to_owned());
        a.name = "Race day!".to_owned();
        assert_eq!(classify(&a, &[]), "Tempo");
    }

    #[test]
    fn trainer_flag_routes_by_sport() {
        let mut a = activity();
        a.raw_summary = json!({"trainer": true, "sport_type": "Ride"});
        assert_eq!(classify(&a, &[]), "Indoor Ride");

        a.raw_summary = json!({"trainer": true, "sport_type": "Run"});
        assert_eq!(classify(&a, &[]), "Treadmill");
    }

    #[test]
    fn zero_distance_ride_is_indoor() {
        let mut a = activity();
        a.raw_summary = json!({"sport_type": "Ride"});
        a.distance_m = 0;
        a.moving_time_s = 1800;
        assert_eq!(classify(&a, &[]), "Indoor Ride");
    }

    #[test]
    fn name_keywords_classify() {
        let mut a = activity();
        a.name = "Sunday RACE 10k".to_owned();
        assert_eq!(classify(&a, &[]), "Race");

        a.name = "Track workout 8x400".to_owned();
        assert_eq!(classify(&a, &[]), "Intervals");

        a.name = "Hill repeats".to_owned();
        assert_eq!(classify(&a, &[]), "Hills");

        a.name = "Recovery shakeout".to_owned();
        assert_eq!(classify(&a, &[]), "Recovery");
    }

    #[test]
    fn long_run_boundary_is_exclusive() {
        let mut a = activity();
        a.moving_time_s = 4500;
        assert_eq!(classify(&a, &[]), "Easy Run");

        a.moving_time_s = 4501;
        assert_eq!(classify(&a, &[]), "Long Run");
    }

    #[test]
    fn long_run_respects_history_average() {
        let mut a = activity();
        // history avg 4000 -> threshold max(4500, 5200) = 5200
        a.moving_time_s = 5000;
        assert_eq!(classify(&a, &history_of(&[4000, 4000, 4000])), "Easy Run");

        a.moving_time_s = 5400;
        assert_eq!(classify(&a, &history_of(&[4000, 4000, 4000])), "Long Run");
    }

    #[test]
    fn elevation_marks_hills() {
        let mut a = activity();
        a.distance_m = 10_000;
        a.elev_gain_m = 210.0; // 21 m/km
        assert_eq!(classify(&a, &[]), "Hills");

        a.elev_gain_m = 160.0; // 16 m/km, needs high HR
        a.avg_hr = None;
        assert_eq!(classify(&a, &[]), "Easy Run");
        a.avg_hr = Some(155.0);
        assert_eq!(classify(&a, &[]), "Hills");
    }

    #[test]
    fn sport_fallbacks_close_the_chain() {
        let mut a = activity();
        for (sport, expected) in [
            ("Ride", "Easy Ride"),
            ("Walk", "Leisure Walk"),
            ("Swim", "Endurance"),
            ("Workout", "Strength"),
            ("WeightTraining", "Strength"),
        ] {
            a.raw_summary = json!({"sport_type": sport});
            assert_eq!(classify(&a, &[]), expected, "sport {sport}");
        }

        a.raw_summary = json!({});
        assert_eq!(classify(&a, &[]), "Easy Run");
    }
}
