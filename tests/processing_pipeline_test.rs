// ABOUTME: End-to-end processing tests over a real database
// ABOUTME: Covers classification, effort, flags, risk, confidence, and idempotence
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
#![allow(clippy::unwrap_used)]

mod common;

use chrono::{Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use common::{comparable, create_user, insert_streams, test_db, ActivityFixture};
use strideline::models::{CheckIn, ConfidenceLevel, Flag, RiskLevel};
use strideline::processing::engine;

#[tokio::test]
async fn easy_run_with_hr_only() {
    let harness = test_db().await;
    let db = &harness.db;
    let user = create_user(db).await;

    // 5 km in 1500 s, avg 150 / max 200, no streams
    let activity = ActivityFixture::run(user.id, 1001).insert(db).await;

    let metric = engine::process_activity(db, activity.id)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(metric.activity_class, "Easy Run");
    // 25 min * (0.75)^3 * 10
    assert!((metric.effort_score - 105.5).abs() < 1e-9);
    // 0.75 is under the 0.8 intensity threshold
    assert!(!metric.flags.contains(&Flag::IntensityMismatch));
    assert!(!metric.flags.contains(&Flag::DataLowConfidenceHr));
    assert_eq!(metric.confidence, ConfidenceLevel::Medium);
    assert!(metric
        .confidence_reasons
        .contains(&"no_stream_data".to_owned()));
    // stream-dependent metrics are null, effort is not
    assert!(metric.pace_variability.is_none());
    assert!(metric.hr_drift.is_none());
    assert!(metric.time_in_zones.is_none());
}

#[tokio::test]
async fn long_run_classification_without_history() {
    let harness = test_db().await;
    let db = &harness.db;
    let user = create_user(db).await;

    let activity = ActivityFixture::run(user.id, 1002)
        .sized(18_000, 5400)
        .with_elevation(50.0)
        .insert(db)
        .await;

    let metric = engine::process_activity(db, activity.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(metric.activity_class, "Long Run");
}

#[tokio::test]
async fn severe_pain_checkin_drives_red_risk() {
    let harness = test_db().await;
    let db = &harness.db;
    let user = create_user(db).await;
    let activity = ActivityFixture::run(user.id, 1003).insert(db).await;

    db.upsert_check_in(&CheckIn {
        id: Uuid::new_v4(),
        activity_id: activity.id,
        rpe: Some(6),
        pain_score: Some(8),
        pain_location: Some("left knee".to_owned()),
        sleep_quality: Some(7),
        notes: None,
        created_at: Utc::now(),
    })
    .await
    .unwrap();

    let metric = engine::process_activity(db, activity.id)
        .await
        .unwrap()
        .unwrap();

    assert!(metric.flags.contains(&Flag::PainSevere));
    assert!(metric.flags.contains(&Flag::PainReported));
    assert!(metric.risk_score >= 4);
    assert_eq!(metric.risk_level, RiskLevel::Red);
    assert!(metric
        .risk_reasons
        .iter()
        .any(|r| r.starts_with("pain_severe")));
}

#[tokio::test]
async fn missing_hr_flags_and_reasons_agree() {
    let harness = test_db().await;
    let db = &harness.db;
    let user = create_user(db).await;
    let activity = ActivityFixture::run(user.id, 1004)
        .with_hr(None, None)
        .insert(db)
        .await;

    let metric = engine::process_activity(db, activity.id)
        .await
        .unwrap()
        .unwrap();

    assert!(metric.flags.contains(&Flag::DataLowConfidenceHr));
    assert!(metric
        .confidence_reasons
        .contains(&"no_heart_rate_data".to_owned()));
    // no HR and no streams are two critical reasons
    assert_eq!(metric.confidence, ConfidenceLevel::Low);
    // effort falls back to minutes
    assert!((metric.effort_score - 25.0).abs() < 1e-9);
}

#[tokio::test]
async fn processing_twice_is_field_identical() {
    let harness = test_db().await;
    let db = &harness.db;
    let user = create_user(db).await;
    let activity = ActivityFixture::run(user.id, 1005).insert(db).await;

    let hr: Vec<f64> = (0..1200).map(|i| 140.0 + f64::from(i % 20)).collect();
    let velocity: Vec<f64> = (0..1200).map(|i| 3.0 + f64::from(i % 7) * 0.1).collect();
    insert_streams(
        db,
        activity.id,
        &[
            ("heartrate", json!(hr)),
            ("velocity_smooth", json!(velocity)),
            ("time", json!((0..1200).collect::<Vec<i64>>())),
            ("moving", json!(vec![true; 1200])),
        ],
    )
    .await;

    let first = engine::process_activity(db, activity.id)
        .await
        .unwrap()
        .unwrap();
    let second = engine::process_activity(db, activity.id)
        .await
        .unwrap()
        .unwrap();

    // same row, rewritten in place
    assert_eq!(first.id, second.id);
    assert_eq!(comparable(&first), comparable(&second));
}

#[tokio::test]
async fn intent_set_and_revert_restores_classification() {
    let harness = test_db().await;
    let db = &harness.db;
    let user = create_user(db).await;
    let activity = ActivityFixture::run(user.id, 1006).insert(db).await;

    let original = engine::process_activity(db, activity.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(original.activity_class, "Easy Run");

    db.set_user_intent(activity.id, Some("Tempo")).await.unwrap();
    let overridden = engine::process_activity(db, activity.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(overridden.activity_class, "Tempo");

    db.set_user_intent(activity.id, None).await.unwrap();
    let reverted = engine::process_activity(db, activity.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reverted.activity_class, original.activity_class);
}

#[tokio::test]
async fn load_spike_uses_processed_history() {
    let harness = test_db().await;
    let db = &harness.db;
    let user = create_user(db).await;
    let now = Utc::now();

    // A week of short easy runs, processed so their efforts are on record
    for i in 0..5 {
        let prior = ActivityFixture::run(user.id, 2000 + i)
            .started_at(now - Duration::days(i + 1))
            .sized(4000, 1200)
            .insert(db)
            .await;
        engine::process_activity(db, prior.id).await.unwrap();
    }

    // Then a massive session
    let big = ActivityFixture::run(user.id, 2100)
        .started_at(now)
        .sized(30_000, 9000)
        .insert(db)
        .await;
    let metric = engine::process_activity(db, big.id).await.unwrap().unwrap();

    assert!(metric.flags.contains(&Flag::LoadSpike));
    assert!(metric.risk_score >= 3);
}

#[tokio::test]
async fn interval_session_produces_structure_and_kpis() {
    let harness = test_db().await;
    let db = &harness.db;
    let user = create_user(db).await;

    let activity = ActivityFixture::run(user.id, 3001)
        .named("Track workout 4x800")
        .sized(8000, 1470)
        .insert(db)
        .await;

    // 300 s warmup, 4 x (180 s @ 4.5 / 90 s @ 2.0), 180 s cooldown
    let mut velocity: Vec<f64> = vec![2.0; 300];
    for rep in 0..4 {
        velocity.extend(vec![4.5; 180]);
        if rep < 3 {
            velocity.extend(vec![2.0; 90]);
        }
    }
    velocity.extend(vec![2.0; 180]);
    let n = velocity.len();
    let hr: Vec<f64> = velocity
        .iter()
        .map(|v| if *v > 3.0 { 176.0 } else { 134.0 })
        .collect();
    let mut distance = Vec::with_capacity(n);
    let mut total = 0.0;
    for v in &velocity {
        total += v;
        distance.push(total);
    }

    insert_streams(
        db,
        activity.id,
        &[
            ("velocity_smooth", json!(velocity)),
            ("heartrate", json!(hr)),
            ("distance", json!(distance)),
            ("time", json!((0..n).collect::<Vec<usize>>())),
        ],
    )
    .await;

    let metric = engine::process_activity(db, activity.id)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(metric.activity_class, "Intervals");
    let structure = metric.interval_structure.unwrap();
    assert_eq!(structure.summary.rep_count, 4);
    assert!(structure.warmup_duration_s.is_some());
    assert!(structure.cooldown_duration_s.is_some());

    let kpis = metric.interval_kpis.unwrap();
    assert!(kpis.rep_pace_consistency_cv.is_some());
    assert!(kpis.first_vs_last_fade.is_some());
    // zones are not calibrated for this user
    assert!(kpis.total_z4_plus_s.is_none());

    // no plan on record: the matcher grades detection quality alone
    let workout_match = metric.workout_match.unwrap();
    assert!(workout_match.match_score.is_none());
    assert!(workout_match
        .confidence_reasons
        .contains(&"no_planned_workout".to_owned()));
    assert!(workout_match.detected_workout.is_some());
}

#[tokio::test]
async fn missing_activity_processes_to_none() {
    let harness = test_db().await;
    let result = engine::process_activity(&harness.db, Uuid::new_v4())
        .await
        .unwrap();
    assert!(result.is_none());
}
