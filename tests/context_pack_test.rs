// ABOUTME: Context pack integration tests: shape, hash stability, zone calibration
// ABOUTME: The pack is the read-only contract with the external coaching layer
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
#![allow(clippy::unwrap_used)]

mod common;

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use common::{create_user, insert_streams, test_db, ActivityFixture};
use strideline::context::{build_context_pack, hash_context_pack};
use strideline::models::UserProfile;
use strideline::processing::engine;

#[tokio::test]
async fn pack_has_every_top_level_key() {
    let harness = test_db().await;
    let db = &harness.db;
    let user = create_user(db).await;
    let activity = ActivityFixture::run(user.id, 5001).insert(db).await;
    engine::process_activity(db, activity.id).await.unwrap();

    let pack = build_context_pack(db, &activity).await.unwrap();

    for key in [
        "activity",
        "metrics",
        "check_in",
        "profile",
        "training_context",
        "recent_training_summary",
        "safety_rules",
        "available_signals",
        "missing_signals",
    ] {
        assert!(pack.get(key).is_some(), "missing top-level key {key}");
    }

    assert_eq!(pack["safety_rules"]["never_diagnose"], json!(true));
    assert_eq!(pack["safety_rules"]["pain_severe_threshold"], json!(7));
    assert_eq!(pack["activity"]["type"], json!("Run"));
    assert_eq!(pack["metrics"]["activity_class"], json!("Easy Run"));
    for window in ["last_7d", "last_28d", "previous_28d"] {
        assert!(pack["recent_training_summary"][window]["activity_count"].is_number());
    }
}

#[tokio::test]
async fn hash_is_reproducible_across_invocations() {
    let harness = test_db().await;
    let db = &harness.db;
    let user = create_user(db).await;
    let activity = ActivityFixture::run(user.id, 5002).insert(db).await;
    engine::process_activity(db, activity.id).await.unwrap();

    let first = build_context_pack(db, &activity).await.unwrap();
    let second = build_context_pack(db, &activity).await.unwrap();
    assert_eq!(hash_context_pack(&first), hash_context_pack(&second));
}

#[tokio::test]
async fn calibrated_zones_change_basis_and_hash() {
    let harness = test_db().await;
    let db = &harness.db;
    let user = create_user(db).await;
    let activity = ActivityFixture::run(user.id, 5003).insert(db).await;
    engine::process_activity(db, activity.id).await.unwrap();

    let uncalibrated = build_context_pack(db, &activity).await.unwrap();
    assert_eq!(uncalibrated["metrics"]["zones_calibrated"], json!(false));
    assert_eq!(uncalibrated["metrics"]["zones_basis"], json!("uncalibrated"));

    let mut profile = UserProfile::default_for(user.id);
    profile.max_hr = Some(188);
    profile.max_hr_source = Some("lab_test".to_owned());
    db.upsert_profile(&profile).await.unwrap();

    let calibrated = build_context_pack(db, &activity).await.unwrap();
    assert_eq!(calibrated["metrics"]["zones_calibrated"], json!(true));
    assert_eq!(calibrated["metrics"]["zones_basis"], json!("user_lab_test"));
    assert_ne!(
        hash_context_pack(&uncalibrated),
        hash_context_pack(&calibrated)
    );
}

#[tokio::test]
async fn signals_reflect_stored_streams() {
    let harness = test_db().await;
    let db = &harness.db;
    let user = create_user(db).await;
    let activity = ActivityFixture::run(user.id, 5004).insert(db).await;
    insert_streams(
        db,
        activity.id,
        &[
            ("heartrate", json!([150, 151])),
            ("latlng", json!([[48.0, 2.0], [48.0, 2.0]])),
            ("distance", json!([0.0, 4.0])),
        ],
    )
    .await;

    let pack = build_context_pack(db, &activity).await.unwrap();
    let available: Vec<String> = pack["available_signals"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_owned())
        .collect();
    assert!(available.contains(&"heart_rate".to_owned()));
    assert!(available.contains(&"gps".to_owned()));
    assert!(available.contains(&"splits".to_owned()));

    let missing: Vec<String> = pack["missing_signals"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_owned())
        .collect();
    assert!(missing.contains(&"weather".to_owned()));
    assert!(missing.contains(&"power".to_owned()));
}

#[tokio::test]
async fn check_in_appears_by_value() {
    let harness = test_db().await;
    let db = &harness.db;
    let user = create_user(db).await;
    let activity = ActivityFixture::run(user.id, 5005).insert(db).await;

    db.upsert_check_in(&strideline::models::CheckIn {
        id: Uuid::new_v4(),
        activity_id: activity.id,
        rpe: Some(7),
        pain_score: Some(2),
        pain_location: None,
        sleep_quality: Some(6),
        notes: Some("felt strong".to_owned()),
        created_at: Utc::now(),
    })
    .await
    .unwrap();

    let pack = build_context_pack(db, &activity).await.unwrap();
    assert_eq!(pack["check_in"]["rpe"], json!(7));
    assert_eq!(pack["check_in"]["notes"], json!("felt strong"));
}
