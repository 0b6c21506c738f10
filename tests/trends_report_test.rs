// ABOUTME: Trends aggregation tests over a real database
// ABOUTME: Verifies weekly continuity, gap filling, filters, and the previous-period window
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
#![allow(clippy::unwrap_used)]

mod common;

use chrono::{Datelike, Duration, Utc};

use common::{create_user, test_db, ActivityFixture};
use strideline::processing::engine;
use strideline::trends;

#[tokio::test]
async fn thirty_day_report_fills_empty_weeks() {
    let harness = test_db().await;
    let db = &harness.db;
    let user = create_user(db).await;
    let now = Utc::now();

    // Three activities spread over the 30-day window
    for (i, days_ago) in [2_i64, 12, 25].iter().enumerate() {
        let activity = ActivityFixture::run(user.id, 4000 + i as i64)
            .started_at(now - Duration::days(*days_ago))
            .insert(db)
            .await;
        engine::process_activity(db, activity.id).await.unwrap();
    }

    let today = now.date_naive();
    let report = trends::get_trends_report(db, user.id, "30D", None, today)
        .await
        .unwrap();

    assert_eq!(report.range, "30D");
    assert_eq!(report.summary.activity_count, 3);

    // Weekly series spans [monday(today-30), monday(today)] in 7-day steps
    let since = today - Duration::days(30);
    let monday = |d: chrono::NaiveDate| {
        d - Duration::days(i64::from(d.weekday().num_days_from_monday()))
    };
    let expected_weeks =
        ((monday(today) - monday(since)).num_days() / 7 + 1) as usize;
    assert_eq!(report.weekly_distance.len(), expected_weeks);
    assert_eq!(report.weekly_distance[0].week_start, monday(since));
    assert_eq!(
        report.weekly_distance.last().unwrap().week_start,
        monday(today)
    );
    for pair in report.weekly_distance.windows(2) {
        assert_eq!(pair[1].week_start - pair[0].week_start, Duration::days(7));
    }

    // Weeks without activities report zeros, not gaps
    let empty_weeks = report
        .weekly_distance
        .iter()
        .filter(|w| w.activity_count == 0)
        .count();
    assert!(empty_weeks >= 1);

    // Daily series covers every day of the range
    assert_eq!(report.daily_distance.len(), 31);
    assert_eq!(report.daily_suffer_score.len(), 31);

    // Effort landed on exactly three days
    let effort_days = report
        .daily_suffer_score
        .iter()
        .filter(|p| p.effort_score > 0.0)
        .count();
    assert_eq!(effort_days, 3);
}

#[tokio::test]
async fn previous_period_summary_counts_the_window_before() {
    let harness = test_db().await;
    let db = &harness.db;
    let user = create_user(db).await;
    let now = Utc::now();

    // One activity inside the range, one in the window before it
    ActivityFixture::run(user.id, 4100)
        .started_at(now - Duration::days(3))
        .insert(db)
        .await;
    ActivityFixture::run(user.id, 4101)
        .started_at(now - Duration::days(10))
        .sized(9000, 2700)
        .insert(db)
        .await;

    let report = trends::get_trends_report(db, user.id, "7D", None, now.date_naive())
        .await
        .unwrap();

    assert_eq!(report.summary.activity_count, 1);
    let previous = report.previous_summary.unwrap();
    assert_eq!(previous.activity_count, 1);
    assert_eq!(previous.total_distance_m, 9000);

    // ALL has no previous window
    let all = trends::get_trends_report(db, user.id, "ALL", None, now.date_naive())
        .await
        .unwrap();
    assert!(all.previous_summary.is_none());
    assert_eq!(all.summary.activity_count, 2);
}

#[tokio::test]
async fn soft_deleted_activities_leave_trends() {
    let harness = test_db().await;
    let db = &harness.db;
    let user = create_user(db).await;
    let now = Utc::now();

    let kept = ActivityFixture::run(user.id, 4200)
        .started_at(now - Duration::days(1))
        .insert(db)
        .await;
    let dropped = ActivityFixture::run(user.id, 4201)
        .started_at(now - Duration::days(2))
        .insert(db)
        .await;
    assert_ne!(kept.id, dropped.id);

    db.soft_delete_by_strava_id(4201).await.unwrap();

    let report = trends::get_trends_report(db, user.id, "7D", None, now.date_naive())
        .await
        .unwrap();
    assert_eq!(report.summary.activity_count, 1);
}

#[tokio::test]
async fn type_filter_and_distinct_types() {
    let harness = test_db().await;
    let db = &harness.db;
    let user = create_user(db).await;
    let now = Utc::now();

    ActivityFixture::run(user.id, 4300)
        .started_at(now - Duration::days(1))
        .insert(db)
        .await;
    let mut ride = ActivityFixture::run(user.id, 4301).started_at(now - Duration::days(2));
    ride.activity.activity_type = "Ride".to_owned();
    ride.insert(db).await;

    let types = db.distinct_activity_types().await.unwrap();
    assert_eq!(types, vec!["Ride".to_owned(), "Run".to_owned()]);

    // filter is case-insensitive over the effective type
    let report = trends::get_trends_report(
        db,
        user.id,
        "7D",
        Some(&["ride".to_owned()]),
        now.date_naive(),
    )
    .await
    .unwrap();
    assert_eq!(report.summary.activity_count, 1);
}
