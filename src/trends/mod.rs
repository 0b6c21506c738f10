// ABOUTME: Trends pipeline: activity rows into daily/weekly aggregated facts
// ABOUTME: Timelines are continuous per requested range, with zero-filled gaps
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! Trends aggregation.
//!
//! All grouping uses the activity's local start date. Multiple activities
//! on one date sum. Weekly buckets key on the ISO-week Monday and cover the
//! full requested range contiguously, as do the continuous daily series.
//! The aggregator is read-only: it consults derived metrics loaded with the
//! activities and writes nothing.

use chrono::{Datelike, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::database::Database;
use crate::models::{Activity, DerivedMetric, TimeInZones};
use crate::utils::stats::round_to;

/// Recognized range keys and their day spans (`ALL` is unbounded)
const RANGE_DAYS: [(&str, i64); 5] = [
    ("7D", 7),
    ("30D", 30),
    ("3M", 90),
    ("6M", 180),
    ("1Y", 365),
];

/// One row per activity: the minimal projection the charts need
#[derive(Debug, Clone)]
pub struct ActivityFact {
    /// Source activity
    pub activity_id: Uuid,
    /// Local calendar date of the start
    pub local_date: NaiveDate,
    /// Provider-reported type
    pub activity_type: String,
    /// Manual override, when set
    pub user_intent: Option<String>,
    /// Distance in meters
    pub distance_m: i64,
    /// Moving time in seconds
    pub moving_time_s: i64,
    /// Elapsed time in seconds
    pub elapsed_time_s: i64,
    /// Elevation gain in meters
    pub elev_gain_m: f64,
    /// Average HR
    pub avg_hr: Option<f64>,
    /// Average speed in m/s
    pub average_speed_mps: Option<f64>,
    /// Effort score from the derived metric
    pub effort_score: Option<f64>,
    /// Zone seconds from the derived metric
    pub time_in_zones: Option<TimeInZones>,
}

impl ActivityFact {
    fn new(activity: &Activity, metric: Option<&DerivedMetric>) -> Self {
        Self {
            activity_id: activity.id,
            local_date: activity.start_date.date_naive(),
            activity_type: activity.activity_type.clone(),
            user_intent: activity.user_intent.clone(),
            distance_m: activity.distance_m,
            moving_time_s: activity.moving_time_s,
            elapsed_time_s: activity.elapsed_time_s,
            elev_gain_m: activity.elev_gain_m,
            avg_hr: activity.avg_hr,
            average_speed_mps: activity.average_speed_mps,
            effort_score: metric.map(|m| m.effort_score),
            time_in_zones: metric.and_then(|m| m.time_in_zones),
        }
    }

    /// Manual intent when set, otherwise the provider type
    #[must_use]
    pub fn effective_type(&self) -> &str {
        self.user_intent.as_deref().unwrap_or(&self.activity_type)
    }
}

/// One row per local date, summed across activities
#[derive(Debug, Clone)]
pub struct DailyFact {
    /// Calendar date
    pub local_date: NaiveDate,
    /// Summed distance
    pub total_distance_m: i64,
    /// Summed moving time
    pub total_moving_time_s: i64,
    /// Summed elapsed time
    pub total_elapsed_time_s: i64,
    /// Summed elevation gain
    pub total_elev_gain_m: f64,
    /// Summed effort score
    pub total_effort_score: f64,
    /// Activities on this date
    pub activity_count: i64,
}

impl DailyFact {
    fn empty(local_date: NaiveDate) -> Self {
        Self {
            local_date,
            total_distance_m: 0,
            total_moving_time_s: 0,
            total_elapsed_time_s: 0,
            total_elev_gain_m: 0.0,
            total_effort_score: 0.0,
            activity_count: 0,
        }
    }

    fn add(&mut self, fact: &ActivityFact) {
        self.total_distance_m += fact.distance_m;
        self.total_moving_time_s += fact.moving_time_s;
        self.total_elapsed_time_s += fact.elapsed_time_s;
        self.total_elev_gain_m += fact.elev_gain_m;
        self.total_effort_score += fact.effort_score.unwrap_or(0.0);
        self.activity_count += 1;
    }
}

/// Aggregation bucket for one ISO week (Monday keyed)
#[derive(Debug, Clone)]
pub struct WeekBucket {
    /// Monday of the ISO week
    pub week_start: NaiveDate,
    /// Summed distance
    pub total_distance_m: i64,
    /// Summed moving time
    pub total_moving_time_s: i64,
    /// Summed effort score
    pub total_effort_score: f64,
    /// Activities in this week
    pub activity_count: i64,
}

impl WeekBucket {
    fn empty(week_start: NaiveDate) -> Self {
        Self {
            week_start,
            total_distance_m: 0,
            total_moving_time_s: 0,
            total_effort_score: 0.0,
            activity_count: 0,
        }
    }
}

// ── Response shapes ─────────────────────────────────────────────────────

/// Totals across a window
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrendsSummary {
    /// Summed distance
    pub total_distance_m: i64,
    /// Summed moving time
    pub total_moving_time_s: i64,
    /// Activity count
    pub activity_count: i64,
    /// Summed effort score
    pub total_suffer_score: f64,
}

/// Per-week distance point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyDistancePoint {
    /// Monday of the week
    pub week_start: NaiveDate,
    /// Summed distance
    pub total_distance_m: i64,
    /// Activities in the week
    pub activity_count: i64,
}

/// Per-week moving-time point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyTimePoint {
    /// Monday of the week
    pub week_start: NaiveDate,
    /// Summed moving time
    pub total_moving_time_s: i64,
    /// Activities in the week
    pub activity_count: i64,
}

/// Per-week effort point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklySufferScorePoint {
    /// Monday of the week
    pub week_start: NaiveDate,
    /// Summed effort score
    pub effort_score: f64,
}

/// Per-day distance point (continuous)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyDistancePoint {
    /// Calendar date
    pub date: NaiveDate,
    /// Summed distance
    pub total_distance_m: i64,
    /// Activities on the date
    pub activity_count: i64,
}

/// Per-day moving-time point (continuous)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyTimePoint {
    /// Calendar date
    pub date: NaiveDate,
    /// Summed moving time
    pub total_moving_time_s: i64,
    /// Activities on the date
    pub activity_count: i64,
}

/// Per-activity effort point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SufferScorePoint {
    /// Activity date
    pub date: NaiveDate,
    /// Effort score
    pub effort_score: f64,
    /// Provider type
    #[serde(rename = "type")]
    pub activity_type: String,
}

/// Per-day effort point (continuous, zero-filled)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailySufferScorePoint {
    /// Calendar date
    pub date: NaiveDate,
    /// Summed effort score
    pub effort_score: f64,
}

/// Speed-per-heartbeat point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EfficiencyPoint {
    /// Activity date
    pub date: NaiveDate,
    /// Speed divided by average HR
    pub efficiency_mps_per_bpm: f64,
    /// Provider type
    #[serde(rename = "type")]
    pub activity_type: String,
}

/// Weekly 3-zone load point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneLoadWeekPoint {
    /// Monday of the week
    pub week_start: NaiveDate,
    /// Z1+Z2 minutes
    pub easy_min: f64,
    /// Z3 minutes
    pub moderate_min: f64,
    /// Z4+Z5 minutes
    pub hard_min: f64,
}

/// Daily 3-zone load point (continuous)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyZoneLoadPoint {
    /// Calendar date
    pub date: NaiveDate,
    /// Z1+Z2 minutes
    pub easy_min: f64,
    /// Z3 minutes
    pub moderate_min: f64,
    /// Z4+Z5 minutes
    pub hard_min: f64,
}

/// Complete trends report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendsResponse {
    /// Normalized range key
    pub range: String,
    /// Totals across the range
    pub summary: TrendsSummary,
    /// Totals for the same-length window immediately before (absent for ALL)
    pub previous_summary: Option<TrendsSummary>,
    /// Weekly distance, contiguous
    pub weekly_distance: Vec<WeeklyDistancePoint>,
    /// Weekly time, contiguous
    pub weekly_time: Vec<WeeklyTimePoint>,
    /// Weekly effort, contiguous
    pub weekly_suffer_score: Vec<WeeklySufferScorePoint>,
    /// Daily distance, continuous
    pub daily_distance: Vec<DailyDistancePoint>,
    /// Daily time, continuous
    pub daily_time: Vec<DailyTimePoint>,
    /// Per-activity effort points
    pub suffer_score: Vec<SufferScorePoint>,
    /// Daily effort, continuous
    pub daily_suffer_score: Vec<DailySufferScorePoint>,
    /// Speed-per-heartbeat trend
    pub efficiency_trend: Vec<EfficiencyPoint>,
    /// Weekly 3-zone load
    pub weekly_zone_load: Vec<ZoneLoadWeekPoint>,
    /// Daily 3-zone load, continuous
    pub daily_zone_load: Vec<DailyZoneLoadPoint>,
}

// ── Pipeline ────────────────────────────────────────────────────────────

fn range_days(range_key: &str) -> Option<i64> {
    RANGE_DAYS
        .iter()
        .find(|(key, _)| *key == range_key)
        .map(|(_, days)| *days)
}

fn resolve_since(range_key: &str, today: NaiveDate) -> Option<NaiveDate> {
    range_days(range_key).map(|days| today - Duration::days(days))
}

fn monday_of(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

fn filter_by_types(facts: Vec<ActivityFact>, types: Option<&[String]>) -> Vec<ActivityFact> {
    let Some(types) = types else {
        return facts;
    };
    if types.is_empty() {
        return facts;
    }
    let wanted: Vec<String> = types.iter().map(|t| t.to_lowercase()).collect();
    facts
        .into_iter()
        .filter(|f| wanted.contains(&f.effective_type().to_lowercase()))
        .collect()
}

/// Collapse activity facts into one row per local date, ascending
#[must_use]
pub fn build_daily_facts(facts: &[ActivityFact]) -> Vec<DailyFact> {
    let mut buckets: HashMap<NaiveDate, DailyFact> = HashMap::new();
    for fact in facts {
        buckets
            .entry(fact.local_date)
            .or_insert_with(|| DailyFact::empty(fact.local_date))
            .add(fact);
    }
    let mut daily: Vec<DailyFact> = buckets.into_values().collect();
    daily.sort_by_key(|d| d.local_date);
    daily
}

/// One row per day in `[since, today]`, zero-filling gaps
#[must_use]
pub fn build_continuous_daily_facts(
    daily: &[DailyFact],
    range_key: &str,
    today: NaiveDate,
) -> Vec<DailyFact> {
    let start = resolve_since(range_key, today)
        .or_else(|| daily.first().map(|d| d.local_date))
        .unwrap_or(today);

    let existing: HashMap<NaiveDate, &DailyFact> =
        daily.iter().map(|d| (d.local_date, d)).collect();

    let mut result = Vec::new();
    let mut cursor = start;
    while cursor <= today {
        result.push(
            existing
                .get(&cursor)
                .map_or_else(|| DailyFact::empty(cursor), |d| (*d).clone()),
        );
        cursor += Duration::days(1);
    }
    result
}

/// Roll daily facts into contiguous ISO-week buckets covering the range
#[must_use]
pub fn build_weekly_buckets(
    daily: &[DailyFact],
    range_key: &str,
    today: NaiveDate,
) -> Vec<WeekBucket> {
    let mut buckets: HashMap<NaiveDate, WeekBucket> = HashMap::new();
    for fact in daily {
        let monday = monday_of(fact.local_date);
        let bucket = buckets
            .entry(monday)
            .or_insert_with(|| WeekBucket::empty(monday));
        bucket.total_distance_m += fact.total_distance_m;
        bucket.total_moving_time_s += fact.total_moving_time_s;
        bucket.total_effort_score += fact.total_effort_score;
        bucket.activity_count += fact.activity_count;
    }

    let end_monday = monday_of(today);
    let start_monday = resolve_since(range_key, today)
        .map(monday_of)
        .or_else(|| daily.first().map(|d| monday_of(d.local_date)))
        .unwrap_or(end_monday);

    let mut cursor = start_monday;
    while cursor <= end_monday {
        buckets
            .entry(cursor)
            .or_insert_with(|| WeekBucket::empty(cursor));
        cursor += Duration::weeks(1);
    }

    let mut weekly: Vec<WeekBucket> = buckets.into_values().collect();
    weekly.sort_by_key(|w| w.week_start);
    weekly
}

fn summarize(facts: &[ActivityFact]) -> TrendsSummary {
    TrendsSummary {
        total_distance_m: facts.iter().map(|f| f.distance_m).sum(),
        total_moving_time_s: facts.iter().map(|f| f.moving_time_s).sum(),
        activity_count: facts.len() as i64,
        total_suffer_score: round_to(
            facts.iter().filter_map(|f| f.effort_score).sum::<f64>(),
            1,
        ),
    }
}

/// Collapse a 5-zone map into (easy, moderate, hard) seconds
fn collapse_to_3_zones(zones: &TimeInZones) -> (i64, i64, i64) {
    (zones.z1 + zones.z2, zones.z3, zones.z4 + zones.z5)
}

fn build_efficiency_trend(facts: &[ActivityFact]) -> Vec<EfficiencyPoint> {
    let mut points: Vec<EfficiencyPoint> = facts
        .iter()
        .filter(|f| f.distance_m >= 1000)
        .filter_map(|f| {
            let avg_hr = f.avg_hr.filter(|hr| *hr >= 1.0)?;
            let speed = match f.average_speed_mps {
                Some(s) if s > 0.0 => s,
                _ if f.moving_time_s > 0 => f.distance_m as f64 / f.moving_time_s as f64,
                _ => return None,
            };
            Some(EfficiencyPoint {
                date: f.local_date,
                efficiency_mps_per_bpm: round_to(speed / avg_hr, 4),
                activity_type: f.activity_type.clone(),
            })
        })
        .collect();
    points.sort_by_key(|p| p.date);
    points
}

/// Assemble the complete trends report for one user.
///
/// Unknown range keys normalize to `30D`. `today` is injected so the
/// windowing is deterministic under test.
///
/// # Errors
///
/// Returns an error on database failure.
pub async fn get_trends_report(
    db: &Database,
    user_id: Uuid,
    range_key: &str,
    types: Option<&[String]>,
    today: NaiveDate,
) -> anyhow::Result<TrendsResponse> {
    let range = {
        let upper = range_key.to_uppercase();
        if upper == "ALL" || range_days(&upper).is_some() {
            upper
        } else {
            "30D".to_owned()
        }
    };

    let since = resolve_since(&range, today);
    let start = since.and_then(|d| {
        d.and_hms_opt(0, 0, 0)
            .map(|naive| Utc.from_utc_datetime(&naive))
    });

    let activities = db.activities_in_window(user_id, start, None).await?;
    let ids: Vec<Uuid> = activities.iter().map(|a| a.id).collect();
    let metrics = db.metrics_for_activities(&ids).await?;
    let by_activity: HashMap<Uuid, &DerivedMetric> =
        metrics.iter().map(|m| (m.activity_id, m)).collect();

    let facts: Vec<ActivityFact> = activities
        .iter()
        .map(|a| ActivityFact::new(a, by_activity.get(&a.id).copied()))
        .collect();
    let facts = filter_by_types(facts, types);

    // Previous same-length window (absent for ALL)
    let previous_summary = match range_days(&range) {
        Some(days) => {
            let current_start = today - Duration::days(days);
            let prev_start = current_start - Duration::days(days);
            let to_utc = |d: NaiveDate| {
                d.and_hms_opt(0, 0, 0)
                    .map(|naive| Utc.from_utc_datetime(&naive))
            };
            let prev_activities = db
                .activities_in_window(user_id, to_utc(prev_start), to_utc(current_start))
                .await?;
            let prev_ids: Vec<Uuid> = prev_activities.iter().map(|a| a.id).collect();
            let prev_metrics = db.metrics_for_activities(&prev_ids).await?;
            let prev_by_activity: HashMap<Uuid, &DerivedMetric> =
                prev_metrics.iter().map(|m| (m.activity_id, m)).collect();
            let prev_facts: Vec<ActivityFact> = prev_activities
                .iter()
                .map(|a| ActivityFact::new(a, prev_by_activity.get(&a.id).copied()))
                .collect();
            Some(summarize(&filter_by_types(prev_facts, types)))
        }
        None => None,
    };

    Ok(assemble_report(&range, &facts, previous_summary, today))
}

/// Pure assembly over already-loaded facts
#[must_use]
pub fn assemble_report(
    range: &str,
    facts: &[ActivityFact],
    previous_summary: Option<TrendsSummary>,
    today: NaiveDate,
) -> TrendsResponse {
    let daily = build_daily_facts(facts);
    let continuous_daily = build_continuous_daily_facts(&daily, range, today);
    let weekly = build_weekly_buckets(&daily, range, today);

    let summary = summarize(facts);

    // Per-day effort with zeros for empty days
    let mut effort_by_date: HashMap<NaiveDate, f64> = HashMap::new();
    for fact in facts {
        if let Some(effort) = fact.effort_score {
            *effort_by_date.entry(fact.local_date).or_insert(0.0) += effort;
        }
    }

    // Zone seconds summed per date and per week
    let mut zones_by_date: HashMap<NaiveDate, (i64, i64, i64)> = HashMap::new();
    let mut zones_by_week: HashMap<NaiveDate, (i64, i64, i64)> = HashMap::new();
    for fact in facts {
        if let Some(zones) = &fact.time_in_zones {
            let (easy, moderate, hard) = collapse_to_3_zones(zones);
            let day = zones_by_date.entry(fact.local_date).or_insert((0, 0, 0));
            *day = (day.0 + easy, day.1 + moderate, day.2 + hard);
            let week = zones_by_week
                .entry(monday_of(fact.local_date))
                .or_insert((0, 0, 0));
            *week = (week.0 + easy, week.1 + moderate, week.2 + hard);
        }
    }

    let minutes = |seconds: i64| round_to(seconds as f64 / 60.0, 1);

    TrendsResponse {
        range: range.to_owned(),
        summary,
        previous_summary,
        weekly_distance: weekly
            .iter()
            .map(|w| WeeklyDistancePoint {
                week_start: w.week_start,
                total_distance_m: w.total_distance_m,
                activity_count: w.activity_count,
            })
            .collect(),
        weekly_time: weekly
            .iter()
            .map(|w| WeeklyTimePoint {
                week_start: w.week_start,
                total_moving_time_s: w.total_moving_time_s,
                activity_count: w.activity_count,
            })
            .collect(),
        weekly_suffer_score: weekly
            .iter()
            .map(|w| WeeklySufferScorePoint {
                week_start: w.week_start,
                effort_score: round_to(w.total_effort_score, 1),
            })
            .collect(),
        daily_distance: continuous_daily
            .iter()
            .map(|d| DailyDistancePoint {
                date: d.local_date,
                total_distance_m: d.total_distance_m,
                activity_count: d.activity_count,
            })
            .collect(),
        daily_time: continuous_daily
            .iter()
            .map(|d| DailyTimePoint {
                date: d.local_date,
                total_moving_time_s: d.total_moving_time_s,
                activity_count: d.activity_count,
            })
            .collect(),
        suffer_score: facts
            .iter()
            .filter_map(|f| {
                f.effort_score.map(|effort| SufferScorePoint {
                    date: f.local_date,
                    effort_score: round_to(effort, 1),
                    activity_type: f.activity_type.clone(),
                })
            })
            .collect(),
        daily_suffer_score: continuous_daily
            .iter()
            .map(|d| DailySufferScorePoint {
                date: d.local_date,
                effort_score: round_to(
                    effort_by_date.get(&d.local_date).copied().unwrap_or(0.0),
                    1,
                ),
            })
            .collect(),
        efficiency_trend: build_efficiency_trend(facts),
        weekly_zone_load: weekly
            .iter()
            .map(|w| {
                let (easy, moderate, hard) =
                    zones_by_week.get(&w.week_start).copied().unwrap_or((0, 0, 0));
                ZoneLoadWeekPoint {
                    week_start: w.week_start,
                    easy_min: minutes(easy),
                    moderate_min: minutes(moderate),
                    hard_min: minutes(hard),
                }
            })
            .collect(),
        daily_zone_load: continuous_daily
            .iter()
            .map(|d| {
                let (easy, moderate, hard) = zones_by_date
                    .get(&d.local_date)
                    .copied()
                    .unwrap_or((0, 0, 0));
                DailyZoneLoadPoint {
                    date: d.local_date,
                    easy_min: minutes(easy),
                    moderate_min: minutes(moderate),
                    hard_min: minutes(hard),
                }
            })
            .collect(),
    }
}
