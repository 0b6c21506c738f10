// ABOUTME: Common data models for users, linked accounts, activities, streams, and derived metrics
// ABOUTME: Also defines the persisted analysis document shapes (intervals, stops, efficiency, risk)
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! Domain models shared across ingest, processing, trends, and routes.
//!
//! Scalar analysis results live directly on [`DerivedMetric`]; structured
//! results (interval structure, stops, efficiency, workout match) are typed
//! documents persisted as JSON columns.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

use crate::constants::physiology;

// ── Users & linked accounts ─────────────────────────────────────────────

/// Application user. Created implicitly on first provider-account linkage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: Uuid,
    /// Optional email address
    pub email: Option<String>,
    /// Row creation timestamp
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create a new user with a fresh id
    #[must_use]
    pub fn new(email: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            email,
            created_at: Utc::now(),
        }
    }
}

/// OAuth credentials for a linked Strava account (one per user).
///
/// Mutated only by the token store during refresh or initial linkage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StravaAccount {
    /// Unique identifier
    pub id: Uuid,
    /// Owning user
    pub user_id: Uuid,
    /// Provider-assigned athlete id (globally unique)
    pub strava_athlete_id: i64,
    /// Current access token
    pub access_token: String,
    /// Current refresh token
    pub refresh_token: String,
    /// Access token expiry as unix seconds
    pub expires_at: i64,
    /// Granted scope string
    pub scope: String,
    /// Row creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
}

/// Athlete profile. One per user; auto-created with defaults on first read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    /// Owning user
    pub user_id: Uuid,
    /// Training goal, e.g. "5k", "marathon", "general"
    pub goal_type: String,
    /// Optional goal target date
    pub target_date: Option<NaiveDate>,
    /// Self-reported experience: "new", "intermediate", "advanced"
    pub experience_level: String,
    /// Days per week available for training
    pub weekly_days_available: i64,
    /// Current weekly volume in km, if known
    pub current_weekly_km: Option<i64>,
    /// Explicit maximum heart rate, if known
    pub max_hr: Option<i64>,
    /// Provenance of `max_hr`: "user_entered", "race_estimate", "lab_test"
    pub max_hr_source: Option<String>,
    /// Upcoming races as a free-form JSON list
    pub upcoming_races: Value,
    /// Free-text injury notes
    pub injury_notes: Option<String>,
    /// Row creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    /// Default profile created on first read
    #[must_use]
    pub fn default_for(user_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            goal_type: "general".to_owned(),
            target_date: None,
            experience_level: "intermediate".to_owned(),
            weekly_days_available: 4,
            current_weekly_km: Some(20),
            max_hr: Some(physiology::DEFAULT_MAX_HR),
            max_hr_source: None,
            upcoming_races: Value::Array(vec![]),
            injury_notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Max HR used by the metrics engine: the profile value when plausible,
    /// otherwise the default of 190.
    #[must_use]
    pub fn effective_max_hr(&self) -> i64 {
        match self.max_hr {
            Some(hr) if hr > physiology::MIN_PLAUSIBLE_MAX_HR => hr,
            _ => physiology::DEFAULT_MAX_HR,
        }
    }

    /// Zones are calibrated iff an explicit, plausible max HR carries a
    /// non-empty source tag.
    #[must_use]
    pub fn zones_calibrated(&self) -> bool {
        self.max_hr
            .is_some_and(|hr| hr > physiology::MIN_PLAUSIBLE_MAX_HR)
            && self
                .max_hr_source
                .as_deref()
                .is_some_and(|s| !s.is_empty())
    }

    /// Basis string exposed to the coaching layer: `user_<source>` when
    /// calibrated, otherwise `uncalibrated`.
    #[must_use]
    pub fn zones_basis(&self) -> String {
        if self.zones_calibrated() {
            // zones_calibrated guarantees the source is present and non-empty
            let source = self.max_hr_source.as_deref().unwrap_or_default();
            format!("user_{source}")
        } else {
            "uncalibrated".to_owned()
        }
    }
}

// ── Activities ──────────────────────────────────────────────────────────

/// Canonical activity record, keyed on the provider-assigned activity id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    /// Unique identifier
    pub id: Uuid,
    /// Owning user
    pub user_id: Uuid,
    /// Provider activity id (unique)
    pub strava_activity_id: i64,
    /// Timezone-aware start time
    pub start_date: DateTime<Utc>,
    /// Provider-reported type, e.g. "Run", "Ride"
    #[serde(rename = "type")]
    pub activity_type: String,
    /// Activity name
    pub name: String,
    /// Distance in meters
    pub distance_m: i64,
    /// Moving time in seconds
    pub moving_time_s: i64,
    /// Elapsed time in seconds
    pub elapsed_time_s: i64,
    /// Elevation gain in meters
    pub elev_gain_m: f64,
    /// Average heart rate, if recorded
    pub avg_hr: Option<f64>,
    /// Maximum heart rate, if recorded
    pub max_hr: Option<f64>,
    /// Average cadence as reported by the provider (may be strides/min)
    pub avg_cadence: Option<f64>,
    /// Average speed in m/s
    pub average_speed_mps: Option<f64>,
    /// Manual classification override set by the user
    pub user_intent: Option<String>,
    /// Raw provider summary, retained verbatim
    pub raw_summary: Value,
    /// Soft-delete flag set by webhook delete events
    pub is_deleted: bool,
    /// Row creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
}

impl Activity {
    /// The user's manual intent when set, otherwise the provider type
    #[must_use]
    pub fn effective_type(&self) -> &str {
        self.user_intent.as_deref().unwrap_or(&self.activity_type)
    }

    /// Sport type from the raw summary, falling back to the stored type.
    /// Absence is treated as "Run" rather than an error.
    #[must_use]
    pub fn sport_type(&self) -> String {
        self.raw_summary
            .get("sport_type")
            .and_then(Value::as_str)
            .map_or_else(
                || {
                    if self.activity_type.is_empty() {
                        "Run".to_owned()
                    } else {
                        self.activity_type.clone()
                    }
                },
                ToOwned::to_owned,
            )
    }

    /// Trainer flag from the raw summary; absent means false
    #[must_use]
    pub fn is_trainer(&self) -> bool {
        self.raw_summary
            .get("trainer")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

// ── Streams ─────────────────────────────────────────────────────────────

/// Per-activity time-aligned sample arrays, keyed by channel name.
///
/// Channels preserve the provider's array order and element types:
/// numbers for most channels, booleans for `moving`, `[lat, lng]` pairs
/// for `latlng`. Replaced wholesale on refetch, never partially mutated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamSet {
    channels: HashMap<String, Value>,
}

impl StreamSet {
    /// Empty stream set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or replace) one channel
    pub fn insert(&mut self, channel: impl Into<String>, data: Value) {
        self.channels.insert(channel.into(), data);
    }

    /// True when no channels are present
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Channel presence check
    #[must_use]
    pub fn has_channel(&self, channel: &str) -> bool {
        self.channels.contains_key(channel)
    }

    /// Raw channel document
    #[must_use]
    pub fn raw(&self, channel: &str) -> Option<&Value> {
        self.channels.get(channel)
    }

    /// Iterate over `(channel, data)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.channels.iter()
    }

    /// Numeric samples for a channel. Non-numeric elements become 0.0 so
    /// alignment with sibling channels is preserved.
    #[must_use]
    pub fn samples(&self, channel: &str) -> Option<Vec<f64>> {
        let arr = self.channels.get(channel)?.as_array()?;
        Some(
            arr.iter()
                .map(|v| v.as_f64().unwrap_or(0.0))
                .collect(),
        )
    }

    /// Boolean samples (the `moving` channel)
    #[must_use]
    pub fn bools(&self, channel: &str) -> Option<Vec<bool>> {
        let arr = self.channels.get(channel)?.as_array()?;
        Some(arr.iter().map(|v| v.as_bool().unwrap_or(false)).collect())
    }

    /// `[lat, lng]` pairs from the `latlng` channel. Malformed entries
    /// become `None` to keep indices aligned with the time stream.
    #[must_use]
    pub fn latlng(&self) -> Option<Vec<Option<[f64; 2]>>> {
        let arr = self.channels.get("latlng")?.as_array()?;
        Some(
            arr.iter()
                .map(|v| {
                    let pair = v.as_array()?;
                    if pair.len() >= 2 {
                        Some([pair[0].as_f64()?, pair[1].as_f64()?])
                    } else {
                        None
                    }
                })
                .collect(),
        )
    }
}

impl FromIterator<(String, Value)> for StreamSet {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self {
            channels: iter.into_iter().collect(),
        }
    }
}

// ── Check-ins ───────────────────────────────────────────────────────────

/// User self-reported wellness attached to one activity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckIn {
    /// Unique identifier
    pub id: Uuid,
    /// Owning activity
    pub activity_id: Uuid,
    /// Rate of perceived exertion, 0-10
    pub rpe: Option<i64>,
    /// Pain score, 0-10
    pub pain_score: Option<i64>,
    /// Free-text pain location
    pub pain_location: Option<String>,
    /// Sleep quality, 0-10
    pub sleep_quality: Option<i64>,
    /// Free-text notes
    pub notes: Option<String>,
    /// Row creation timestamp
    pub created_at: DateTime<Utc>,
}

// ── Enumerations ────────────────────────────────────────────────────────

/// Traffic-light risk level derived from the additive risk score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    /// Normal, no concerns
    Green,
    /// Caution, worth mentioning
    Amber,
    /// Stop/rest recommendation
    Red,
}

impl RiskLevel {
    /// Stable string form
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Green => "green",
            Self::Amber => "amber",
            Self::Red => "red",
        }
    }
}

/// Confidence gate for downstream claims about a metric record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    /// Heavily caveat or avoid claims
    Low,
    /// Claims allowed with hedging
    Medium,
    /// Full-confidence claims allowed
    High,
}

impl ConfidenceLevel {
    /// Stable string form
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Rep consistency label from the interval detector summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsistencyLabel {
    /// Both CVs under 10 %
    High,
    /// Worst CV under 20 %
    Medium,
    /// Worst CV at or above 20 %
    Low,
    /// Not enough reps to compute a CV
    Unknown,
}

/// Closed taxonomy of analysis flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flag {
    /// No average heart rate on the activity
    DataLowConfidenceHr,
    /// Easy run executed at high relative heart rate
    IntensityMismatch,
    /// Cardiac drift above the fatigue threshold
    FatiguePossible,
    /// Tempo with unstable pacing
    PaceUnstable,
    /// Effort far above the recent average
    LoadSpike,
    /// Check-in combination suggesting illness or extreme fatigue
    IllnessOrExtremeFatigue,
    /// Pain reported on the check-in
    PainReported,
    /// Severe pain reported on the check-in
    PainSevere,
}

impl Flag {
    /// Stable string form matching the wire taxonomy
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DataLowConfidenceHr => "data_low_confidence_hr",
            Self::IntensityMismatch => "intensity_mismatch",
            Self::FatiguePossible => "fatigue_possible",
            Self::PaceUnstable => "pace_unstable",
            Self::LoadSpike => "load_spike",
            Self::IllnessOrExtremeFatigue => "illness_or_extreme_fatigue",
            Self::PainReported => "pain_reported",
            Self::PainSevere => "pain_severe",
        }
    }
}

/// Unordered set of flags with deterministic serialization order
pub type FlagSet = BTreeSet<Flag>;

// ── Analysis documents ──────────────────────────────────────────────────

/// Seconds per heart-rate zone. Sample counts are treated as seconds
/// (streams are assumed 1 Hz).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeInZones {
    /// 50-60 % of max HR
    #[serde(rename = "Z1")]
    pub z1: i64,
    /// 60-70 % of max HR
    #[serde(rename = "Z2")]
    pub z2: i64,
    /// 70-80 % of max HR
    #[serde(rename = "Z3")]
    pub z3: i64,
    /// 80-90 % of max HR
    #[serde(rename = "Z4")]
    pub z4: i64,
    /// 90 % of max HR and above
    #[serde(rename = "Z5")]
    pub z5: i64,
}

impl TimeInZones {
    /// Sum across all five zones
    #[must_use]
    pub const fn total(&self) -> i64 {
        self.z1 + self.z2 + self.z3 + self.z4 + self.z5
    }
}

/// One contiguous stopped region from the `moving` stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopEvent {
    /// Seconds from activity start when the stop began
    pub start_time: f64,
    /// Stop duration in seconds
    pub duration_s: f64,
    /// GPS position at stop start, when available
    pub location: Option<[f64; 2]>,
    /// Cumulative distance at stop start, when available
    pub distance_m: Option<f64>,
}

/// Stop analysis over the full activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopsAnalysis {
    /// Total stopped seconds
    pub total_stopped_time_s: f64,
    /// Number of stops
    pub stopped_count: i64,
    /// Longest single stop in seconds
    pub longest_stop_s: f64,
    /// Individual stop events
    pub stops: Vec<StopEvent>,
}

/// Speed-per-heartbeat efficiency statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyAnalysis {
    /// Mean efficiency over valid samples
    pub average: f64,
    /// Best 3-minute sustained efficiency
    pub best_sustained: f64,
    /// Downsampled 60 s-smoothed curve for charting
    pub curve: Vec<f64>,
    /// Unit string for the values above
    pub unit: String,
}

/// One work rep detected in an interval session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkSegment {
    /// 1-based rep number
    pub segment_number: usize,
    /// Seconds from activity start
    pub start_time_s: i64,
    /// Rep duration in seconds
    pub duration_s: i64,
    /// Distance covered, from the distance stream
    pub distance_m: Option<f64>,
    /// Mean speed over the rep
    pub avg_speed_mps: f64,
    /// Mean HR over the rep
    pub avg_hr: Option<f64>,
    /// Peak HR over the rep
    pub peak_hr: Option<f64>,
}

/// One recovery between work reps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestSegment {
    /// 1-based rest number
    pub segment_number: usize,
    /// Rest duration in seconds
    pub duration_s: i64,
    /// Mean HR during the rest
    pub avg_hr: Option<f64>,
    /// Drop from the preceding rep's peak HR to the rest mean
    pub hr_recovery_bpm: Option<f64>,
}

/// Aggregate statistics over the detected reps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntervalSummary {
    /// Sum of work durations
    pub total_work_time_s: i64,
    /// Sum of rest durations
    pub total_rest_time_s: i64,
    /// Work:rest ratio; absent when no rests survived filtering
    pub work_to_rest_ratio: Option<f64>,
    /// Number of work reps
    pub rep_count: usize,
    /// Mean work duration, rounded to whole seconds
    pub avg_work_duration_s: i64,
    /// Work duration coefficient of variation, percent
    pub work_duration_cv: Option<f64>,
    /// Mean work speed
    pub avg_work_speed_mps: f64,
    /// Work speed coefficient of variation, percent
    pub work_speed_cv: Option<f64>,
    /// Mean rest duration, rounded to whole seconds
    pub avg_rest_duration_s: Option<i64>,
    /// Mean HR recovery across rests
    pub avg_hr_recovery_bpm: Option<f64>,
    /// Consistency label from the worse of the two CVs
    pub consistency_score: ConsistencyLabel,
}

/// Full detected interval structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntervalStructure {
    /// Leading pre-work interval of at least 120 s, when present
    pub warmup_duration_s: Option<i64>,
    /// Trailing post-work interval of at least 120 s, when present
    pub cooldown_duration_s: Option<i64>,
    /// Work reps in order
    pub work_segments: Vec<WorkSegment>,
    /// Rests between work reps, in order
    pub rest_segments: Vec<RestSegment>,
    /// Aggregate statistics
    pub summary: IntervalSummary,
}

/// A user-declared interval plan to compare against detection
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PlannedWorkout {
    /// Planned rep count
    pub reps_planned: Option<u32>,
    /// Planned rep distance in meters
    pub rep_distance_m: Option<f64>,
    /// Planned rest duration in seconds
    pub rest_s: Option<f64>,
}

/// Echo of what the detector actually saw, for the coaching layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedWorkout {
    /// Detected rep count
    pub reps_detected: usize,
    /// Mean rep distance
    pub rep_distance_mean_m: Option<f64>,
    /// Rep distance coefficient of variation, percent
    pub rep_distance_cv: Option<f64>,
    /// Mean rep duration
    pub rep_duration_mean_s: f64,
    /// Rep duration coefficient of variation, percent
    pub rep_duration_cv: Option<f64>,
    /// Sum of work durations
    pub total_work_time_s: i64,
    /// Sum of rest durations
    pub total_rest_time_s: i64,
    /// Work:rest ratio
    pub work_to_rest_ratio: Option<f64>,
    /// Consistency label
    pub consistency_score: ConsistencyLabel,
}

/// Plan-versus-detected comparison result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutMatch {
    /// Similarity in `[0, 1]`; absent without both plan and structure
    pub match_score: Option<f64>,
    /// Gate for downstream claims about interval execution
    pub detection_confidence: ConfidenceLevel,
    /// Machine-readable reason codes
    pub confidence_reasons: Vec<String>,
    /// What was actually detected
    pub detected_workout: Option<DetectedWorkout>,
}

/// Interval-specific coaching KPIs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntervalKpis {
    /// Speed CV across reps
    pub rep_pace_consistency_cv: Option<f64>,
    /// Speed ratio of last rep to first rep
    pub first_vs_last_fade: Option<f64>,
    /// Mean HR drop normalized to 60 s of recovery
    pub recovery_quality_per_60s: Option<f64>,
    /// Actual work:rest ratio
    pub work_rest_ratio: Option<f64>,
    /// Seconds in Z4+Z5; only when zones are calibrated
    pub total_z4_plus_s: Option<i64>,
}

/// Distribution of the last seven days of sessions by intensity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntensityDistribution {
    /// Sessions classified as easy
    pub easy: i64,
    /// Sessions classified as moderate
    pub moderate: i64,
    /// Sessions classified as hard
    pub hard: i64,
}

/// Training context for risk scoring and the context pack
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingContext {
    /// Easy/moderate/hard session counts over the trailing 7 days
    pub intensity_distribution_7d: IntensityDistribution,
    /// Hard sessions in the trailing 7 days
    pub hard_sessions_this_week: i64,
    /// Whole days since the most recent hard session, when any
    pub days_since_last_hard: Option<i64>,
}

/// Result of the additive risk scorer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Traffic-light level
    pub risk_level: RiskLevel,
    /// Additive integer points
    pub risk_score: i64,
    /// Ordered `code (+points)` strings
    pub risk_reasons: Vec<String>,
}

// ── Derived metrics ─────────────────────────────────────────────────────

/// Derived analysis record, one per activity.
///
/// `effort_score` is never null; every other analytic field is nullable
/// when its input preconditions are unmet. Created and replaced only by the
/// processing engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DerivedMetric {
    /// Unique identifier
    pub id: Uuid,
    /// Owning activity (unique)
    pub activity_id: Uuid,
    /// Assigned activity class
    pub activity_class: String,
    /// Training-load proxy; always present
    pub effort_score: f64,
    /// Pace coefficient of variation, percent
    pub pace_variability: Option<f64>,
    /// Cardiac decoupling, percent
    pub hr_drift: Option<f64>,
    /// Seconds per heart-rate zone
    pub time_in_zones: Option<TimeInZones>,
    /// Stop analysis
    pub stops_analysis: Option<StopsAnalysis>,
    /// Efficiency statistics
    pub efficiency_analysis: Option<EfficiencyAnalysis>,
    /// Detected interval structure
    pub interval_structure: Option<IntervalStructure>,
    /// Plan-versus-detected comparison
    pub workout_match: Option<WorkoutMatch>,
    /// Interval-specific KPIs
    pub interval_kpis: Option<IntervalKpis>,
    /// Analysis flags (unordered set, closed taxonomy)
    pub flags: FlagSet,
    /// Traffic-light risk level
    pub risk_level: RiskLevel,
    /// Additive risk points
    pub risk_score: i64,
    /// Ordered risk reason strings
    pub risk_reasons: Vec<String>,
    /// Overall confidence gate
    pub confidence: ConfidenceLevel,
    /// Confidence reason codes
    pub confidence_reasons: Vec<String>,
    /// Row creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
}
