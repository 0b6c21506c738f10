// ABOUTME: Application constants shared across ingest, jobs, and processing
// ABOUTME: Centralizes provider endpoints, sync windows, and queue settings
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! Application-wide constants. Analysis thresholds live next to the
//! algorithms that use them in [`crate::processing`].

/// OAuth-related constants for the Strava provider
pub mod oauth {
    /// Scopes requested during the authorization redirect
    pub const STRAVA_DEFAULT_SCOPES: &str = "read,activity:read_all,profile:read_all";

    /// Tokens within this many seconds of expiry are refreshed eagerly
    pub const TOKEN_EXPIRY_BUFFER_SECS: i64 = 60;
}

/// Strava API endpoints (overridable in tests via `StravaConfig`)
pub mod strava_api {
    /// REST API base
    pub const BASE_URL: &str = "https://www.strava.com/api/v3";

    /// OAuth authorize page
    pub const AUTH_URL: &str = "https://www.strava.com/oauth/authorize";

    /// Token exchange and refresh endpoint
    pub const TOKEN_URL: &str = "https://www.strava.com/oauth/token";
}

/// Manual and webhook-driven sync behavior
pub mod sync {
    /// Manual sync fetches activities from this many days back
    pub const LOOKBACK_DAYS: i64 = 30;

    /// Page size for the activity summary listing
    pub const ACTIVITIES_PER_PAGE: u32 = 50;

    /// Stream channels requested for every activity
    pub const STREAM_CHANNELS: [&str; 11] = [
        "time",
        "distance",
        "latlng",
        "altitude",
        "velocity_smooth",
        "heartrate",
        "cadence",
        "watts",
        "temp",
        "moving",
        "grade_smooth",
    ];
}

/// Job queue settings
pub mod jobs {
    /// Name of the sync queue
    pub const SYNC_QUEUE: &str = "sync";

    /// Dedup/result retention for enqueued jobs, in seconds
    pub const RESULT_TTL_SECS: u64 = 3600;

    /// Maximum wall-clock for a single worker job, in seconds
    pub const JOB_TIMEOUT_SECS: u64 = 300;

    /// Blocking pop timeout for the worker loop, in seconds
    pub const DEQUEUE_TIMEOUT_SECS: f64 = 5.0;
}

/// Physiological defaults
pub mod physiology {
    /// Max HR assumed when the profile has none (or an implausible one)
    pub const DEFAULT_MAX_HR: i64 = 190;

    /// Profile max HR at or below this value is treated as unset
    pub const MIN_PLAUSIBLE_MAX_HR: i64 = 100;
}
