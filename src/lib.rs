// ABOUTME: Main library entry point for the strideline activity-processing core
// ABOUTME: Wires Strava ingest, stream analysis, processing, trends, and the HTTP surface
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

#![deny(unsafe_code)]

//! # Strideline
//!
//! The activity-processing core of a personal running-analytics service.
//! Activities arrive from Strava (OAuth + push webhooks), are persisted with
//! their raw sample streams, and are processed into derived metrics:
//! heart-rate zones, pace variability, cardiac drift, stop and efficiency
//! analysis, interval structure, workout matching, flags, risk, and
//! confidence. Read-side projections (trends, context pack) feed the
//! presentation and coaching layers.
//!
//! ## Architecture
//!
//! - **Providers**: typed Strava REST client (token exchange, activities, streams)
//! - **Ingest**: token lifecycle, idempotent upsert, manual sync
//! - **Jobs**: Redis-backed queue with deterministic job-id dedup, worker loop
//! - **Processing**: the pure analysis pipeline over activities + streams
//! - **Trends**: daily/weekly bucketing with gap-filled timelines
//! - **Context**: the deterministic, hash-addressable coaching context pack
//! - **Routes**: thin axum adapters over the above

/// Configuration management from environment variables
pub mod config;

/// Application constants and threshold values
pub mod constants;

/// Context pack assembly for the external coaching layer
pub mod context;

/// Database access: pool, migrations, per-entity query modules
pub mod database;

/// Unified error handling with standard error codes and HTTP responses
pub mod errors;

/// Ingest orchestration: token lifecycle, activity upsert, manual sync
pub mod ingest;

/// Background job queue and worker loop
pub mod jobs;

/// Structured logging setup
pub mod logging;

/// Common data models for users, activities, streams, and derived metrics
pub mod models;

/// Activity processing pipeline: metrics, classification, intervals, risk
pub mod processing;

/// Fitness provider client implementations
pub mod providers;

/// `HTTP` routes for the `/api` surface
pub mod routes;

/// Server resource wiring and router assembly
pub mod server;

/// Trends aggregation over activity history
pub mod trends;

/// Unit normalization helpers (cadence)
pub mod units;

/// Utility functions: shared HTTP client, numeric helpers
pub mod utils;
