// ABOUTME: Activity processing pipeline module organization
// ABOUTME: Pure analysis functions plus the orchestrating engine
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! The activity processing pipeline.
//!
//! Everything except [`engine`] is a pure function over already-loaded data:
//! metrics, classification, interval detection, workout matching, flags,
//! risk, and training context. The engine loads inputs, runs the stages in
//! order, computes confidence, and upserts the derived-metric row.

pub mod classifier;
pub mod engine;
pub mod flags;
pub mod intervals;
pub mod matching;
pub mod metrics;
pub mod risk;
pub mod splits;
pub mod stops;
pub mod training_context;
