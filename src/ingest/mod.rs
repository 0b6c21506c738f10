// ABOUTME: Ingest module organization: token lifecycle, payload parsing, sync orchestration
// ABOUTME: The webhook route and worker jobs both funnel through this layer
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! Ingest orchestration.

pub mod sync;
pub mod token;
pub mod upsert;

pub use sync::SyncResponse;
