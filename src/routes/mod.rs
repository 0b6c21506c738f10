// ABOUTME: Route module organization for the strideline HTTP surface
// ABOUTME: Thin axum adapters; all behavior lives in ingest, processing, trends, and context
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! Route modules, one per domain.

pub mod activities;
pub mod auth;
pub mod health;
pub mod profile;
pub mod trends;
pub mod webhooks;
