// ABOUTME: Fitness provider module organization
// ABOUTME: Strava is the only provider in the MVP; errors are shared across providers
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! Fitness provider implementations.

pub mod errors;
pub mod strava;

pub use errors::ProviderError;
pub use strava::{StravaClient, StravaConfig, TokenBundle};
