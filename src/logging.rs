// ABOUTME: Logging configuration and structured logging setup for observability
// ABOUTME: Selects compact or JSON output by environment and honors RUST_LOG
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! Structured logging setup built on `tracing`.

use crate::config::Environment;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the global tracing subscriber.
///
/// Production uses JSON output for log aggregation; everything else gets
/// compact human-readable lines. `RUST_LOG` overrides the default filter.
/// Calling twice is harmless (the second init is ignored).
pub fn init(environment: Environment) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if environment.is_production() {
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true))
            .try_init();
    } else {
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_target(false))
            .try_init();
    }

    tracing::info!("logging initialized for {environment} environment");
}
