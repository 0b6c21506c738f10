// ABOUTME: Server resource wiring and router assembly
// ABOUTME: One ServerResources value is constructed at startup and injected everywhere
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! Server assembly.
//!
//! [`ServerResources`] carries every injected dependency: the database, the
//! provider client, the job queue, and the process configuration. Route
//! modules receive it behind an `Arc` as axum state.

use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::ServerConfig;
use crate::constants::jobs::SYNC_QUEUE;
use crate::database::Database;
use crate::jobs::JobQueue;
use crate::providers::{StravaClient, StravaConfig};
use crate::routes;

/// Focused dependency bundle for route handlers and workers
pub struct ServerResources {
    /// Database handle
    pub database: Database,
    /// Provider client (constructed once from configuration)
    pub strava: Arc<StravaClient>,
    /// Job queue handle
    pub queue: JobQueue,
    /// Process configuration
    pub config: ServerConfig,
}

impl ServerResources {
    /// Connect every dependency from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error when the database or the queue broker is
    /// unreachable.
    pub async fn from_config(config: ServerConfig) -> Result<Self> {
        let database = Database::new(&config.database_url).await?;
        let strava = Arc::new(StravaClient::new(StravaConfig::from_credentials(
            &config.strava,
        )));
        let queue = JobQueue::connect(&config.redis_url, SYNC_QUEUE).await?;

        Ok(Self {
            database,
            strava,
            queue,
            config,
        })
    }
}

/// Assemble the full `/api` router
#[must_use]
pub fn build_router(resources: Arc<ServerResources>) -> Router {
    let api = Router::new()
        .merge(routes::health::HealthRoutes::routes(resources.clone()))
        .merge(routes::auth::AuthRoutes::routes(resources.clone()))
        .merge(routes::activities::ActivityRoutes::routes(resources.clone()))
        .merge(routes::profile::ProfileRoutes::routes(resources.clone()))
        .merge(routes::trends::TrendsRoutes::routes(resources.clone()))
        .merge(routes::webhooks::WebhookRoutes::routes(resources));

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Bind and serve until shutdown.
///
/// # Errors
///
/// Returns an error when the listener cannot bind or the server fails.
pub async fn serve(resources: Arc<ServerResources>) -> Result<()> {
    let port = resources.config.http_port;
    let router = build_router(resources);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!("listening on port {port}");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;
    Ok(())
}
