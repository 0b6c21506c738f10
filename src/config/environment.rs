// ABOUTME: Environment configuration management for deployment-specific settings
// ABOUTME: Parses recognized environment variables into a typed ServerConfig
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! Environment-based configuration management.
//!
//! All recognized process configuration comes from environment variables;
//! `DATABASE_URL` is the only hard requirement.

use anyhow::{Context, Result};
use std::env;

/// Environment type, tags logging verbosity and output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    /// Local development (compact logs, defaults allowed)
    #[default]
    Development,
    /// Production deployment (JSON logs)
    Production,
    /// Test runs
    Testing,
}

impl Environment {
    /// Parse from string with fallback to development
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "testing" | "test" => Self::Testing,
            _ => Self::Development,
        }
    }

    /// Check if this is a production environment
    #[must_use]
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
            Self::Testing => write!(f, "testing"),
        }
    }
}

/// OAuth and webhook credentials for the Strava provider
#[derive(Debug, Clone, Default)]
pub struct StravaCredentials {
    /// OAuth client id
    pub client_id: String,
    /// OAuth client secret
    pub client_secret: String,
    /// Redirect URI registered with the provider
    pub redirect_uri: String,
    /// Shared secret echoed during webhook subscription handshakes
    pub webhook_verify_token: String,
    /// Publicly reachable webhook callback URL
    pub webhook_callback_url: String,
}

/// Full process configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Deployment environment
    pub environment: Environment,
    /// HTTP listen port
    pub http_port: u16,
    /// Frontend base URL (OAuth completion redirects land here)
    pub app_base_url: String,
    /// This API's own base URL
    pub api_base_url: String,
    /// Database connection string (required)
    pub database_url: String,
    /// Redis connection string for the job queue broker
    pub redis_url: String,
    /// Strava credentials
    pub strava: StravaCredentials,
    /// Repair stale "Easy Run" classifications on detail read
    pub lazy_class_repair: bool,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `DATABASE_URL` is absent or `HTTP_PORT` is not a
    /// valid port number.
    pub fn from_env() -> Result<Self> {
        let environment = Environment::from_str_or_default(
            &env::var("APP_ENV").unwrap_or_default(),
        );

        let http_port = env::var("HTTP_PORT")
            .unwrap_or_else(|_| "8000".to_owned())
            .parse::<u16>()
            .context("HTTP_PORT must be a valid port number")?;

        let database_url =
            env::var("DATABASE_URL").context("DATABASE_URL environment variable is required")?;

        let api_base_url =
            env::var("API_BASE_URL").unwrap_or_else(|_| "http://localhost:8000".to_owned());

        let config = Self {
            environment,
            http_port,
            app_base_url: env::var("APP_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_owned()),
            database_url,
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379/0".to_owned()),
            strava: StravaCredentials {
                client_id: env::var("STRAVA_CLIENT_ID").unwrap_or_default(),
                client_secret: env::var("STRAVA_CLIENT_SECRET").unwrap_or_default(),
                redirect_uri: env::var("STRAVA_REDIRECT_URI")
                    .unwrap_or_else(|_| format!("{api_base_url}/api/auth/strava/callback")),
                webhook_verify_token: env::var("STRAVA_WEBHOOK_VERIFY_TOKEN").unwrap_or_default(),
                webhook_callback_url: env::var("STRAVA_WEBHOOK_CALLBACK_URL")
                    .unwrap_or_else(|_| format!("{api_base_url}/api/webhooks/strava")),
            },
            lazy_class_repair: env::var("LAZY_CLASS_REPAIR")
                .map_or(true, |v| v.to_lowercase() != "false"),
            api_base_url,
        };

        if config.strava.client_id.is_empty() {
            tracing::warn!("STRAVA_CLIENT_ID is not set; provider ingest will be unavailable");
        }

        Ok(config)
    }
}
