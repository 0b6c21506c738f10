// ABOUTME: Provider error taxonomy with distinguishable rate-limit and scope failures
// ABOUTME: The job queue decides retry policy; the client only classifies
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! Error types for provider API access.
//!
//! Rate limiting (429) and insufficient scope (403) are first-class variants
//! so callers can route them differently: the queue layer decides backoff
//! for rate limits, manual sync surfaces scope problems to the user.

use thiserror::Error;

use crate::errors::{AppError, ErrorCode};

/// Errors surfaced by provider clients
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider rate limited our request (HTTP 429)
    #[error("provider rate limit exceeded")]
    RateLimited,

    /// The granted OAuth scope does not cover the request (HTTP 403)
    #[error("provider scope insufficient: {0}")]
    ScopeInsufficient(String),

    /// Any other non-success API response
    #[error("provider API error: {status} - {body}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body, for logs
        body: String,
    },

    /// Connection, TLS, or timeout failure before a response arrived
    #[error("provider transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Response arrived but could not be decoded
    #[error("provider response decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Client-side misconfiguration (missing credentials, bad URL)
    #[error("provider configuration error: {0}")]
    Config(String),
}

impl ProviderError {
    /// True when the failure is the provider telling us to back off
    #[must_use]
    pub const fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited)
    }
}

impl From<ProviderError> for AppError {
    fn from(error: ProviderError) -> Self {
        match error {
            ProviderError::RateLimited => {
                Self::new(ErrorCode::ExternalRateLimited, "provider rate limit exceeded")
            }
            ProviderError::ScopeInsufficient(msg) => Self::new(ErrorCode::ExternalAuthFailed, msg),
            ProviderError::Config(msg) => Self::new(ErrorCode::ConfigError, msg),
            other => Self::new(ErrorCode::ExternalServiceError, other.to_string()),
        }
    }
}
