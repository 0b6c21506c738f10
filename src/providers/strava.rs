// ABOUTME: Strava API integration: OAuth token exchange/refresh, activity and stream fetching
// ABOUTME: Raw summaries are returned verbatim; canonical parsing happens in ingest
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! Typed access to the Strava REST API.
//!
//! The client is constructed once from configuration and injected wherever
//! provider access is needed; it holds no mutable state. Stream fetches use
//! the channel-keyed response mode and tolerate missing channels.

use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::StravaCredentials;
use crate::constants::{oauth, strava_api};
use crate::models::StreamSet;
use crate::utils::http_client::shared_client;

use super::ProviderError;

/// Configuration for Strava API integration
#[derive(Debug, Clone)]
pub struct StravaConfig {
    /// OAuth client ID
    pub client_id: String,
    /// OAuth client secret
    pub client_secret: String,
    /// Registered redirect URI
    pub redirect_uri: String,
    /// API base URL
    pub base_url: String,
    /// Auth URL
    pub auth_url: String,
    /// Token URL
    pub token_url: String,
}

impl StravaConfig {
    /// Build from process credentials with the production endpoints
    #[must_use]
    pub fn from_credentials(credentials: &StravaCredentials) -> Self {
        Self {
            client_id: credentials.client_id.clone(),
            client_secret: credentials.client_secret.clone(),
            redirect_uri: credentials.redirect_uri.clone(),
            base_url: strava_api::BASE_URL.to_owned(),
            auth_url: strava_api::AUTH_URL.to_owned(),
            token_url: strava_api::TOKEN_URL.to_owned(),
        }
    }
}

/// Result of a token exchange or refresh
#[derive(Debug, Clone)]
pub struct TokenBundle {
    /// New access token
    pub access_token: String,
    /// New refresh token
    pub refresh_token: String,
    /// Expiry as unix seconds
    pub expires_at: i64,
    /// Athlete id, present on the initial code exchange
    pub athlete_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_at: i64,
    athlete: Option<TokenAthlete>,
}

#[derive(Debug, Deserialize)]
struct TokenAthlete {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct StreamEnvelope {
    data: Value,
}

/// Typed Strava REST client
pub struct StravaClient {
    client: &'static Client,
    config: StravaConfig,
}

impl StravaClient {
    /// Create a client over the shared pooled HTTP client
    #[must_use]
    pub fn new(config: StravaConfig) -> Self {
        Self {
            client: shared_client(),
            config,
        }
    }

    /// Build the OAuth authorization redirect URL.
    ///
    /// # Errors
    ///
    /// Returns an error when the client id is unconfigured or the auth URL
    /// cannot be parsed.
    pub fn authorize_url(&self) -> Result<String, ProviderError> {
        if self.config.client_id.is_empty() {
            return Err(ProviderError::Config("client id not configured".to_owned()));
        }

        let mut url = url::Url::parse(&self.config.auth_url)
            .map_err(|e| ProviderError::Config(format!("bad auth url: {e}")))?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("approval_prompt", "force")
            .append_pair("scope", oauth::STRAVA_DEFAULT_SCOPES);

        Ok(url.into())
    }

    /// Exchange an authorization code for tokens.
    ///
    /// # Errors
    ///
    /// Returns an error when credentials are unconfigured, the request
    /// fails, or the response cannot be decoded.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenBundle, ProviderError> {
        if self.config.client_id.is_empty() || self.config.client_secret.is_empty() {
            return Err(ProviderError::Config(
                "client credentials not configured".to_owned(),
            ));
        }

        let response = self
            .client
            .post(&self.config.token_url)
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await?;

        let token: TokenResponse = Self::check_status(response).await?.json().await?;
        if let Some(ref athlete) = token.athlete {
            info!("authenticated Strava athlete {}", athlete.id);
        }
        Ok(Self::bundle(token))
    }

    /// Exchange a refresh token for a fresh token triple.
    ///
    /// # Errors
    ///
    /// Returns an error when credentials are unconfigured, the request
    /// fails, or the response cannot be decoded. A refresh failure is fatal
    /// to the caller; there is no silent retry here.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenBundle, ProviderError> {
        if self.config.client_id.is_empty() || self.config.client_secret.is_empty() {
            return Err(ProviderError::Config(
                "client credentials not configured".to_owned(),
            ));
        }

        let response = self
            .client
            .post(&self.config.token_url)
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await?;

        let token: TokenResponse = Self::check_status(response).await?.json().await?;
        Ok(Self::bundle(token))
    }

    /// Fetch one page of activity summaries after the given unix time.
    ///
    /// Summaries are returned as raw JSON documents; the ingest layer
    /// extracts canonical fields and retains the payload verbatim.
    ///
    /// # Errors
    ///
    /// Returns `RateLimited` on 429, `ScopeInsufficient` on 403, and an API
    /// or transport error otherwise.
    pub async fn fetch_activities_since(
        &self,
        access_token: &str,
        after_unix: i64,
        per_page: u32,
    ) -> Result<Vec<Value>, ProviderError> {
        let url = format!("{}/athlete/activities", self.config.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(access_token)
            .query(&[
                ("after", after_unix.to_string()),
                ("per_page", per_page.to_string()),
            ])
            .send()
            .await?;

        let summaries: Vec<Value> = Self::check_status(response).await?.json().await?;
        info!("fetched {} activity summaries", summaries.len());
        Ok(summaries)
    }

    /// Fetch one activity's detail document.
    ///
    /// # Errors
    ///
    /// Returns `RateLimited` on 429, `ScopeInsufficient` on 403, and an API
    /// or transport error otherwise.
    pub async fn fetch_activity(
        &self,
        access_token: &str,
        activity_id: i64,
    ) -> Result<Value, ProviderError> {
        let url = format!("{}/activities/{activity_id}", self.config.base_url);
        let response = self.client.get(&url).bearer_auth(access_token).send().await?;
        Ok(Self::check_status(response).await?.json().await?)
    }

    /// Fetch sample streams for an activity, keyed by channel.
    ///
    /// Missing channels are simply absent from the returned map.
    ///
    /// # Errors
    ///
    /// Returns `RateLimited` on 429, `ScopeInsufficient` on 403, and an API
    /// or transport error otherwise.
    pub async fn fetch_streams(
        &self,
        access_token: &str,
        activity_id: i64,
        channels: &[&str],
    ) -> Result<StreamSet, ProviderError> {
        let keys = channels.join(",");
        let url = format!(
            "{}/activities/{activity_id}/streams/{keys}",
            self.config.base_url
        );
        let response = self
            .client
            .get(&url)
            .bearer_auth(access_token)
            .query(&[("key_by_type", "true")])
            .send()
            .await?;

        let envelopes: std::collections::HashMap<String, StreamEnvelope> =
            Self::check_status(response).await?.json().await?;

        let mut streams = StreamSet::new();
        for (channel, envelope) in envelopes {
            streams.insert(channel, envelope.data);
        }
        Ok(streams)
    }

    fn bundle(token: TokenResponse) -> TokenBundle {
        TokenBundle {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at: token.expires_at,
            athlete_id: token.athlete.map(|a| a.id),
        }
    }

    /// Classify non-success responses. The queue layer, not this client,
    /// decides retry and backoff policy for rate limits.
    async fn check_status(response: Response) -> Result<Response, ProviderError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_else(|e| {
            warn!("failed to read error response body: {e}");
            "unable to read error response".to_owned()
        });

        match status {
            StatusCode::TOO_MANY_REQUESTS => {
                warn!("Strava rate limit exceeded");
                Err(ProviderError::RateLimited)
            }
            StatusCode::FORBIDDEN => Err(ProviderError::ScopeInsufficient(format!(
                "missing scope for request: {body}"
            ))),
            _ => Err(ProviderError::Api {
                status: status.as_u16(),
                body,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> StravaConfig {
        StravaConfig {
            client_id: "1234".to_owned(),
            client_secret: "secret".to_owned(),
            redirect_uri: "http://localhost:8000/api/auth/strava/callback".to_owned(),
            base_url: strava_api::BASE_URL.to_owned(),
            auth_url: strava_api::AUTH_URL.to_owned(),
            token_url: strava_api::TOKEN_URL.to_owned(),
        }
    }

    #[test]
    fn authorize_url_carries_client_and_scopes() {
        let client = StravaClient::new(test_config());
        let url = client.authorize_url().unwrap();
        assert!(url.starts_with("https://www.strava.com/oauth/authorize?"));
        assert!(url.contains("client_id=1234"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("approval_prompt=force"));
        assert!(url.contains("activity%3Aread_all"));
    }

    #[test]
    fn authorize_url_requires_client_id() {
        let mut config = test_config();
        config.client_id = String::new();
        let client = StravaClient::new(config);
        assert!(client.authorize_url().is_err());
    }

    #[test]
    fn token_response_parses_with_and_without_athlete() {
        let with: TokenResponse = serde_json::from_str(
            r#"{"access_token":"a","refresh_token":"r","expires_at":1700000000,
                "athlete":{"id":42,"username":"runner"}}"#,
        )
        .unwrap();
        assert_eq!(with.athlete.map(|a| a.id), Some(42));

        let without: TokenResponse = serde_json::from_str(
            r#"{"access_token":"a","refresh_token":"r","expires_at":1700000000}"#,
        )
        .unwrap();
        assert!(without.athlete.is_none());
    }
}
