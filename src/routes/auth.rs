// ABOUTME: Strava OAuth routes: authorize redirect and callback token exchange
// ABOUTME: Users are created implicitly on first account linkage
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::Redirect;
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::constants::oauth::STRAVA_DEFAULT_SCOPES;
use crate::errors::{AppError, AppResult};
use crate::models::{StravaAccount, User};
use crate::server::ServerResources;

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    code: String,
}

/// OAuth routes implementation
pub struct AuthRoutes;

impl AuthRoutes {
    /// Create the login and callback routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/auth/strava/login", get(Self::handle_login))
            .route("/auth/strava/callback", get(Self::handle_callback))
            .with_state(resources)
    }

    /// Redirect the user to the provider's authorization page
    async fn handle_login(
        State(resources): State<Arc<ServerResources>>,
    ) -> AppResult<Redirect> {
        let url = resources.strava.authorize_url()?;
        Ok(Redirect::temporary(&url))
    }

    /// Exchange the authorization code and link (or relink) the account
    async fn handle_callback(
        State(resources): State<Arc<ServerResources>>,
        Query(query): Query<CallbackQuery>,
    ) -> AppResult<Redirect> {
        let bundle = resources
            .strava
            .exchange_code(&query.code)
            .await
            .map_err(|e| AppError::invalid_input(format!("Failed to exchange token: {e}")))?;

        let athlete_id = bundle
            .athlete_id
            .ok_or_else(|| AppError::invalid_input("No athlete id in token response"))?;

        let db = &resources.database;
        let now = Utc::now();

        let account = match db.get_account_by_athlete_id(athlete_id).await? {
            Some(existing) => StravaAccount {
                access_token: bundle.access_token,
                refresh_token: bundle.refresh_token,
                expires_at: bundle.expires_at,
                updated_at: now,
                ..existing
            },
            None => {
                // First linkage creates the owning user implicitly
                let user = User::new(None);
                db.create_user(&user).await?;
                info!("created user {} for athlete {athlete_id}", user.id);
                StravaAccount {
                    id: Uuid::new_v4(),
                    user_id: user.id,
                    strava_athlete_id: athlete_id,
                    access_token: bundle.access_token,
                    refresh_token: bundle.refresh_token,
                    expires_at: bundle.expires_at,
                    scope: STRAVA_DEFAULT_SCOPES.to_owned(),
                    created_at: now,
                    updated_at: now,
                }
            }
        };
        db.upsert_strava_account(&account).await?;

        let target = format!("{}?connected=true", resources.config.app_base_url);
        Ok(Redirect::temporary(&target))
    }
}
