// ABOUTME: Token store: expiry-buffered access-token retrieval with atomic refresh
// ABOUTME: Compare-and-set on the refresh token keeps concurrent workers from double-refreshing
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! Token lifecycle.
//!
//! `ensure_valid_token` returns the stored access token while it has more
//! than 60 seconds of life left; otherwise it performs the refresh grant
//! and overwrites the token triple. The row update is a compare-and-set on
//! the old refresh token: when two workers race, exactly one write wins and
//! the loser adopts the winner's stored tokens. A refresh failure is fatal
//! to the caller.

use anyhow::Result;
use chrono::Utc;
use tracing::info;

use crate::constants::oauth::TOKEN_EXPIRY_BUFFER_SECS;
use crate::database::Database;
use crate::models::StravaAccount;
use crate::providers::StravaClient;

/// Return a currently valid access token for the account, refreshing if
/// needed.
///
/// # Errors
///
/// Returns an error when the refresh grant fails or the account row
/// disappears mid-refresh. There is no silent retry.
pub async fn ensure_valid_token(
    db: &Database,
    strava: &StravaClient,
    account: &StravaAccount,
) -> Result<String> {
    let now = Utc::now().timestamp();
    if account.expires_at > now + TOKEN_EXPIRY_BUFFER_SECS {
        return Ok(account.access_token.clone());
    }

    let bundle = strava.refresh_token(&account.refresh_token).await?;

    let won_the_write = db
        .update_account_tokens(
            account.id,
            &account.refresh_token,
            &bundle.access_token,
            &bundle.refresh_token,
            bundle.expires_at,
        )
        .await?;

    if won_the_write {
        info!("refreshed token for athlete {}", account.strava_athlete_id);
        return Ok(bundle.access_token);
    }

    // Another worker refreshed first; observe the updated row
    let fresh = db
        .get_account(account.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("linked account disappeared during token refresh"))?;
    Ok(fresh.access_token)
}
