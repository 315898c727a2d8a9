use anyhow::{anyhow, bail, Result};
use rspotify::{
    clients::{BaseClient, OAuthClient},
    scopes, AuthCodePkceSpotify, Config as SpotifyConfig, Credentials, OAuth,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::cache::Cache;
use crate::config::Config;

pub mod auth;
pub mod catalog;

pub const TOKEN_CACHE_KEY: &str = "tasteseed:spotify_token";
const TOKEN_TTL_SECS: u64 = 3600 * 24;

/// Builds the PKCE client. Returns an authorize URL when the user still has to
/// log in; `None` means a cached token was refreshed and the client is ready.
pub async fn build_spotify_client(
    config: &Config,
    cache: &Cache,
) -> Result<(Arc<Mutex<AuthCodePkceSpotify>>, Option<String>)> {
    let creds = Credentials::new(&config.client_id, &config.client_secret);

    let scopes = scopes!(
        "user-library-read",
        "playlist-read-private",
        "playlist-read-collaborative",
        "playlist-modify-public",
        "playlist-modify-private",
        "user-read-private"
    );

    let oauth = OAuth {
        redirect_uri: config.redirect_uri.clone(),
        scopes,
        state: auth::generate_state(),
        ..Default::default()
    };

    let sp_config = SpotifyConfig {
        token_refreshing: true,
        ..Default::default()
    };

    let mut spotify = AuthCodePkceSpotify::with_config(creds, oauth, sp_config);

    if let Ok(Some(token)) = cache.get_json::<rspotify::Token>(TOKEN_CACHE_KEY).await {
        info!("Loaded cached token from Redis");
        *spotify
            .token
            .lock()
            .await
            .map_err(|_| anyhow!("Spotify token lock poisoned"))? = Some(token);

        match spotify.refetch_token().await {
            Ok(_) => return Ok((Arc::new(Mutex::new(spotify)), None)),
            Err(e) => {
                warn!("Failed to refresh cached token ({e}), re-authenticating");
                *spotify
                    .token
                    .lock()
                    .await
                    .map_err(|_| anyhow!("Spotify token lock poisoned"))? = None;
                forget_token(cache).await;
            }
        }
    }

    let url = spotify.get_authorize_url(None)?;
    info!("Auth URL generated");

    Ok((Arc::new(Mutex::new(spotify)), Some(url)))
}

/// Exchanges the redirect `code` for a token and caches it.
pub async fn complete_auth(
    spotify: &Arc<Mutex<AuthCodePkceSpotify>>,
    result: &auth::AuthResult,
    cache: &Cache,
) -> Result<()> {
    let sp = spotify.lock().await;
    if result.state != sp.oauth.state {
        bail!("OAuth state mismatch, refusing the redirect");
    }
    sp.request_token(&result.code).await?;

    let token = sp
        .token
        .lock()
        .await
        .map_err(|_| anyhow!("Spotify token lock poisoned"))?
        .clone();
    if let Some(token) = token {
        cache
            .set_json(TOKEN_CACHE_KEY, &token, Some(TOKEN_TTL_SECS))
            .await
            .ok();
        info!("Token saved to Redis cache");
    }

    Ok(())
}

pub async fn forget_token(cache: &Cache) {
    cache.delete(TOKEN_CACHE_KEY).await.ok();
}

/// Refuses a session that belongs to a different account than the one the
/// user asked to act on.
pub fn ensure_expected_user(expected: Option<&str>, actual: &str) -> Result<()> {
    match expected {
        Some(expected) if expected != actual => bail!(
            "Logged in as {actual} but SPOTIFY_USER_ID is {expected}, refusing to touch the wrong account"
        ),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_user_must_match() {
        assert!(ensure_expected_user(None, "alice").is_ok());
        assert!(ensure_expected_user(Some("alice"), "alice").is_ok());
        let err = ensure_expected_user(Some("alice"), "mallory").unwrap_err();
        assert!(err.to_string().contains("mallory"));
    }
}
