pub mod report;

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    cache::Cache,
    catalog::CatalogClient,
    config::{Config, Mode},
    error::TasteError,
    model::{PlaylistResult, TasteProfile},
    recommend::RecommendationBuilder,
    retry::RetryPolicy,
    spotify::{
        auth::wait_for_auth_code, build_spotify_client, catalog::SpotifyCatalog, complete_auth,
        ensure_expected_user, forget_token,
    },
    taste::TasteAnalyzer,
};

pub struct App {
    config: Config,
    cache: Arc<Cache>,
}

impl App {
    pub fn new(config: Config, cache: Arc<Cache>) -> Self {
        App { config, cache }
    }

    pub async fn run(&self) -> Result<()> {
        // ── Spotify Auth ─────────────────────────────────────────────────────
        let (spotify_arc, auth_url) = build_spotify_client(&self.config, &self.cache).await?;

        if let Some(ref url) = auth_url {
            println!("Log in to Spotify to continue:\n  {url}\n");
            if let Err(e) = open::that(url) {
                warn!("Could not open browser: {e}");
            }
            let auth_result = wait_for_auth_code(&self.config.redirect_uri).await?;
            complete_auth(&spotify_arc, &auth_result, &self.cache).await?;
        }
        info!("Authenticated successfully");

        let spotify = Arc::new(SpotifyCatalog::new(spotify_arc));
        let user_id = spotify.current_user_id().await?;
        ensure_expected_user(self.config.expected_user_id.as_deref(), &user_id)?;
        let client: Arc<dyn CatalogClient> = spotify;

        let outcome = match self.config.mode {
            Mode::Recommend => self.run_pipeline(client, &user_id).await,
            Mode::SaveLiked => self.save_liked(client, &user_id).await,
        };
        match outcome {
            Err(e) if e.is_reauth_required() => {
                forget_token(&self.cache).await;
                Err(anyhow::Error::new(e).context("Spotify rejected the session, run again to log in"))
            }
            other => other.map_err(Into::into),
        }
    }

    fn retry(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.config.max_attempts,
            ..Default::default()
        }
    }

    async fn run_pipeline(
        &self,
        client: Arc<dyn CatalogClient>,
        user_id: &str,
    ) -> std::result::Result<(), TasteError> {
        let retry = self.retry();
        let scope = self.config.analyze.cache_scope();

        // ── Analyze ──────────────────────────────────────────────────────────
        let profile = match self.cached_profile(user_id, &scope).await {
            Some(profile) => profile,
            None => {
                let analyzer = TasteAnalyzer::new(client.clone())
                    .with_retry(retry)
                    .with_concurrency(self.config.concurrency);
                let profile = analyzer.analyze(&self.config.analyze).await?;
                if should_cache(&profile) {
                    self.cache.save_profile(user_id, &scope, &profile).await.ok();
                }
                profile
            }
        };

        print!("{}", report::profile_summary(&profile));
        if profile.is_empty() {
            println!("Not enough listening data yet. Like a few songs on Spotify and try again.");
            return Ok(());
        }

        // ── Recommend ────────────────────────────────────────────────────────
        let builder = RecommendationBuilder::new(client).with_retry(retry);
        let tracks = match builder.recommend(&profile, &self.config.recommend).await {
            Ok(tracks) => tracks,
            Err(TasteError::NoSeeds) => {
                println!("Couldn't find any artists or genres to base recommendations on.");
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        println!("\n{} recommended tracks", tracks.len());
        if tracks.is_empty() || self.config.dry_run {
            for track in &tracks {
                println!("  {}", track.uri);
            }
            return Ok(());
        }

        // ── Playlist ─────────────────────────────────────────────────────────
        report_playlist(
            builder
                .materialize_playlist(user_id, &tracks, &self.config.playlist)
                .await,
        )
    }

    async fn save_liked(
        &self,
        client: Arc<dyn CatalogClient>,
        user_id: &str,
    ) -> std::result::Result<(), TasteError> {
        let builder = RecommendationBuilder::new(client).with_retry(self.retry());
        match builder
            .save_liked_playlist(user_id, &self.config.playlist)
            .await
        {
            Err(TasteError::NothingToAdd) => {
                println!("No liked songs to copy.");
                Ok(())
            }
            outcome => report_playlist(outcome),
        }
    }

    async fn cached_profile(&self, user_id: &str, scope: &str) -> Option<TasteProfile> {
        if !self.config.reuse_profile {
            return None;
        }
        match self.cache.load_profile(user_id, scope).await {
            Ok(Some(profile)) if !profile.partial => {
                info!("Reusing taste profile from {}", profile.analyzed_at);
                Some(profile)
            }
            _ => None,
        }
    }
}

/// Only complete, non-empty profiles are worth reusing.
fn should_cache(profile: &TasteProfile) -> bool {
    !profile.is_empty() && !profile.partial
}

fn report_playlist(
    outcome: std::result::Result<PlaylistResult, TasteError>,
) -> std::result::Result<(), TasteError> {
    match outcome {
        Ok(result) => {
            print!("{}", report::playlist_summary(&result));
            Ok(())
        }
        Err(TasteError::PartialPlaylistWrite { playlist, source }) => {
            print!("{}", report::playlist_summary(&playlist));
            Err(TasteError::PartialPlaylistWrite { playlist, source })
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_complete_profiles_are_cached() {
        let mut profile = TasteProfile::empty();
        assert!(!should_cache(&profile));

        profile.track_count = 40;
        assert!(should_cache(&profile));

        profile.partial = true;
        assert!(!should_cache(&profile));
    }
}
