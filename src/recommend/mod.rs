//! Turns a [`TasteProfile`] into recommendation requests and playlists.

pub mod liked;
pub mod playlist;
pub mod seeds;

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::catalog::{AudioTargets, CatalogClient, SeedSet};
use crate::error::{Result, TasteError};
use crate::model::{RecommendedTrack, TasteProfile};
use crate::retry::RetryPolicy;

use self::seeds::validate_genres;

pub const MIN_LIMIT: u32 = 10;
pub const MAX_LIMIT: u32 = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecommendOptions {
    /// Clamped into `MIN_LIMIT..=MAX_LIMIT`.
    pub limit: u32,
    pub use_audio_targets: bool,
    /// Leave out tracks already in the analyzed library.
    pub exclude_known: bool,
}

impl Default for RecommendOptions {
    fn default() -> Self {
        RecommendOptions {
            limit: 30,
            use_audio_targets: true,
            exclude_known: true,
        }
    }
}

impl RecommendOptions {
    pub fn effective_limit(&self) -> u32 {
        self.limit.clamp(MIN_LIMIT, MAX_LIMIT)
    }
}

pub struct RecommendationBuilder {
    client: Arc<dyn CatalogClient>,
    retry: RetryPolicy,
}

impl RecommendationBuilder {
    pub fn new(client: Arc<dyn CatalogClient>) -> Self {
        RecommendationBuilder {
            client,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Genre names the provider accepts as seeds.
    pub async fn available_genre_seeds(&self) -> Result<BTreeSet<String>> {
        let genres = self
            .retry
            .run("genre seeds", || self.client.list_available_genre_seeds())
            .await?;
        debug!("Provider accepts {} genre seeds", genres.len());
        Ok(genres)
    }

    /// Builds the seed set for `profile`. Fails with [`TasteError::NoSeeds`]
    /// when nothing usable is left; the allow-list is only fetched when the
    /// profile has genre candidates.
    pub async fn seed_set(&self, profile: &TasteProfile) -> Result<SeedSet> {
        let artists = &profile.seed_artist_candidates;
        let candidates = &profile.genre_seed_candidates;
        if artists.is_empty() && candidates.is_empty() {
            return Err(TasteError::NoSeeds);
        }

        let genres = if candidates.is_empty() {
            Vec::new()
        } else {
            match self.available_genre_seeds().await {
                Ok(allowed) => {
                    let valid = validate_genres(candidates, &allowed);
                    if valid.len() < candidates.len() {
                        debug!(
                            "Dropped {} genre candidates the provider does not accept",
                            candidates.len() - valid.len()
                        );
                    }
                    valid
                }
                Err(TasteError::Provider(err)) if !err.is_fatal() => {
                    // unvalidated genres would get the whole request rejected
                    warn!("Genre allow-list unavailable ({err}), seeding from artists only");
                    Vec::new()
                }
                Err(err) => return Err(err),
            }
        };

        let seeds = SeedSet::assemble(artists, &genres);
        if seeds.is_empty() {
            return Err(TasteError::NoSeeds);
        }
        Ok(seeds)
    }

    pub async fn recommend(
        &self,
        profile: &TasteProfile,
        options: &RecommendOptions,
    ) -> Result<Vec<RecommendedTrack>> {
        let seeds = self.seed_set(profile).await?;
        let targets = if options.use_audio_targets {
            AudioTargets::from_profile(profile)
        } else {
            AudioTargets::default()
        };
        let limit = options.effective_limit();
        info!(
            "Requesting {limit} recommendations from {} artist and {} genre seeds ({} targets)",
            seeds.artist_ids.len(),
            seeds.genre_names.len(),
            targets.values.len()
        );

        let tracks = self
            .retry
            .run("recommendations", || {
                self.client.get_recommendations(&seeds, &targets, limit)
            })
            .await?;

        let known: HashSet<&str> = if options.exclude_known {
            profile.known_track_ids.iter().map(String::as_str).collect()
        } else {
            HashSet::new()
        };
        let received = tracks.len();
        let tracks = filter_recommendations(tracks, &known, limit as usize);
        if tracks.len() < received {
            debug!(
                "Kept {} of {received} recommended tracks after filtering",
                tracks.len()
            );
        }
        Ok(tracks)
    }
}

/// Drops tracks without an id, repeats and `known` ids, then cuts to `limit`.
fn filter_recommendations(
    tracks: Vec<RecommendedTrack>,
    known: &HashSet<&str>,
    limit: usize,
) -> Vec<RecommendedTrack> {
    let mut seen: HashSet<String> = HashSet::new();
    tracks
        .into_iter()
        .filter(|t| !t.id.is_empty() && !t.uri.is_empty())
        .filter(|t| !known.contains(t.id.as_str()))
        .filter(|t| seen.insert(t.id.clone()))
        .take(limit)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(id: &str) -> RecommendedTrack {
        RecommendedTrack {
            id: id.to_string(),
            uri: format!("spotify:track:{id}"),
        }
    }

    #[test]
    fn test_limit_is_clamped() {
        let mut options = RecommendOptions::default();
        assert_eq!(options.effective_limit(), 30);
        options.limit = 3;
        assert_eq!(options.effective_limit(), MIN_LIMIT);
        options.limit = 500;
        assert_eq!(options.effective_limit(), MAX_LIMIT);
    }

    #[test]
    fn test_filter_drops_known_and_repeats() {
        let known: HashSet<&str> = ["b"].into_iter().collect();
        let tracks = vec![rec("a"), rec("b"), rec("a"), rec(""), rec("c"), rec("d")];
        let kept = filter_recommendations(tracks, &known, 2);
        let ids: Vec<&str> = kept.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }
}
