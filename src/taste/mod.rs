//! Builds a [`TasteProfile`] from the user's liked songs and playlists.

pub mod fetch;
pub mod ranking;

use chrono::Utc;
use futures::{stream, StreamExt, TryStreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::catalog::{
    CatalogClient, ProviderError, MAX_ARTIST_BATCH, MAX_FEATURE_BATCH, MAX_LIBRARY_PAGE,
    MAX_PLAYLIST_ITEMS_PAGE,
};
use crate::error::Result;
use crate::model::{AudioFeatureVector, Playlist, TasteProfile, Track};
use crate::retry::RetryPolicy;

use self::fetch::{drain, paginate, Fetched};
use self::ranking::{count_artists, count_genres};

/// Hard cap on liked songs read per analysis.
pub const LIKED_TRACKS_CAP: usize = 500;
pub const TOP_GENRES: usize = 10;
pub const TOP_ARTISTS: usize = 10;
pub const GENRE_SEED_CANDIDATES: usize = 5;
pub const ARTIST_SEED_CANDIDATES: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzeConfig {
    pub include_playlists: bool,
    pub playlist_limit: usize,
    pub tracks_per_playlist: usize,
    /// Enrichment steps that would start after this much time are skipped and
    /// the profile is marked partial.
    pub max_analysis_time: Option<Duration>,
}

impl Default for AnalyzeConfig {
    fn default() -> Self {
        AnalyzeConfig {
            include_playlists: false,
            playlist_limit: 10,
            tracks_per_playlist: 50,
            max_analysis_time: None,
        }
    }
}

impl AnalyzeConfig {
    /// Identifies which library sources a profile was built from, so a cached
    /// profile is only reused for the same settings.
    pub fn cache_scope(&self) -> String {
        if self.include_playlists {
            format!(
                "liked+playlists:{}x{}",
                self.playlist_limit, self.tracks_per_playlist
            )
        } else {
            "liked".to_string()
        }
    }
}

pub struct TasteAnalyzer {
    client: Arc<dyn CatalogClient>,
    retry: RetryPolicy,
    concurrency: usize,
}

impl TasteAnalyzer {
    pub fn new(client: Arc<dyn CatalogClient>) -> Self {
        TasteAnalyzer {
            client,
            retry: RetryPolicy::default(),
            concurrency: 4,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Max number of lookups in flight at once. Results are still combined in
    /// request order.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub async fn analyze(&self, config: &AnalyzeConfig) -> Result<TasteProfile> {
        let started = Instant::now();
        let mut partial = false;

        let liked = self.fetch_liked_tracks().await?;
        partial |= !liked.complete;
        info!("Fetched {} liked songs", liked.items.len());

        let from_playlists = self.fetch_playlist_tracks(config).await?;
        partial |= !from_playlists.complete;
        if config.include_playlists {
            info!("Fetched {} playlist tracks", from_playlists.items.len());
        }

        let tracks = merge_tracks(liked.items.into_iter().chain(from_playlists.items));
        if tracks.is_empty() {
            warn!("No tracks to analyze");
            return Ok(TasteProfile {
                partial,
                elapsed_ms: started.elapsed().as_millis() as u64,
                ..TasteProfile::empty()
            });
        }
        info!("Analyzing {} unique tracks", tracks.len());

        let artist_ids = extract_artist_ids(&tracks);
        let artist_counts = count_artists(&tracks);

        let mut genres_by_artist: HashMap<String, Vec<String>> = HashMap::new();
        if over_budget(config, started) {
            warn!("Analysis time budget used up, skipping genre lookup");
            partial = true;
        } else {
            partial |= !self.resolve_genres(&artist_ids, &mut genres_by_artist).await?;
        }
        let genre_counts = count_genres(&tracks, &genres_by_artist);

        let features = if over_budget(config, started) {
            warn!("Analysis time budget used up, skipping audio features");
            partial = true;
            Fetched::empty()
        } else {
            let track_ids: Vec<String> = tracks.iter().map(|t| t.id.clone()).collect();
            self.resolve_audio_features(&track_ids).await?
        };
        partial |= !features.complete;

        let top_genres = genre_counts.top(TOP_GENRES);
        let top_artist_ids: Vec<String> = artist_counts
            .top(TOP_ARTISTS)
            .into_iter()
            .map(|(id, _)| id)
            .collect();

        let profile = TasteProfile {
            track_count: tracks.len(),
            unique_artist_count: artist_ids.len(),
            genre_seed_candidates: top_genres
                .iter()
                .take(GENRE_SEED_CANDIDATES)
                .map(|(genre, _)| genre.clone())
                .collect(),
            seed_artist_candidates: top_artist_ids
                .iter()
                .take(ARTIST_SEED_CANDIDATES)
                .cloned()
                .collect(),
            top_genres,
            top_artist_ids,
            avg_features: AudioFeatureVector::mean(&features.items),
            resolved_feature_count: features.items.len(),
            known_track_ids: tracks.into_iter().map(|t| t.id).collect(),
            partial,
            analyzed_at: Utc::now(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            "Analysis done in {}ms: {} tracks, {} artists, {} genres{}",
            profile.elapsed_ms,
            profile.track_count,
            profile.unique_artist_count,
            genre_counts.len(),
            if profile.partial { " (partial)" } else { "" }
        );
        Ok(profile)
    }

    /// Lazy page stream over the user's saved tracks, capped at
    /// [`LIKED_TRACKS_CAP`].
    pub fn liked_track_pages(
        &self,
    ) -> impl futures::Stream<Item = std::result::Result<Vec<Option<Track>>, ProviderError>> + '_
    {
        let client = &self.client;
        let retry = self.retry;
        paginate(MAX_LIBRARY_PAGE, LIKED_TRACKS_CAP, move |offset, limit| async move {
            retry
                .run("saved tracks page", || client.list_saved_tracks(offset, limit))
                .await
        })
    }

    pub async fn fetch_liked_tracks(&self) -> Result<Fetched<Track>> {
        let fetched = drain(self.liked_track_pages(), "liked songs").await?;
        Ok(resolvable(fetched))
    }

    /// Tracks from the user's own playlists, in playlist order. Returns nothing
    /// when `include_playlists` is off.
    pub async fn fetch_playlist_tracks(&self, config: &AnalyzeConfig) -> Result<Fetched<Track>> {
        if !config.include_playlists || config.playlist_limit == 0 {
            return Ok(Fetched::empty());
        }

        let client = &self.client;
        let retry = self.retry;
        let playlists: Fetched<Playlist> = drain(
            paginate(MAX_LIBRARY_PAGE, config.playlist_limit, move |offset, limit| async move {
                retry
                    .run("playlists page", || client.list_own_playlists(offset, limit))
                    .await
            }),
            "playlists",
        )
        .await?;
        debug!("Reading tracks from {} playlists", playlists.items.len());

        let tracks_per_playlist = config.tracks_per_playlist;
        let per_playlist: Vec<Fetched<Option<Track>>> = stream::iter(playlists.items.iter())
            .map(|playlist| {
                let id = playlist.id.as_str();
                drain(
                    paginate(
                        MAX_PLAYLIST_ITEMS_PAGE,
                        tracks_per_playlist,
                        move |offset, limit| async move {
                            retry
                                .run("playlist items page", || {
                                    client.list_playlist_tracks(id, offset, limit)
                                })
                                .await
                        },
                    ),
                    "playlist items",
                )
            })
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        let mut merged = Fetched {
            items: Vec::new(),
            complete: playlists.complete,
        };
        for fetched in per_playlist {
            merged.complete &= fetched.complete;
            merged.items.extend(fetched.items);
        }
        Ok(resolvable(merged))
    }

    /// Fills `genres_by_artist` for every id not already in it, in batches of
    /// [`MAX_ARTIST_BATCH`]. Returns `false` if any batch was lost to a
    /// transient error.
    pub async fn resolve_genres(
        &self,
        artist_ids: &[String],
        genres_by_artist: &mut HashMap<String, Vec<String>>,
    ) -> Result<bool> {
        let missing: Vec<String> = artist_ids
            .iter()
            .filter(|id| !genres_by_artist.contains_key(*id))
            .cloned()
            .collect();
        if missing.is_empty() {
            return Ok(true);
        }

        let client = &self.client;
        let retry = self.retry;
        let batches: Vec<_> = stream::iter(missing.chunks(MAX_ARTIST_BATCH))
            .map(|batch| retry.run("artist batch", move || client.get_artists(batch)))
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut complete = true;
        for (index, batch) in batches.into_iter().enumerate() {
            match batch {
                Ok(artists) => {
                    for artist in artists {
                        genres_by_artist.insert(artist.id, artist.genres);
                    }
                }
                Err(err) if err.is_fatal() => return Err(err.into()),
                Err(err) => {
                    warn!("Skipping artist batch {}: {err}", index + 1);
                    complete = false;
                }
            }
        }
        debug!("Genres known for {} artists", genres_by_artist.len());
        Ok(complete)
    }

    /// Audio features for `track_ids`, in the same order, leaving out tracks
    /// the provider had no features for.
    pub async fn resolve_audio_features(
        &self,
        track_ids: &[String],
    ) -> Result<Fetched<AudioFeatureVector>> {
        let client = &self.client;
        let retry = self.retry;
        let batches: Vec<_> = stream::iter(track_ids.chunks(MAX_FEATURE_BATCH))
            .map(|batch| retry.run("audio features batch", move || client.get_audio_features(batch)))
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut by_id: HashMap<String, AudioFeatureVector> = HashMap::new();
        let mut complete = true;
        for (index, batch) in batches.into_iter().enumerate() {
            match batch {
                Ok(features) => {
                    by_id.extend(
                        features
                            .into_iter()
                            .filter_map(|(id, vector)| vector.map(|v| (id, v))),
                    );
                }
                Err(err) if err.is_fatal() => return Err(err.into()),
                Err(err) => {
                    warn!("Skipping audio feature batch {}: {err}", index + 1);
                    complete = false;
                }
            }
        }

        let items: Vec<AudioFeatureVector> = track_ids
            .iter()
            .filter_map(|id| by_id.get(id).copied())
            .collect();
        debug!(
            "Audio features resolved for {}/{} tracks",
            items.len(),
            track_ids.len()
        );
        Ok(Fetched { items, complete })
    }
}

fn resolvable(fetched: Fetched<Option<Track>>) -> Fetched<Track> {
    let total = fetched.items.len();
    let items: Vec<Track> = fetched.items.into_iter().flatten().collect();
    if items.len() < total {
        debug!("Skipped {} entries without a track id", total - items.len());
    }
    Fetched {
        items,
        complete: fetched.complete,
    }
}

fn over_budget(config: &AnalyzeConfig, started: Instant) -> bool {
    config
        .max_analysis_time
        .is_some_and(|budget| started.elapsed() >= budget)
}

/// Collapses tracks by id, keeping the first occurrence and its position.
pub fn merge_tracks<I>(tracks: I) -> Vec<Track>
where
    I: IntoIterator<Item = Track>,
{
    let mut seen: HashSet<String> = HashSet::new();
    tracks
        .into_iter()
        .filter(|track| seen.insert(track.id.clone()))
        .collect()
}

/// Unique artist ids across `tracks`, in first-seen order.
pub fn extract_artist_ids(tracks: &[Track]) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut ids = Vec::new();
    for track in tracks {
        for artist in &track.artist_ids {
            if seen.insert(artist.as_str()) {
                ids.push(artist.clone());
            }
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(id: &str, artists: &[&str]) -> Track {
        Track::new(
            id,
            artists.iter().map(|a| a.to_string()).collect(),
            format!("spotify:track:{id}"),
        )
    }

    #[test]
    fn test_merge_keeps_first_occurrence() {
        let merged = merge_tracks(vec![
            track("a", &["x"]),
            track("b", &["y"]),
            track("a", &["z"]),
            track("c", &["x"]),
        ]);
        let ids: Vec<&str> = merged.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(merged[0].artist_ids, vec!["x"]);
    }

    #[test]
    fn test_extract_artist_ids_unique() {
        let tracks = vec![track("a", &["x", "y"]), track("b", &["y", "z"])];
        assert_eq!(extract_artist_ids(&tracks), vec!["x", "y", "z"]);
    }

    #[test]
    fn test_cache_scope_follows_sources() {
        let liked_only = AnalyzeConfig::default();
        let with_playlists = AnalyzeConfig {
            include_playlists: true,
            ..Default::default()
        };
        let fewer_playlists = AnalyzeConfig {
            playlist_limit: 3,
            ..with_playlists.clone()
        };
        assert_eq!(liked_only.cache_scope(), "liked");
        assert_eq!(with_playlists.cache_scope(), "liked+playlists:10x50");
        assert_ne!(with_playlists.cache_scope(), fewer_playlists.cache_scope());
        let budgeted = AnalyzeConfig {
            max_analysis_time: Some(Duration::from_secs(5)),
            ..Default::default()
        };
        assert_eq!(budgeted.cache_scope(), liked_only.cache_scope());
    }

    #[test]
    fn test_over_budget() {
        let mut config = AnalyzeConfig::default();
        assert!(!over_budget(&config, Instant::now()));
        config.max_analysis_time = Some(Duration::ZERO);
        assert!(over_budget(&config, Instant::now()));
    }
}
