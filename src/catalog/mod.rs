//! The slice of the music catalog API the taste pipeline needs.
//!
//! [`CatalogClient`] is implemented by [`SpotifyCatalog`](crate::spotify::catalog::SpotifyCatalog)
//! for the live service; tests swap in an in-memory fixture.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

use crate::model::{
    Artist, AudioFeature, AudioFeatureVector, Playlist, PlaylistRef, RecommendedTrack, Track,
};

/// Max page size for saved tracks and the user's playlists.
pub const MAX_LIBRARY_PAGE: u32 = 50;
/// Max page size for the items of one playlist.
pub const MAX_PLAYLIST_ITEMS_PAGE: u32 = 100;
/// Max ids per artist lookup.
pub const MAX_ARTIST_BATCH: usize = 50;
/// Max ids per audio-feature lookup.
pub const MAX_FEATURE_BATCH: usize = 100;
/// Max items per add-to-playlist call.
pub const MAX_PLAYLIST_ADD_BATCH: usize = 100;
/// Combined cap on artist + genre + track seeds.
pub const MAX_SEEDS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Whether the provider reported a next page.
    pub has_next: bool,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Page {
            items,
            has_next: false,
        }
    }
}

/// Coarse failure category. The pipeline never looks deeper than this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    Auth,
    Forbidden,
    RateLimited,
    NotFound,
    Validation,
    Network,
    Other,
}

impl ProviderErrorKind {
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => ProviderErrorKind::Auth,
            403 => ProviderErrorKind::Forbidden,
            404 => ProviderErrorKind::NotFound,
            429 => ProviderErrorKind::RateLimited,
            400 | 422 => ProviderErrorKind::Validation,
            500..=599 => ProviderErrorKind::Network,
            _ => ProviderErrorKind::Other,
        }
    }
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProviderErrorKind::Auth => "auth expired",
            ProviderErrorKind::Forbidden => "permission denied",
            ProviderErrorKind::RateLimited => "rate limited",
            ProviderErrorKind::NotFound => "not found",
            ProviderErrorKind::Validation => "rejected request",
            ProviderErrorKind::Network => "network error",
            ProviderErrorKind::Other => "provider error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        ProviderError {
            kind,
            message: message.into(),
        }
    }

    /// Auth and permission failures cannot be fixed by retrying and must reach
    /// the caller untouched.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind,
            ProviderErrorKind::Auth | ProviderErrorKind::Forbidden
        )
    }
}

/// Seeds for one recommendation request. Never holds more than [`MAX_SEEDS`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedSet {
    pub artist_ids: Vec<String>,
    pub genre_names: Vec<String>,
}

impl SeedSet {
    pub fn len(&self) -> usize {
        self.artist_ids.len() + self.genre_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// `target_<feature>` values sent with a recommendation request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioTargets {
    pub values: Vec<(AudioFeature, f64)>,
}

impl AudioTargets {
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Pairs of (`target_energy`, 0.65) style query parameters.
    pub fn params(&self) -> Vec<(String, f64)> {
        self.values
            .iter()
            .map(|(feature, value)| (feature.target_param(), *value))
            .collect()
    }
}

#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// `None` items are entries without a resolvable track id (local files,
    /// unavailable tracks, episodes). They still count toward the offset.
    async fn list_saved_tracks(
        &self,
        offset: u32,
        limit: u32,
    ) -> Result<Page<Option<Track>>, ProviderError>;

    async fn list_own_playlists(
        &self,
        offset: u32,
        limit: u32,
    ) -> Result<Page<Playlist>, ProviderError>;

    async fn list_playlist_tracks(
        &self,
        playlist_id: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Page<Option<Track>>, ProviderError>;

    async fn get_artists(&self, ids: &[String]) -> Result<Vec<Artist>, ProviderError>;

    async fn get_audio_features(
        &self,
        ids: &[String],
    ) -> Result<Vec<(String, Option<AudioFeatureVector>)>, ProviderError>;

    async fn list_available_genre_seeds(&self) -> Result<BTreeSet<String>, ProviderError>;

    async fn get_recommendations(
        &self,
        seeds: &SeedSet,
        targets: &AudioTargets,
        limit: u32,
    ) -> Result<Vec<RecommendedTrack>, ProviderError>;

    async fn create_playlist(
        &self,
        user_id: &str,
        name: &str,
        public: bool,
        description: &str,
    ) -> Result<PlaylistRef, ProviderError>;

    async fn add_tracks_to_playlist(
        &self,
        playlist_id: &str,
        uris: &[String],
    ) -> Result<(), ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(ProviderErrorKind::from_status(401), ProviderErrorKind::Auth);
        assert_eq!(ProviderErrorKind::from_status(429), ProviderErrorKind::RateLimited);
        assert_eq!(ProviderErrorKind::from_status(503), ProviderErrorKind::Network);
        assert_eq!(ProviderErrorKind::from_status(418), ProviderErrorKind::Other);
    }

    #[test]
    fn test_only_auth_failures_are_fatal() {
        assert!(ProviderError::new(ProviderErrorKind::Auth, "expired").is_fatal());
        assert!(ProviderError::new(ProviderErrorKind::Forbidden, "scope").is_fatal());
        assert!(!ProviderError::new(ProviderErrorKind::RateLimited, "slow down").is_fatal());
        assert!(!ProviderError::new(ProviderErrorKind::Network, "reset").is_fatal());
    }

    #[test]
    fn test_error_display() {
        let err = ProviderError::new(ProviderErrorKind::NotFound, "playlist abc");
        assert_eq!(err.to_string(), "not found: playlist abc");
    }
}
