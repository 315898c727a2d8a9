use std::collections::BTreeSet;
use strum::IntoEnumIterator;

use crate::catalog::{AudioTargets, SeedSet, MAX_SEEDS};
use crate::model::{AudioFeature, TasteProfile};

pub const MAX_SEED_ARTISTS: usize = 2;
pub const MAX_SEED_GENRES: usize = 5;

/// Keeps the candidates the provider accepts as genre seeds, in candidate
/// order. Duplicates are dropped.
pub fn validate_genres(candidates: &[String], allowed: &BTreeSet<String>) -> Vec<String> {
    let mut valid: Vec<String> = Vec::new();
    for genre in candidates {
        if allowed.contains(genre) && !valid.contains(genre) {
            valid.push(genre.clone());
        }
    }
    valid
}

impl SeedSet {
    /// Artists first (at most two), then genres fill what is left of the
    /// combined cap.
    pub fn assemble(artist_ids: &[String], genres: &[String]) -> Self {
        let mut artists: Vec<String> = Vec::new();
        for id in artist_ids {
            if artists.len() == MAX_SEED_ARTISTS.min(MAX_SEEDS) {
                break;
            }
            if !artists.contains(id) {
                artists.push(id.clone());
            }
        }
        let room = (MAX_SEEDS - artists.len()).min(MAX_SEED_GENRES);
        let genre_names = genres.iter().take(room).cloned().collect();
        SeedSet {
            artist_ids: artists,
            genre_names,
        }
    }
}

impl AudioTargets {
    /// One target per feature of the profile's average. Empty when no track
    /// had resolvable features.
    pub fn from_profile(profile: &TasteProfile) -> Self {
        let Some(avg) = profile.avg_features else {
            return AudioTargets::default();
        };
        let values = AudioFeature::iter()
            .map(|feature| (feature, avg.get(feature)))
            .filter(|(_, value)| value.is_finite())
            .collect();
        AudioTargets { values }
    }
}
