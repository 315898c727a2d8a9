use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, Display, EnumIter};

/// A track from the user's library. Identity is `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    /// Artist ids in credit order, no duplicates.
    pub artist_ids: Vec<String>,
    pub uri: String,
}

impl Track {
    pub fn new(id: impl Into<String>, artist_ids: Vec<String>, uri: impl Into<String>) -> Self {
        let mut unique: Vec<String> = Vec::with_capacity(artist_ids.len());
        for artist in artist_ids {
            if !unique.contains(&artist) {
                unique.push(artist);
            }
        }
        Track {
            id: id.into(),
            artist_ids: unique,
            uri: uri.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artist {
    pub id: String,
    pub genres: Vec<String>,
}

/// A playlist owned (or followed) by the current user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playlist {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum AudioFeature {
    Energy,
    Danceability,
    Valence,
    Acousticness,
    Speechiness,
    Tempo,
}

impl AudioFeature {
    /// Query parameter name understood by the recommendation endpoint.
    pub fn target_param(self) -> String {
        format!("target_{self}")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioFeatureVector {
    pub energy: f64,
    pub danceability: f64,
    pub valence: f64,
    pub acousticness: f64,
    pub speechiness: f64,
    /// Beats per minute.
    pub tempo: f64,
}

impl AudioFeatureVector {
    pub fn get(&self, feature: AudioFeature) -> f64 {
        match feature {
            AudioFeature::Energy => self.energy,
            AudioFeature::Danceability => self.danceability,
            AudioFeature::Valence => self.valence,
            AudioFeature::Acousticness => self.acousticness,
            AudioFeature::Speechiness => self.speechiness,
            AudioFeature::Tempo => self.tempo,
        }
    }

    fn field_mut(&mut self, feature: AudioFeature) -> &mut f64 {
        match feature {
            AudioFeature::Energy => &mut self.energy,
            AudioFeature::Danceability => &mut self.danceability,
            AudioFeature::Valence => &mut self.valence,
            AudioFeature::Acousticness => &mut self.acousticness,
            AudioFeature::Speechiness => &mut self.speechiness,
            AudioFeature::Tempo => &mut self.tempo,
        }
    }

    /// Field-wise arithmetic mean. `None` for an empty input.
    pub fn mean<'a, I>(vectors: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a AudioFeatureVector>,
    {
        let mut sum = AudioFeatureVector::default();
        let mut count = 0usize;
        for vector in vectors {
            for feature in AudioFeature::iter() {
                *sum.field_mut(feature) += vector.get(feature);
            }
            count += 1;
        }
        if count == 0 {
            return None;
        }
        for feature in AudioFeature::iter() {
            *sum.field_mut(feature) /= count as f64;
        }
        Some(sum)
    }
}

/// Snapshot of a user's listening taste, produced by
/// [`TasteAnalyzer::analyze`](crate::taste::TasteAnalyzer::analyze).
///
/// A profile with `track_count == 0` means there was not enough data to
/// analyze; check [`TasteProfile::is_empty`] before recommending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TasteProfile {
    pub track_count: usize,
    pub unique_artist_count: usize,
    pub top_genres: Vec<(String, usize)>,
    pub top_artist_ids: Vec<String>,
    pub avg_features: Option<AudioFeatureVector>,
    pub resolved_feature_count: usize,
    pub genre_seed_candidates: Vec<String>,
    pub seed_artist_candidates: Vec<String>,
    /// Every deduplicated library track id, so recommendations can skip
    /// songs the user already has.
    pub known_track_ids: Vec<String>,
    /// Set when a fetch stopped early or an enrichment step was skipped.
    pub partial: bool,
    pub analyzed_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

impl TasteProfile {
    pub fn empty() -> Self {
        TasteProfile {
            track_count: 0,
            unique_artist_count: 0,
            top_genres: Vec::new(),
            top_artist_ids: Vec::new(),
            avg_features: None,
            resolved_feature_count: 0,
            genre_seed_candidates: Vec::new(),
            seed_artist_candidates: Vec::new(),
            known_track_ids: Vec::new(),
            partial: false,
            analyzed_at: Utc::now(),
            elapsed_ms: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.track_count == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendedTrack {
    pub id: String,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistRef {
    pub id: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaylistResult {
    pub playlist_id: String,
    pub playlist_url: Option<String>,
    pub added_count: usize,
}
