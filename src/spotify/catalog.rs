use async_trait::async_trait;
use rspotify::{
    http::{HttpError, Query},
    model::{
        ArtistId, AudioFeatures, FullTrack, IdError, PlayableId, PlayableItem, PlaylistId,
        RecommendationsAttribute, TrackId, UserId,
    },
    prelude::*,
    AuthCodePkceSpotify, ClientError,
};
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::catalog::{
    AudioTargets, CatalogClient, Page, ProviderError, ProviderErrorKind, SeedSet,
};
use crate::model::{
    Artist, AudioFeature, AudioFeatureVector, Playlist, PlaylistRef, RecommendedTrack, Track,
};

/// [`CatalogClient`] backed by the Spotify Web API.
pub struct SpotifyCatalog {
    spotify: Arc<Mutex<AuthCodePkceSpotify>>,
}

impl SpotifyCatalog {
    pub fn new(spotify: Arc<Mutex<AuthCodePkceSpotify>>) -> Self {
        SpotifyCatalog { spotify }
    }

    pub async fn current_user_id(&self) -> Result<String, ProviderError> {
        let sp = self.spotify.lock().await;
        let user = sp.current_user().await.map_err(provider_error)?;
        Ok(user.id.id().to_string())
    }
}

fn provider_error(err: ClientError) -> ProviderError {
    let kind = match &err {
        ClientError::Http(http) => match http.as_ref() {
            HttpError::StatusCode(response) => {
                ProviderErrorKind::from_status(response.status().as_u16())
            }
            _ => ProviderErrorKind::Network,
        },
        _ => ProviderErrorKind::Other,
    };
    ProviderError::new(kind, err.to_string())
}

fn invalid_id(err: IdError) -> ProviderError {
    ProviderError::new(ProviderErrorKind::Validation, err.to_string())
}

fn track_from_full(track: FullTrack) -> Option<Track> {
    let id = track.id?;
    let artist_ids = track
        .artists
        .into_iter()
        .filter_map(|artist| artist.id)
        .map(|artist| artist.id().to_string())
        .collect();
    Some(Track::new(id.id(), artist_ids, id.uri()))
}

fn feature_vector(features: &AudioFeatures) -> AudioFeatureVector {
    AudioFeatureVector {
        energy: f64::from(features.energy),
        danceability: f64::from(features.danceability),
        valence: f64::from(features.valence),
        acousticness: f64::from(features.acousticness),
        speechiness: f64::from(features.speechiness),
        tempo: f64::from(features.tempo),
    }
}

#[derive(Deserialize)]
struct GenreSeeds {
    genres: Vec<String>,
}

/// Body of `GET recommendations/available-genre-seeds`.
fn parse_genre_seeds(body: &str) -> Result<BTreeSet<String>, ProviderError> {
    let seeds: GenreSeeds = serde_json::from_str(body).map_err(|e| {
        ProviderError::new(ProviderErrorKind::Other, format!("unreadable genre seeds: {e}"))
    })?;
    Ok(seeds.genres.into_iter().collect())
}

fn target_attribute(feature: AudioFeature, value: f64) -> RecommendationsAttribute {
    let value = value as f32;
    match feature {
        AudioFeature::Energy => RecommendationsAttribute::TargetEnergy(value),
        AudioFeature::Danceability => RecommendationsAttribute::TargetDanceability(value),
        AudioFeature::Valence => RecommendationsAttribute::TargetValence(value),
        AudioFeature::Acousticness => RecommendationsAttribute::TargetAcousticness(value),
        AudioFeature::Speechiness => RecommendationsAttribute::TargetSpeechiness(value),
        AudioFeature::Tempo => RecommendationsAttribute::TargetTempo(value),
    }
}

#[async_trait]
impl CatalogClient for SpotifyCatalog {
    async fn list_saved_tracks(
        &self,
        offset: u32,
        limit: u32,
    ) -> Result<Page<Option<Track>>, ProviderError> {
        let sp = self.spotify.lock().await;
        let page = sp
            .current_user_saved_tracks_manual(None, Some(limit), Some(offset))
            .await
            .map_err(provider_error)?;
        Ok(Page {
            has_next: page.next.is_some(),
            items: page
                .items
                .into_iter()
                .map(|saved| track_from_full(saved.track))
                .collect(),
        })
    }

    async fn list_own_playlists(
        &self,
        offset: u32,
        limit: u32,
    ) -> Result<Page<Playlist>, ProviderError> {
        let sp = self.spotify.lock().await;
        let page = sp
            .current_user_playlists_manual(Some(limit), Some(offset))
            .await
            .map_err(provider_error)?;
        Ok(Page {
            has_next: page.next.is_some(),
            items: page
                .items
                .into_iter()
                .map(|playlist| Playlist {
                    id: playlist.id.id().to_string(),
                    name: playlist.name,
                })
                .collect(),
        })
    }

    async fn list_playlist_tracks(
        &self,
        playlist_id: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Page<Option<Track>>, ProviderError> {
        let pid = PlaylistId::from_id(playlist_id).map_err(invalid_id)?;
        let sp = self.spotify.lock().await;
        let page = sp
            .playlist_items_manual(pid, None, None, Some(limit), Some(offset))
            .await
            .map_err(provider_error)?;
        Ok(Page {
            has_next: page.next.is_some(),
            items: page
                .items
                .into_iter()
                .map(|item| match item.track {
                    Some(PlayableItem::Track(track)) => track_from_full(track),
                    _ => None,
                })
                .collect(),
        })
    }

    async fn get_artists(&self, ids: &[String]) -> Result<Vec<Artist>, ProviderError> {
        let artist_ids = ids
            .iter()
            .map(|id| ArtistId::from_id(id.as_str()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(invalid_id)?;
        let sp = self.spotify.lock().await;
        let artists = sp.artists(artist_ids).await.map_err(provider_error)?;
        Ok(artists
            .into_iter()
            .map(|artist| Artist {
                id: artist.id.id().to_string(),
                genres: artist.genres,
            })
            .collect())
    }

    async fn get_audio_features(
        &self,
        ids: &[String],
    ) -> Result<Vec<(String, Option<AudioFeatureVector>)>, ProviderError> {
        let track_ids = ids
            .iter()
            .map(|id| TrackId::from_id(id.as_str()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(invalid_id)?;
        let sp = self.spotify.lock().await;
        let features = sp
            .tracks_features(track_ids)
            .await
            .map_err(provider_error)?
            .unwrap_or_default();

        let by_id: HashMap<String, AudioFeatureVector> = features
            .iter()
            .map(|f| (f.id.id().to_string(), feature_vector(f)))
            .collect();
        Ok(ids
            .iter()
            .map(|id| (id.clone(), by_id.get(id).copied()))
            .collect())
    }

    async fn list_available_genre_seeds(&self) -> Result<BTreeSet<String>, ProviderError> {
        let sp = self.spotify.lock().await;
        let body = sp
            .api_get("recommendations/available-genre-seeds", &Query::new())
            .await
            .map_err(provider_error)?;
        parse_genre_seeds(&body)
    }

    async fn get_recommendations(
        &self,
        seeds: &SeedSet,
        targets: &AudioTargets,
        limit: u32,
    ) -> Result<Vec<RecommendedTrack>, ProviderError> {
        let seed_artists = seeds
            .artist_ids
            .iter()
            .map(|id| ArtistId::from_id(id.as_str()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(invalid_id)?;
        let seed_genres: Vec<&str> = seeds.genre_names.iter().map(String::as_str).collect();
        let attributes: Vec<RecommendationsAttribute> = targets
            .values
            .iter()
            .map(|(feature, value)| target_attribute(*feature, *value))
            .collect();

        let sp = self.spotify.lock().await;
        let recommendations = sp
            .recommendations(
                attributes,
                (!seed_artists.is_empty()).then_some(seed_artists),
                (!seed_genres.is_empty()).then_some(seed_genres),
                None::<Vec<TrackId>>,
                None,
                Some(limit),
            )
            .await
            .map_err(provider_error)?;

        Ok(recommendations
            .tracks
            .into_iter()
            .filter_map(|track| track.id)
            .map(|id| RecommendedTrack {
                id: id.id().to_string(),
                uri: id.uri(),
            })
            .collect())
    }

    async fn create_playlist(
        &self,
        user_id: &str,
        name: &str,
        public: bool,
        description: &str,
    ) -> Result<PlaylistRef, ProviderError> {
        let uid = UserId::from_id(user_id).map_err(invalid_id)?;
        let sp = self.spotify.lock().await;
        let playlist = sp
            .user_playlist_create(uid, name, Some(public), None, Some(description))
            .await
            .map_err(provider_error)?;
        Ok(PlaylistRef {
            id: playlist.id.id().to_string(),
            url: playlist.external_urls.get("spotify").cloned(),
        })
    }

    async fn add_tracks_to_playlist(
        &self,
        playlist_id: &str,
        uris: &[String],
    ) -> Result<(), ProviderError> {
        let pid = PlaylistId::from_id(playlist_id).map_err(invalid_id)?;
        let items = uris
            .iter()
            .map(|uri| TrackId::from_uri(uri.as_str()).map(PlayableId::Track))
            .collect::<Result<Vec<_>, _>>()
            .map_err(invalid_id)?;
        let sp = self.spotify.lock().await;
        sp.playlist_add_items(pid, items, None)
            .await
            .map_err(provider_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_genre_seeds() {
        let genres = parse_genre_seeds(r#"{"genres": ["rock", "acoustic", "rock"]}"#).unwrap();
        assert_eq!(
            genres.into_iter().collect::<Vec<_>>(),
            vec!["acoustic".to_string(), "rock".to_string()]
        );

        let err = parse_genre_seeds(r#"{"seeds": []}"#).unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::Other);
    }

    #[test]
    fn test_target_attribute_mapping() {
        assert!(matches!(
            target_attribute(AudioFeature::Energy, 0.5),
            RecommendationsAttribute::TargetEnergy(v) if v == 0.5
        ));
        assert!(matches!(
            target_attribute(AudioFeature::Tempo, 120.0),
            RecommendationsAttribute::TargetTempo(v) if v == 120.0
        ));
    }
}
