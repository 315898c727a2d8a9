use chrono::Local;
use tracing::{info, warn};

use super::RecommendationBuilder;
use crate::catalog::MAX_PLAYLIST_ADD_BATCH;
use crate::error::{Result, TasteError};
use crate::model::{PlaylistResult, RecommendedTrack};

pub const DEFAULT_DESCRIPTION: &str = "Personalized recommendations based on your music taste";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaylistOptions {
    /// Defaults to "Recommended Tracks - <today>".
    pub name: Option<String>,
    pub description: Option<String>,
    pub public: bool,
}

impl PlaylistOptions {
    pub fn resolved_name(&self) -> String {
        match &self.name {
            Some(name) if !name.trim().is_empty() => name.clone(),
            _ => format!("Recommended Tracks - {}", Local::now().format("%Y-%m-%d")),
        }
    }

    pub fn resolved_description(&self) -> String {
        self.description
            .clone()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string())
    }
}

impl RecommendationBuilder {
    /// Creates a playlist for `user_id` and fills it with `tracks` in order.
    ///
    /// Tracks go in sequential batches of [`MAX_PLAYLIST_ADD_BATCH`]. If a
    /// batch fails the playlist is kept and the error carries how many tracks
    /// made it in.
    pub async fn materialize_playlist(
        &self,
        user_id: &str,
        tracks: &[RecommendedTrack],
        options: &PlaylistOptions,
    ) -> Result<PlaylistResult> {
        let uris: Vec<String> = tracks.iter().map(|t| t.uri.clone()).collect();
        if uris.is_empty() {
            return Err(TasteError::NothingToAdd);
        }

        let name = options.resolved_name();
        let description = options.resolved_description();
        let created = self
            .retry
            .run_rate_limited("create playlist", || {
                self.client
                    .create_playlist(user_id, &name, options.public, &description)
            })
            .await?;
        info!("Created playlist \"{name}\" ({})", created.id);

        let mut result = PlaylistResult {
            playlist_id: created.id,
            playlist_url: created.url,
            added_count: 0,
        };
        for (index, batch) in uris.chunks(MAX_PLAYLIST_ADD_BATCH).enumerate() {
            let added = self
                .retry
                .run_rate_limited("playlist add batch", || {
                    self.client.add_tracks_to_playlist(&result.playlist_id, batch)
                })
                .await;
            match added {
                Ok(()) => result.added_count += batch.len(),
                Err(source) => {
                    warn!(
                        "Adding batch {} to playlist {} failed after {} tracks: {source}",
                        index + 1,
                        result.playlist_id,
                        result.added_count
                    );
                    return Err(TasteError::PartialPlaylistWrite {
                        playlist: result,
                        source,
                    });
                }
            }
        }
        info!(
            "Added {} tracks to playlist {}",
            result.added_count, result.playlist_id
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_name_has_date() {
        let name = PlaylistOptions::default().resolved_name();
        assert!(name.starts_with("Recommended Tracks - "));
        assert_eq!(name.len(), "Recommended Tracks - 2024-01-01".len());
    }

    #[test]
    fn test_blank_description_falls_back() {
        let options = PlaylistOptions {
            description: Some("  ".into()),
            ..Default::default()
        };
        assert_eq!(options.resolved_description(), DEFAULT_DESCRIPTION);
    }
}
