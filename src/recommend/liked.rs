use chrono::Local;
use futures::TryStreamExt;
use std::collections::HashSet;
use tracing::info;

use super::playlist::PlaylistOptions;
use super::RecommendationBuilder;
use crate::catalog::MAX_LIBRARY_PAGE;
use crate::error::Result;
use crate::model::{PlaylistResult, RecommendedTrack, Track};
use crate::taste::fetch::paginate;

pub const LIKED_DESCRIPTION: &str = "All of your liked songs";

impl RecommendationBuilder {
    /// Every liked song, in library order, with repeated URIs dropped.
    ///
    /// Unlike analysis there is no cap, and any page failure fails the whole
    /// read so a copy never silently misses songs.
    pub async fn all_liked_tracks(&self) -> Result<Vec<RecommendedTrack>> {
        let client = &self.client;
        let retry = self.retry;
        let entries: Vec<Option<Track>> =
            paginate(MAX_LIBRARY_PAGE, usize::MAX, move |offset, limit| async move {
                retry
                    .run("saved tracks page", || client.list_saved_tracks(offset, limit))
                    .await
            })
            .try_concat()
            .await?;

        let mut seen: HashSet<String> = HashSet::new();
        Ok(entries
            .into_iter()
            .flatten()
            .filter(|track| seen.insert(track.uri.clone()))
            .map(|track| RecommendedTrack {
                id: track.id,
                uri: track.uri,
            })
            .collect())
    }

    /// Copies the user's liked songs into a new playlist. Defaults to the
    /// name "Liked Songs - <today>".
    pub async fn save_liked_playlist(
        &self,
        user_id: &str,
        options: &PlaylistOptions,
    ) -> Result<PlaylistResult> {
        let tracks = self.all_liked_tracks().await?;
        info!("Copying {} liked songs", tracks.len());

        let options = PlaylistOptions {
            name: Some(liked_playlist_name(options)),
            description: Some(
                options
                    .description
                    .clone()
                    .filter(|d| !d.trim().is_empty())
                    .unwrap_or_else(|| LIKED_DESCRIPTION.to_string()),
            ),
            public: options.public,
        };
        self.materialize_playlist(user_id, &tracks, &options).await
    }
}

fn liked_playlist_name(options: &PlaylistOptions) -> String {
    match &options.name {
        Some(name) if !name.trim().is_empty() => name.clone(),
        _ => format!("Liked Songs - {}", Local::now().format("%Y-%m-%d")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_liked_playlist_name() {
        assert!(liked_playlist_name(&PlaylistOptions::default()).starts_with("Liked Songs - "));
        let named = PlaylistOptions {
            name: Some("Everything".into()),
            ..Default::default()
        };
        assert_eq!(liked_playlist_name(&named), "Everything");
    }
}
