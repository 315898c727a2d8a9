use thiserror::Error;

use crate::catalog::ProviderError;
use crate::model::PlaylistResult;

pub type Result<T> = std::result::Result<T, TasteError>;

#[derive(Debug, Error)]
pub enum TasteError {
    /// No valid artist or genre seed survived validation. The recommendation
    /// request is never sent in this case.
    #[error("no usable recommendation seeds (need at least one artist or allow-listed genre)")]
    NoSeeds,

    /// Nothing to write to a new playlist.
    #[error("no tracks to add to the playlist")]
    NothingToAdd,

    /// The playlist exists but only part of the tracks made it in.
    #[error(
        "playlist {} created but only {} tracks were added: {source}",
        .playlist.playlist_id,
        .playlist.added_count
    )]
    PartialPlaylistWrite {
        playlist: PlaylistResult,
        #[source]
        source: ProviderError,
    },

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl TasteError {
    /// True when the caller has to send the user back through login.
    pub fn is_reauth_required(&self) -> bool {
        match self {
            TasteError::Provider(err) => err.is_fatal(),
            TasteError::PartialPlaylistWrite { source, .. } => source.is_fatal(),
            _ => false,
        }
    }
}
