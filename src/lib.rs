//! Builds a taste profile from a Spotify library and turns it into a
//! recommendation playlist.
//!
//! [`taste::TasteAnalyzer`] reads liked songs (and optionally playlists),
//! ranks genres and artists, and averages audio features.
//! [`recommend::RecommendationBuilder`] turns that profile into seeds, asks the
//! catalog for recommendations and writes them to a new playlist.

pub mod app;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod model;
pub mod recommend;
pub mod retry;
pub mod spotify;
pub mod taste;
