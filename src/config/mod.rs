use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::str::FromStr;
use std::time::Duration;
use strum_macros::{Display, EnumString};

use crate::recommend::playlist::PlaylistOptions;
use crate::recommend::RecommendOptions;
use crate::taste::AnalyzeConfig;

/// What a run does after login.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum Mode {
    /// Analyze the library and build a recommendations playlist.
    #[default]
    Recommend,
    /// Copy every liked song into a new playlist.
    SaveLiked,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub redis_url: String,
    pub mode: Mode,
    /// When set, the logged-in account must be this Spotify user id.
    pub expected_user_id: Option<String>,
    pub analyze: AnalyzeConfig,
    pub recommend: RecommendOptions,
    pub playlist: PlaylistOptions,
    pub concurrency: usize,
    pub max_attempts: u32,
    /// Reuse a profile cached less than an hour ago instead of re-analyzing.
    pub reuse_profile: bool,
    /// Stop after printing recommendations, without creating a playlist.
    pub dry_run: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenv().ok(); // .env is optional, plain environment variables work too

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key).with_context(|| format!("{key} is missing from .env or environment"))
        };

        let analyze = AnalyzeConfig {
            include_playlists: parse_or(&lookup, "TASTESEED_INCLUDE_PLAYLISTS", false)?,
            playlist_limit: parse_or(&lookup, "TASTESEED_PLAYLIST_LIMIT", 10)?,
            tracks_per_playlist: parse_or(&lookup, "TASTESEED_TRACKS_PER_PLAYLIST", 50)?,
            max_analysis_time: parse_opt::<u64, _>(&lookup, "TASTESEED_MAX_ANALYSIS_SECS")?
                .map(Duration::from_secs),
        };

        let recommend = RecommendOptions {
            limit: parse_or(&lookup, "TASTESEED_LIMIT", 30)?,
            use_audio_targets: parse_or(&lookup, "TASTESEED_USE_AUDIO_TARGETS", true)?,
            exclude_known: parse_or(&lookup, "TASTESEED_EXCLUDE_KNOWN", true)?,
        };

        let playlist = PlaylistOptions {
            name: lookup("TASTESEED_PLAYLIST_NAME"),
            description: lookup("TASTESEED_PLAYLIST_DESCRIPTION"),
            public: parse_or(&lookup, "TASTESEED_PLAYLIST_PUBLIC", false)?,
        };

        Ok(Config {
            client_id: required("SPOTIFY_CLIENT_ID")?,
            client_secret: required("SPOTIFY_CLIENT_SECRET")?,
            redirect_uri: lookup("SPOTIFY_REDIRECT_URI")
                .unwrap_or_else(|| "http://127.0.0.1:8989/login".to_string()),
            redis_url: lookup("REDIS_URL").unwrap_or_else(|| "redis://127.0.0.1:6379".to_string()),
            mode: parse_or(&lookup, "TASTESEED_MODE", Mode::Recommend)?,
            expected_user_id: lookup("SPOTIFY_USER_ID").filter(|id| !id.trim().is_empty()),
            analyze,
            recommend,
            playlist,
            concurrency: parse_or(&lookup, "TASTESEED_CONCURRENCY", 4)?,
            max_attempts: parse_or(&lookup, "TASTESEED_MAX_ATTEMPTS", 2)?,
            reuse_profile: parse_or(&lookup, "TASTESEED_REUSE_PROFILE", true)?,
            dry_run: parse_or(&lookup, "TASTESEED_DRY_RUN", false)?,
        })
    }
}

fn parse_opt<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("{key} has an invalid value: {raw}")),
        _ => Ok(None),
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    Ok(parse_opt(lookup, key)?.unwrap_or(default))
}
