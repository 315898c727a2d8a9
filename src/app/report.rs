use std::fmt::Write;
use strum::IntoEnumIterator;

use crate::model::{AudioFeature, PlaylistResult, TasteProfile};

const BAR_WIDTH: usize = 20;

/// Fixed-width bar for a value in `0.0..=1.0`.
fn bar(value: f64) -> String {
    let filled = ((value.clamp(0.0, 1.0) * BAR_WIDTH as f64).round()) as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled))
}

pub fn profile_summary(profile: &TasteProfile) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Analyzed {} tracks by {} artists in {} ms{}",
        profile.track_count,
        profile.unique_artist_count,
        profile.elapsed_ms,
        if profile.partial { " (partial)" } else { "" }
    );

    if !profile.top_genres.is_empty() {
        let _ = writeln!(out, "\nTop genres");
        for (genre, count) in &profile.top_genres {
            let _ = writeln!(out, "  {count:>4}  {genre}");
        }
    }

    if let Some(features) = &profile.avg_features {
        let _ = writeln!(
            out,
            "\nAudio profile ({} tracks with features)",
            profile.resolved_feature_count
        );
        for feature in AudioFeature::iter() {
            let value = features.get(feature);
            if feature == AudioFeature::Tempo {
                let _ = writeln!(out, "  {:<13} {value:.0} bpm", feature.to_string());
            } else {
                let _ = writeln!(out, "  {:<13} {} {value:.2}", feature.to_string(), bar(value));
            }
        }
    }
    out
}

pub fn playlist_summary(result: &PlaylistResult) -> String {
    let mut out = format!(
        "Added {} tracks to playlist {}\n",
        result.added_count, result.playlist_id
    );
    if let Some(url) = &result.playlist_url {
        let _ = writeln!(out, "  {url}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AudioFeatureVector;

    #[test]
    fn test_bar_is_clamped() {
        assert_eq!(bar(0.0), "░".repeat(BAR_WIDTH));
        assert_eq!(bar(1.5), "█".repeat(BAR_WIDTH));
        assert_eq!(bar(0.5).chars().filter(|c| *c == '█').count(), 10);
    }

    #[test]
    fn test_profile_summary_lists_genres_and_features() {
        let mut profile = TasteProfile::empty();
        profile.track_count = 60;
        profile.unique_artist_count = 12;
        profile.top_genres = vec![("indie rock".to_string(), 45)];
        profile.avg_features = Some(AudioFeatureVector {
            energy: 0.65,
            tempo: 121.4,
            ..Default::default()
        });
        profile.resolved_feature_count = 60;

        let text = profile_summary(&profile);
        assert!(text.contains("Analyzed 60 tracks by 12 artists"));
        assert!(text.contains("45  indie rock"));
        assert!(text.contains("energy"));
        assert!(text.contains("0.65"));
        assert!(text.contains("121 bpm"));
    }

    #[test]
    fn test_partial_profile_is_flagged() {
        let mut profile = TasteProfile::empty();
        profile.partial = true;
        assert!(profile_summary(&profile).contains("(partial)"));
    }
}
