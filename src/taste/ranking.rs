use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};

use crate::model::Track;

/// Frequency counter whose ranking breaks ties by first-seen order.
///
/// Each key remembers the index at which it was first counted, so the
/// ranking is `(count desc, first_index asc)` no matter how the underlying
/// map iterates.
#[derive(Debug, Default, Clone)]
pub struct RankCounter {
    entries: HashMap<String, (usize, usize)>,
}

impl RankCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: &str) {
        let next_index = self.entries.len();
        self.entries
            .entry(key.to_string())
            .and_modify(|(count, _)| *count += 1)
            .or_insert((1, next_index));
    }

    pub fn count(&self, key: &str) -> usize {
        self.entries.get(key).map(|(count, _)| *count).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ranked(&self) -> Vec<(String, usize)> {
        let mut ranked: Vec<(&String, usize, usize)> = self
            .entries
            .iter()
            .map(|(key, (count, first))| (key, *count, *first))
            .collect();
        ranked.sort_by_key(|(_, count, first)| (Reverse(*count), *first));
        ranked
            .into_iter()
            .map(|(key, count, _)| (key.clone(), count))
            .collect()
    }

    pub fn top(&self, n: usize) -> Vec<(String, usize)> {
        let mut ranked = self.ranked();
        ranked.truncate(n);
        ranked
    }
}

/// Counts, per artist, how many of the tracks they appear on.
pub fn count_artists(tracks: &[Track]) -> RankCounter {
    let mut counter = RankCounter::new();
    for track in tracks {
        for artist in &track.artist_ids {
            counter.add(artist);
        }
    }
    counter
}

/// Counts each genre once per track that reaches it through any of its
/// artists. Artists missing from `genres_by_artist` contribute nothing.
pub fn count_genres(tracks: &[Track], genres_by_artist: &HashMap<String, Vec<String>>) -> RankCounter {
    let mut counter = RankCounter::new();
    for track in tracks {
        let mut seen: HashSet<&str> = HashSet::new();
        for artist in &track.artist_ids {
            let Some(genres) = genres_by_artist.get(artist) else {
                continue;
            };
            for genre in genres {
                if seen.insert(genre.as_str()) {
                    counter.add(genre);
                }
            }
        }
    }
    counter
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(id: &str, artists: &[&str]) -> Track {
        Track::new(
            id,
            artists.iter().map(|a| a.to_string()).collect(),
            format!("spotify:track:{id}"),
        )
    }

    #[test]
    fn test_ties_keep_first_seen_order() {
        let mut counter = RankCounter::new();
        for key in ["b", "a", "c", "a", "b", "c", "d"] {
            counter.add(key);
        }
        let ranked = counter.ranked();
        assert_eq!(
            ranked,
            vec![
                ("b".to_string(), 2),
                ("a".to_string(), 2),
                ("c".to_string(), 2),
                ("d".to_string(), 1),
            ]
        );
        assert_eq!(counter.top(1), vec![("b".to_string(), 2)]);
    }

    #[test]
    fn test_genre_counted_once_per_track() {
        let tracks = vec![track("t1", &["a1", "a2"]), track("t2", &["a2"])];
        let mut genres = HashMap::new();
        genres.insert("a1".to_string(), vec!["rock".to_string(), "indie".to_string()]);
        genres.insert("a2".to_string(), vec!["rock".to_string()]);

        let counter = count_genres(&tracks, &genres);
        // t1 reaches "rock" through both artists but only counts it once
        assert_eq!(counter.count("rock"), 2);
        assert_eq!(counter.count("indie"), 1);
        assert_eq!(counter.ranked()[0].0, "rock");
    }

    #[test]
    fn test_artists_ranked_by_track_appearances() {
        let tracks = vec![
            track("t1", &["x"]),
            track("t2", &["y", "x"]),
            track("t3", &["y"]),
            track("t4", &["z"]),
        ];
        let ranked = count_artists(&tracks).ranked();
        let ids: Vec<&str> = ranked.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["x", "y", "z"]);
    }

    #[test]
    fn test_unknown_artists_have_no_genres() {
        let tracks = vec![track("t1", &["ghost"])];
        assert!(count_genres(&tracks, &HashMap::new()).is_empty());
    }
}
