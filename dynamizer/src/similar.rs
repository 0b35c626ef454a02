//! Time-bounded lookup of related artists from a last.fm-compatible HTTP endpoint, persisted
//! across restarts.

use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use indexmap::IndexMap;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::rules::SimilarArtistSource;

const TTL_SECONDS: u64 = 4 * 7 * 24 * 60 * 60;
const RETRY_ATTEMPTS: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_secs(1);
const API_KEY: &str = "dynamizer-unconfigured-api-key";
const ENDPOINT: &str = "https://ws.audioscrobbler.com/2.0/";

#[derive(Clone, Debug, Serialize, Deserialize)]
struct CacheEntry {
    timestamp: u64,
    artists: Vec<String>,
}

/// A persisted, TTL-bounded cache of similar-artist lookups.
#[derive(Debug)]
pub struct SimilarArtistCache {
    path: PathBuf,
    entries: IndexMap<String, CacheEntry>,
    client: reqwest::blocking::Client,
}

impl SimilarArtistCache {
    /// Loads the persisted cache from `path`, starting empty if the file is absent or corrupt.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let entries = match std::fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(error = %e, ?path, "corrupt similar-artist cache, starting empty");
                    let _ = std::fs::remove_file(&path);
                    IndexMap::new()
                }
            },
            Err(_) => IndexMap::new(),
        };

        SimilarArtistCache {
            path,
            entries,
            client: reqwest::blocking::Client::new(),
        }
    }

    /// Returns the cached or freshly-fetched similar-artist list for `artist`, given `now` as
    /// the current unix timestamp.
    pub fn get(&mut self, artist: &str, now: u64) -> Vec<String> {
        if let Some(entry) = self.entries.get(artist) {
            if now.saturating_sub(entry.timestamp) < TTL_SECONDS {
                return entry.artists.clone();
            }
        }

        match self.fetch_with_retry(artist) {
            Some(artists) => {
                self.entries.insert(
                    artist.to_owned(),
                    CacheEntry { timestamp: now, artists: artists.clone() },
                );
                self.persist();
                artists
            }
            None => self
                .entries
                .get(artist)
                .map(|e| e.artists.clone())
                .unwrap_or_default(),
        }
    }

    fn fetch_with_retry(&self, artist: &str) -> Option<Vec<String>> {
        for attempt in 0..RETRY_ATTEMPTS {
            match self.fetch(artist) {
                Ok(artists) => return Some(artists),
                Err(e) => {
                    warn!(error = %e, artist, attempt, "similar-artist lookup failed");
                    if attempt + 1 < RETRY_ATTEMPTS {
                        thread::sleep(RETRY_BACKOFF);
                    }
                }
            }
        }
        None
    }

    fn fetch(&self, artist: &str) -> Result<Vec<String>, reqwest::Error> {
        let body = self
            .client
            .get(ENDPOINT)
            .query(&[
                ("method", "artist.getSimilar"),
                ("api_key", API_KEY),
                ("artist", artist),
                ("format", "xml"),
            ])
            .send()?
            .error_for_status()?
            .text()?;

        Ok(parse_similar_artists(&body))
    }

    fn persist(&self) {
        match serde_json::to_string_pretty(&self.entries) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&self.path, json) {
                    warn!(error = %e, path = ?self.path, "failed to persist similar-artist cache");
                }
            }
            Err(e) => warn!(error = %e, "failed to serialize similar-artist cache"),
        }
        debug!(entries = self.entries.len(), "persisted similar-artist cache");
    }
}

impl SimilarArtistSource for SimilarArtistCache {
    fn similar_artists(&mut self, artist: &str) -> Vec<String> {
        self.get(artist, crate::rules::unix_now())
    }
}

/// Collects `artist/name` elements in document order, unescaping `&amp;` and stripping embedded
/// newlines, per the upstream XML reply shape.
fn parse_similar_artists(xml: &str) -> Vec<String> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut names = Vec::new();
    let mut in_name = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"name" => in_name = true,
            Ok(Event::End(e)) if e.local_name().as_ref() == b"name" => in_name = false,
            Ok(Event::Text(text)) if in_name => {
                if let Ok(text) = text.unescape() {
                    names.push(text.replace('\n', ""));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                warn!(error = %e, "malformed similar-artist XML response");
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_artist_names_in_order() {
        let xml = r#"
            <lfm>
              <similarartists>
                <artist><name>Kylie Minogue</name></artist>
                <artist><name>A &amp; B</name></artist>
              </similarartists>
            </lfm>
        "#;
        assert_eq!(parse_similar_artists(xml), vec!["Kylie Minogue", "A & B"]);
    }

    #[test]
    fn load_starts_empty_when_file_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("similar.json");
        std::fs::write(&path, "not json").unwrap();

        let cache = SimilarArtistCache::load(&path);
        assert!(cache.entries.is_empty());
        assert!(!path.exists());
    }

    #[test]
    fn load_starts_empty_when_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SimilarArtistCache::load(dir.path().join("missing.json"));
        assert!(cache.entries.is_empty());
    }

    #[test]
    fn cache_hit_within_ttl_skips_refetch() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = SimilarArtistCache::load(dir.path().join("similar.json"));
        cache.entries.insert(
            "Madonna".into(),
            CacheEntry { timestamp: 1_000, artists: vec!["Kylie Minogue".into()] },
        );

        assert_eq!(cache.get("Madonna", 1_100), vec!["Kylie Minogue"]);
    }
}
