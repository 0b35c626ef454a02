//! Rule file parsing and compilation into MPD search strings.
//!
//! A rule file is free text, read top to bottom. Top-level directives configure the compiled
//! rule set as a whole; `Rule` blocks each accumulate into one or more MPD `find`/`search`
//! strings, flushed into the include or exclude set when the next `Rule` line (or EOF) is hit.

use std::collections::BTreeSet;
use std::time::{SystemTime, UNIX_EPOCH};

use mpd_protocol::command::escape;
use tracing::{debug, trace, warn};

/// A closed numeric interval. `0` on either end means "unbounded on that side".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Range {
    pub min: u32,
    pub max: u32,
}

impl Range {
    /// The always-pass range.
    pub const UNBOUNDED: Range = Range { min: 0, max: 0 };

    /// Parses `lo-hi`, swapping the ends if both are non-zero and `min > max`.
    pub fn parse(s: &str) -> Option<Range> {
        let (lo, hi) = s.split_once('-')?;
        let mut min: u32 = lo.trim().parse().ok()?;
        let mut max: u32 = hi.trim().parse().ok()?;
        if min != 0 && max != 0 && min > max {
            std::mem::swap(&mut min, &mut max);
        }
        Some(Range { min, max })
    }

    /// Like [`Range::parse`], but additionally collapses the conventional "no filter" spelling
    /// `0-10` down to a fully disabled range, since `10` is the top of the rating scale.
    pub fn parse_rating(s: &str) -> Option<Range> {
        let mut range = Range::parse(s)?;
        if range.min == 0 && range.max == 10 {
            range.max = 0;
        }
        Some(range)
    }

    pub fn is_disabled(&self) -> bool {
        self.min == 0 && self.max == 0
    }

    pub fn contains(&self, value: u32) -> bool {
        (self.min == 0 || value >= self.min) && (self.max == 0 || value <= self.max)
    }
}

/// An immutable snapshot of a fully parsed and expanded rule file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompiledRules {
    pub include: BTreeSet<String>,
    pub exclude: BTreeSet<String>,
    pub rating: Range,
    pub duration: Range,
    pub include_unrated: bool,
    pub desired_queue_length: u32,
    /// Absolute unix seconds; `0` means disabled.
    pub max_age_cutoff: u64,
}

impl Default for CompiledRules {
    fn default() -> Self {
        CompiledRules {
            include: BTreeSet::new(),
            exclude: BTreeSet::new(),
            rating: Range::UNBOUNDED,
            duration: Range::UNBOUNDED,
            include_unrated: true,
            desired_queue_length: 10,
            max_age_cutoff: 0,
        }
    }
}

impl CompiledRules {
    /// Whether `other` represents a materially different rule set. Drives the dynamizer's
    /// "rules changed" signal.
    pub fn changed_from(&self, other: &CompiledRules) -> bool {
        self != other
    }
}

/// Supplies the live MPD metadata the parser needs to expand wildcards: `list genre` and
/// `list artist`.
pub trait Lookup {
    fn list_genre(&mut self) -> Vec<String>;
    fn list_artist(&mut self) -> Vec<String>;
}

impl<IO: std::io::Read + std::io::Write> Lookup for mpd_client::Client<IO> {
    fn list_genre(&mut self) -> Vec<String> {
        match self.list("list Genre") {
            Ok(list) => list.values().map(str::to_owned).collect(),
            Err(e) => {
                warn!(error = %e, "list genre failed, treating as empty");
                Vec::new()
            }
        }
    }

    fn list_artist(&mut self) -> Vec<String> {
        match self.list("list Artist") {
            Ok(list) => list.values().map(str::to_owned).collect(),
            Err(e) => {
                warn!(error = %e, "list artist failed, treating as empty");
                Vec::new()
            }
        }
    }
}

/// Supplies the similar-artist cache's lookup, kept as a trait so rule parsing doesn't need to
/// know about the cache's HTTP/persistence details.
pub trait SimilarArtistSource {
    fn similar_artists(&mut self, artist: &str) -> Vec<String>;
}

const GENRE_NO_MATCH_SENTINEL: &str = "XXXXXXXX";

/// Per-rule-block state, reset every time a `Rule` line (or EOF) flushes the current block.
///
/// `MaxAge` is deliberately *not* one of these fields: it is set at most once per file (the
/// last `MaxAge:` line wins) and applies to every include rule flushed for the rest of the
/// file, not just the block it appears in.
#[derive(Default)]
struct RuleBuilder {
    current_rule: String,
    dates: Vec<u32>,
    similar_artists: Vec<String>,
    is_include: bool,
    genres: Vec<String>,
    rule_match: &'static str,
}

impl RuleBuilder {
    fn new() -> Self {
        RuleBuilder {
            current_rule: String::new(),
            dates: Vec::new(),
            similar_artists: Vec::new(),
            is_include: true,
            genres: Vec::new(),
            rule_match: "find",
        }
    }

    fn has_content(&self) -> bool {
        !self.current_rule.is_empty()
            || !self.similar_artists.is_empty()
            || !self.dates.is_empty()
            || !self.genres.is_empty()
    }

    fn append_tag(&mut self, key: &str, value: &str) {
        self.current_rule
            .push_str(&format!(" {} \"{}\"", key, escape(value)));
    }

    /// Emits one query string per `(date x artist x genre)` combination into `include` or
    /// `exclude`, skipping combinations with no content and no max-age clause. `max_age` is the
    /// file-scoped cutoff in effect at the time this block is flushed.
    fn save_rule(&self, max_age: u64, include: &mut BTreeSet<String>, exclude: &mut BTreeSet<String>) {
        let dates: Vec<Option<u32>> = if self.dates.is_empty() {
            vec![None]
        } else {
            self.dates.iter().copied().map(Some).collect()
        };
        let artists: Vec<&str> = if self.similar_artists.is_empty() {
            vec![""]
        } else {
            self.similar_artists.iter().map(String::as_str).collect()
        };
        let genres: Vec<&str> = if self.genres.is_empty() {
            vec![""]
        } else {
            self.genres.iter().map(String::as_str).collect()
        };

        for date in &dates {
            for artist in &artists {
                for genre in &genres {
                    let mut query = String::new();
                    query.push_str(self.rule_match);
                    query.push_str(&self.current_rule);

                    let mut has_extra = false;
                    if let Some(d) = date {
                        query.push_str(&format!(" Date \"{d}\""));
                        has_extra = true;
                    }
                    if !artist.is_empty() {
                        query.push_str(&format!(" Artist \"{}\"", escape(artist)));
                        has_extra = true;
                    }
                    if !genre.is_empty() {
                        query.push_str(&format!(" Genre \"{}\"", escape(genre)));
                        has_extra = true;
                    }

                    let has_max_age = self.is_include && max_age > 0;
                    if !self.has_content() && !has_extra && !has_max_age {
                        continue;
                    }

                    if has_max_age {
                        query.push_str(&format!(" modified-since {max_age}"));
                    }

                    let set = if self.is_include { &mut *include } else { &mut *exclude };
                    set.insert(query);
                }
            }
        }
    }
}

/// Parses rule-file text into a [`CompiledRules`] snapshot.
///
/// `now` is the current unix timestamp, taken as a parameter rather than sampled internally so
/// parsing stays deterministic and idempotent given the same bytes and the same `now`.
pub fn parse(
    text: &str,
    now: u64,
    lookup: &mut impl Lookup,
    similar_artists: &mut impl SimilarArtistSource,
) -> CompiledRules {
    let mut include = BTreeSet::new();
    let mut exclude = BTreeSet::new();
    let mut rating = Range::UNBOUNDED;
    let mut duration = Range::UNBOUNDED;
    let mut include_unrated = true;
    let mut desired_queue_length: u32 = 10;
    let mut last_max_age_seen: u64 = 0;
    let mut saw_include = false;

    let mut rule = RuleBuilder::new();

    let flush = |rule: &mut RuleBuilder,
                 max_age: u64,
                 include: &mut BTreeSet<String>,
                 exclude: &mut BTreeSet<String>,
                 saw_include: &mut bool| {
        if rule.has_content() {
            if rule.is_include {
                *saw_include = true;
            }
            rule.save_rule(max_age, include, exclude);
        }
    };

    for line in text.lines() {
        if line.starts_with('#') {
            continue;
        }

        let Some((key, value)) = line.split_once(':') else {
            continue;
        };

        if key.starts_with("Rule") {
            flush(&mut rule, last_max_age_seen, &mut include, &mut exclude, &mut saw_include);
            rule = RuleBuilder::new();
            continue;
        }

        match key {
            "Rating" => {
                if let Some(r) = Range::parse_rating(value) {
                    rating = r;
                } else {
                    warn!(%value, "ignoring malformed Rating line");
                }
            }
            "Duration" => {
                if let Some(r) = Range::parse(value) {
                    duration = r;
                } else {
                    warn!(%value, "ignoring malformed Duration line");
                }
            }
            "IncludeUnrated" => include_unrated = value.trim() == "true",
            "NumTracks" => match value.trim().parse::<u32>() {
                Ok(n) => {
                    let clamped = n.clamp(10, 500);
                    desired_queue_length = clamped + (clamped % 2);
                }
                Err(_) => warn!(%value, "ignoring malformed NumTracks line"),
            },
            "MaxAge" => match value.trim().parse::<u64>() {
                Ok(days) => {
                    last_max_age_seen = now.saturating_sub(days * 86_400);
                }
                Err(_) => warn!(%value, "ignoring malformed MaxAge line"),
            },
            "Date" => apply_date(&mut rule, value),
            "Genre" => apply_genre(&mut rule, value, lookup),
            "SimilarArtists" => apply_similar_artists(&mut rule, value, lookup, similar_artists),
            "Artist" | "Album" | "AlbumArtist" | "Composer" | "Comment" | "Title" | "File" => {
                rule.append_tag(key, value)
            }
            "Exact" => {
                if value.trim() == "false" {
                    rule.rule_match = "search";
                }
            }
            "Exclude" => {
                if value.trim() == "true" {
                    rule.is_include = false;
                }
            }
            other => trace!(key = other, "ignoring unrecognized rule-file key"),
        }
    }

    flush(&mut rule, last_max_age_seen, &mut include, &mut exclude, &mut saw_include);

    if !saw_include && last_max_age_seen > 0 {
        let synthetic = RuleBuilder::new();
        synthetic.save_rule(last_max_age_seen, &mut include, &mut exclude);
    }

    debug!(
        include = include.len(),
        exclude = exclude.len(),
        "compiled rule file"
    );

    CompiledRules {
        include,
        exclude,
        rating,
        duration,
        include_unrated,
        desired_queue_length,
        max_age_cutoff: last_max_age_seen,
    }
}

fn apply_date(rule: &mut RuleBuilder, value: &str) {
    let value = value.trim();
    if let Some((lo, hi)) = value.split_once('-') {
        let (lo, hi) = match (lo.parse::<u32>(), hi.parse::<u32>()) {
            (Ok(lo), Ok(hi)) => (lo.min(hi), lo.max(hi)),
            _ => {
                warn!(%value, "ignoring malformed Date line");
                return;
            }
        };
        rule.dates.extend(lo..=hi);
    } else if let Ok(year) = value.parse::<u32>() {
        rule.dates.push(year);
    } else {
        warn!(%value, "ignoring malformed Date line");
    }
}

fn apply_genre(rule: &mut RuleBuilder, value: &str, lookup: &mut impl Lookup) {
    if !value.contains('*') {
        rule.append_tag("Genre", value);
        return;
    }

    let stem = value.replace('*', "").to_lowercase();
    let genres = lookup.list_genre();
    let matches: Vec<String> = genres
        .into_iter()
        .filter(|g| g.to_lowercase().starts_with(&stem))
        .collect();

    if matches.is_empty() {
        trace!(%value, "genre wildcard matched nothing");
        rule.genres.push(GENRE_NO_MATCH_SENTINEL.to_owned());
    } else {
        rule.genres.extend(matches);
    }
}

fn apply_similar_artists(
    rule: &mut RuleBuilder,
    value: &str,
    lookup: &mut impl Lookup,
    similar_artists: &mut impl SimilarArtistSource,
) {
    let artist = value.trim();
    let candidates = similar_artists.similar_artists(artist);
    let known: BTreeSet<String> = lookup
        .list_artist()
        .into_iter()
        .map(|a| a.to_lowercase())
        .collect();

    for candidate in candidates {
        if known.contains(&candidate.to_lowercase()) {
            rule.similar_artists.push(candidate);
        }
    }
    rule.similar_artists.push(artist.to_owned());
}

/// Seconds since the unix epoch, used as the `now` parameter of [`parse`] outside of tests.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeLookup {
        genres: Vec<String>,
        artists: Vec<String>,
    }

    impl Lookup for FakeLookup {
        fn list_genre(&mut self) -> Vec<String> {
            self.genres.clone()
        }

        fn list_artist(&mut self) -> Vec<String> {
            self.artists.clone()
        }
    }

    struct FakeSimilarArtists(Vec<String>);

    impl SimilarArtistSource for FakeSimilarArtists {
        fn similar_artists(&mut self, _artist: &str) -> Vec<String> {
            self.0.clone()
        }
    }

    fn empty_lookup() -> FakeLookup {
        FakeLookup { genres: Vec::new(), artists: Vec::new() }
    }

    #[test]
    fn range_parse_swaps_inverted_bounds() {
        assert_eq!(Range::parse("5-3"), Range::parse("3-5"));
    }

    #[test]
    fn rating_0_10_collapses_to_unbounded() {
        let r = Range::parse_rating("0-10").unwrap();
        assert!(r.is_disabled());
    }

    #[test]
    fn num_tracks_rounds_odd_up_and_clamps() {
        let mut lookup = empty_lookup();
        let mut similar = FakeSimilarArtists(Vec::new());
        let compiled = parse("NumTracks:11\n", 0, &mut lookup, &mut similar);
        assert_eq!(compiled.desired_queue_length, 12);

        let compiled = parse("NumTracks:5\n", 0, &mut lookup, &mut similar);
        assert_eq!(compiled.desired_queue_length, 10);

        let compiled = parse("NumTracks:9001\n", 0, &mut lookup, &mut similar);
        assert_eq!(compiled.desired_queue_length, 500);
    }

    #[test]
    fn rating_only_rule_set() {
        let mut lookup = empty_lookup();
        let mut similar = FakeSimilarArtists(Vec::new());
        let compiled = parse(
            "Rating:3-5\nIncludeUnrated:false\n",
            0,
            &mut lookup,
            &mut similar,
        );
        assert_eq!(compiled.rating, Range { min: 3, max: 5 });
        assert!(!compiled.include_unrated);
        assert!(compiled.include.is_empty());
    }

    #[test]
    fn wildcard_genre_expands_to_matches() {
        let mut lookup = FakeLookup {
            genres: vec!["Rock".into(), "Rockabilly".into(), "Pop".into()],
            artists: Vec::new(),
        };
        let mut similar = FakeSimilarArtists(Vec::new());
        let compiled = parse("Rule:\nGenre:Rock*\n", 0, &mut lookup, &mut similar);

        assert_eq!(compiled.include.len(), 2);
        assert!(compiled.include.iter().any(|q| q.contains("Rock\"")));
        assert!(compiled.include.iter().any(|q| q.contains("Rockabilly\"")));
    }

    #[test]
    fn wildcard_genre_with_no_match_uses_sentinel() {
        let mut lookup = FakeLookup { genres: vec!["Pop".into()], artists: Vec::new() };
        let mut similar = FakeSimilarArtists(Vec::new());
        let compiled = parse("Rule:\nGenre:Metal*\n", 0, &mut lookup, &mut similar);

        assert_eq!(compiled.include.len(), 1);
        assert!(compiled.include.iter().next().unwrap().contains(GENRE_NO_MATCH_SENTINEL));
    }

    #[test]
    fn similar_artists_intersects_with_known_artists() {
        let mut lookup = FakeLookup {
            genres: Vec::new(),
            artists: vec!["Kylie Minogue".into(), "Queen".into()],
        };
        let mut similar = FakeSimilarArtists(vec!["Kylie Minogue".into(), "Cher".into()]);
        let compiled = parse("Rule:\nSimilarArtists:Madonna\n", 0, &mut lookup, &mut similar);

        let artists: BTreeSet<&str> = compiled
            .include
            .iter()
            .map(|q| {
                let (_, rest) = q.split_once("Artist \"").unwrap();
                rest.trim_end_matches('"')
            })
            .collect();

        assert_eq!(artists, BTreeSet::from(["Madonna", "Kylie Minogue"]));
    }

    #[test]
    fn wildcard_genre_matches_asterisk_anywhere_in_value() {
        let mut lookup = FakeLookup {
            genres: vec!["Rock".into(), "Rockabilly".into(), "Pop".into()],
            artists: Vec::new(),
        };
        let mut similar = FakeSimilarArtists(Vec::new());

        let leading = parse("Rule:\nGenre:*Rock\n", 0, &mut lookup, &mut similar);
        assert_eq!(leading.include.len(), 2);
        assert!(leading.include.iter().any(|q| q.contains("Rock\"")));
        assert!(leading.include.iter().any(|q| q.contains("Rockabilly\"")));

        let middle = parse("Rule:\nGenre:Ro*ck\n", 0, &mut lookup, &mut similar);
        assert_eq!(middle.include.len(), 2);
        assert!(middle.include.iter().any(|q| q.contains("Rock\"")));
        assert!(middle.include.iter().any(|q| q.contains("Rockabilly\"")));

        let repeated = parse("Rule:\nGenre:Roc**\n", 0, &mut lookup, &mut similar);
        assert_eq!(repeated.include.len(), 2);
        assert!(repeated.include.iter().any(|q| q.contains("Rock\"")));
        assert!(repeated.include.iter().any(|q| q.contains("Rockabilly\"")));
    }

    #[test]
    fn genre_match_is_unicode_case_folded() {
        let mut lookup = FakeLookup { genres: vec!["Música".into()], artists: Vec::new() };
        let mut similar = FakeSimilarArtists(Vec::new());
        let compiled = parse("Rule:\nGenre:MÚSICA*\n", 0, &mut lookup, &mut similar);

        assert_eq!(compiled.include.len(), 1);
        assert!(compiled.include.iter().any(|q| q.contains("Música\"")));
    }

    #[test]
    fn similar_artists_intersection_is_unicode_case_folded() {
        let mut lookup = FakeLookup { genres: Vec::new(), artists: vec!["Björk".into()] };
        let mut similar = FakeSimilarArtists(vec!["BJÖRK".into()]);
        let compiled = parse("Rule:\nSimilarArtists:Sigur Ros\n", 0, &mut lookup, &mut similar);

        let artists: BTreeSet<&str> = compiled
            .include
            .iter()
            .map(|q| {
                let (_, rest) = q.split_once("Artist \"").unwrap();
                rest.trim_end_matches('"')
            })
            .collect();

        assert_eq!(artists, BTreeSet::from(["Sigur Ros", "BJÖRK"]));
    }

    #[test]
    fn desired_queue_length_defaults_to_ten_without_num_tracks() {
        let mut lookup = empty_lookup();
        let mut similar = FakeSimilarArtists(Vec::new());
        let compiled = parse("Rule:\nArtist:Test\n", 0, &mut lookup, &mut similar);
        assert_eq!(compiled.desired_queue_length, 10);
        assert_eq!(CompiledRules::default().desired_queue_length, 10);
    }

    #[test]
    fn parse_is_idempotent() {
        let text = "Rating:2-8\nRule:\nArtist:Test\nDate:1999-2001\n";
        let mut lookup = empty_lookup();
        let mut similar = FakeSimilarArtists(Vec::new());
        let first = parse(text, 1000, &mut lookup, &mut similar);
        let second = parse(text, 1000, &mut lookup, &mut similar);
        assert!(!first.changed_from(&second));
    }

    #[test]
    fn max_age_without_include_synthesizes_one() {
        let mut lookup = empty_lookup();
        let mut similar = FakeSimilarArtists(Vec::new());
        let compiled = parse("MaxAge:30\nRule:\nArtist:X\nExclude:true\n", 10_000_000, &mut lookup, &mut similar);

        assert!(compiled.exclude.iter().all(|q| !q.contains("modified-since")));
        assert_eq!(compiled.include.len(), 1);
        assert!(compiled.include.iter().next().unwrap().contains("modified-since"));
    }

    #[test]
    fn max_age_applies_to_every_later_include_rule() {
        let mut lookup = empty_lookup();
        let mut similar = FakeSimilarArtists(Vec::new());
        let compiled = parse(
            "MaxAge:30\nRule:\nArtist:X\nRule:\nArtist:Y\n",
            10_000_000,
            &mut lookup,
            &mut similar,
        );

        assert_eq!(compiled.include.len(), 2);
        assert!(compiled.include.iter().all(|q| q.contains("modified-since")));
    }

    #[test]
    fn date_range_expands_inclusive() {
        let mut lookup = empty_lookup();
        let mut similar = FakeSimilarArtists(Vec::new());
        let compiled = parse("Rule:\nArtist:X\nDate:2001-1999\n", 0, &mut lookup, &mut similar);
        assert_eq!(compiled.include.len(), 3);
    }
}
