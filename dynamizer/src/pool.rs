//! Candidate pool construction: the set of MPD file paths the dynamizer draws from, cached
//! until the active rule file or the library itself changes.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::SystemTime;

use tracing::debug;

use crate::rules::CompiledRules;

/// Supplies the MPD queries the pool builder needs: running a legacy `find` query, listing
/// every artist, and reading the rating sticker for every song.
pub trait PoolSource {
    fn find(&mut self, query_line: &str) -> Vec<String>;
    fn list_artist(&mut self) -> Vec<String>;
    /// `file -> rating` for every song that has a rating sticker set.
    fn sticker_ratings(&mut self) -> std::collections::HashMap<String, String>;
}

impl<IO: std::io::Read + std::io::Write> PoolSource for mpd_client::Client<IO> {
    fn find(&mut self, query_line: &str) -> Vec<String> {
        match mpd_client::Client::find(self, query_line) {
            Ok(songs) => songs.into_iter().map(|s| s.url).collect(),
            Err(e) => {
                tracing::warn!(error = %e, query_line, "find failed, treating as empty");
                Vec::new()
            }
        }
    }

    fn list_artist(&mut self) -> Vec<String> {
        match mpd_client::Client::list(self, "list Artist") {
            Ok(list) => list.values().map(str::to_owned).collect(),
            Err(e) => {
                tracing::warn!(error = %e, "list artist failed, treating as empty");
                Vec::new()
            }
        }
    }

    fn sticker_ratings(&mut self) -> std::collections::HashMap<String, String> {
        match self.sticker_find("", "rating") {
            Ok(find) => find.value,
            Err(e) => {
                tracing::warn!(error = %e, "sticker find rating failed, treating as empty");
                Default::default()
            }
        }
    }
}

/// The current set of candidate file paths, invalidated on rule-file change or library update.
#[derive(Debug, Default)]
pub struct CandidatePool {
    candidates: Vec<String>,
    last_rule_mtime: Option<SystemTime>,
    last_rule_link_target: Option<PathBuf>,
    last_db_update: Option<u64>,
    dirty: bool,
}

impl CandidatePool {
    pub fn new() -> Self {
        CandidatePool { dirty: true, ..Default::default() }
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Removes the candidate at `index`, used when a post-filter rejects it.
    pub fn remove(&mut self, index: usize) {
        if index < self.candidates.len() {
            self.candidates.swap_remove(index);
        }
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.candidates.get(index).map(String::as_str)
    }

    /// Marks the pool for recomputation on the next read.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty || self.candidates.is_empty()
    }

    /// Records the active rule file's link target and mtime, marking the pool dirty if either
    /// changed since the last observation.
    pub fn observe_rule_file(&mut self, link_target: &std::path::Path, mtime: SystemTime) {
        let target_changed = self.last_rule_link_target.as_deref() != Some(link_target);
        let mtime_changed = self.last_rule_mtime != Some(mtime);
        if target_changed || mtime_changed {
            self.dirty = true;
        }
        self.last_rule_link_target = Some(link_target.to_path_buf());
        self.last_rule_mtime = Some(mtime);
    }

    /// Records MPD's `db_update` counter, marking the pool dirty if it changed.
    pub fn observe_db_update(&mut self, db_update: u64) {
        if self.last_db_update != Some(db_update) {
            self.dirty = true;
        }
        self.last_db_update = Some(db_update);
    }

    /// Recomputes the candidate pool from scratch: inclusion minus exclusion, per the rule
    /// engine's compiled query strings.
    pub fn recompute(&mut self, rules: &CompiledRules, source: &mut impl PoolSource) {
        let exclude: BTreeSet<String> = rules
            .exclude
            .iter()
            .flat_map(|query| source.find(query))
            .collect();

        let include: BTreeSet<String> = if !rules.include.is_empty() {
            rules.include.iter().flat_map(|query| source.find(query)).collect()
        } else if !rules.rating.is_disabled() {
            source
                .sticker_ratings()
                .into_iter()
                .filter_map(|(file, value)| {
                    let rating: u32 = value.parse().ok()?;
                    rules.rating.contains(rating).then_some(file)
                })
                .collect()
        } else {
            source
                .list_artist()
                .into_iter()
                .flat_map(|artist| {
                    let query = format!("find Artist \"{}\"", mpd_protocol::command::escape(&artist));
                    source.find(&query)
                })
                .collect()
        };

        self.candidates = include.difference(&exclude).cloned().collect();
        self.dirty = false;
        debug!(candidates = self.candidates.len(), "recomputed candidate pool");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Range;
    use std::collections::HashMap;

    struct FakeSource {
        finds: HashMap<String, Vec<String>>,
        artists: Vec<String>,
        ratings: HashMap<String, String>,
    }

    impl PoolSource for FakeSource {
        fn find(&mut self, query_line: &str) -> Vec<String> {
            self.finds.get(query_line).cloned().unwrap_or_default()
        }

        fn list_artist(&mut self) -> Vec<String> {
            self.artists.clone()
        }

        fn sticker_ratings(&mut self) -> HashMap<String, String> {
            self.ratings.clone()
        }
    }

    #[test]
    fn include_minus_exclude() {
        let mut rules = CompiledRules { ..Default::default() };
        rules.include.insert("find Genre \"Rock\"".into());
        rules.exclude.insert("find Artist \"Bad\"".into());

        let mut source = FakeSource {
            finds: HashMap::from([
                ("find Genre \"Rock\"".into(), vec!["a.mp3".into(), "b.mp3".into()]),
                ("find Artist \"Bad\"".into(), vec!["b.mp3".into()]),
            ]),
            artists: Vec::new(),
            ratings: HashMap::new(),
        };

        let mut pool = CandidatePool::new();
        pool.recompute(&rules, &mut source);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.get(0), Some("a.mp3"));
    }

    #[test]
    fn rating_only_path_used_when_no_include_rules() {
        let mut rules = CompiledRules { ..Default::default() };
        rules.rating = Range { min: 3, max: 5 };

        let mut source = FakeSource {
            finds: HashMap::new(),
            artists: Vec::new(),
            ratings: HashMap::from([
                ("a.mp3".into(), "5".into()),
                ("b.mp3".into(), "2".into()),
                ("c.mp3".into(), "0".into()),
            ]),
        };

        let mut pool = CandidatePool::new();
        pool.recompute(&rules, &mut source);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.get(0), Some("a.mp3"));
    }

    #[test]
    fn dirty_after_construction_and_after_mark() {
        let mut pool = CandidatePool::new();
        assert!(pool.is_dirty());
        pool.recompute(&CompiledRules::default(), &mut FakeSource {
            finds: HashMap::new(),
            artists: vec!["X".into()],
            ratings: HashMap::new(),
        });
        pool.mark_dirty();
        assert!(pool.is_dirty());
    }
}
