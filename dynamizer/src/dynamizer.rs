//! The main state machine: observe status, trim, refill, publish state.
//!
//! Runs on a dedicated thread, owning one MPD connection exclusively. Control messages arrive
//! on the same connection (via `readmessages`, drained after every `idle` wakeup that reports a
//! `message` change) rather than on a second one.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use rand::Rng;
use tracing::{debug, info, warn};

use mpd_client::CommandError;

use crate::connection::ManagedConnection;
use crate::control::{self, Dispatcher};
use crate::history::HistoryBuffer;
use crate::pool::CandidatePool;
use crate::rules::{self, unix_now, CompiledRules};
use crate::similar::SimilarArtistCache;
use crate::status::{PlayerStatus, StatusFacade};

/// After this many consecutive history rejections, the next candidate bypasses the history
/// check entirely so a small, heavily-excluded pool doesn't stall refill forever.
const HISTORY_BYPASS_THRESHOLD: u32 = 100;

pub const INBOUND_CHANNEL: &str = "cantata-dynamic-in";
pub const OUTBOUND_CHANNEL: &str = "cantata-dynamic-out";

/// Owns the MPD connection and every piece of in-memory state the dynamizer loop mutates.
pub struct Dynamizer {
    mpd: ManagedConnection,
    dispatcher: Dispatcher,
    status: Arc<StatusFacade>,
    pool: CandidatePool,
    history: HistoryBuffer,
    similar_artists: SimilarArtistCache,
    compiled: CompiledRules,
    last_rule_target: Option<PathBuf>,
    last_rule_mtime: Option<SystemTime>,
    consecutive_history_rejections: u32,
}

impl Dynamizer {
    pub fn new(
        mpd: ManagedConnection,
        dispatcher: Dispatcher,
        status: Arc<StatusFacade>,
        similar_artists: SimilarArtistCache,
    ) -> Self {
        Dynamizer {
            mpd,
            dispatcher,
            status,
            pool: CandidatePool::new(),
            history: HistoryBuffer::new(),
            similar_artists,
            compiled: CompiledRules::default(),
            last_rule_target: None,
            last_rule_mtime: None,
            consecutive_history_rejections: 0,
        }
    }

    /// Runs the loop until `shutdown` is set, at the next loop boundary.
    pub fn run(&mut self, shutdown: &AtomicBool) {
        self.status.set_active_rule(self.dispatcher.active_name(), unix_now());

        while !shutdown.load(Ordering::Relaxed) {
            if let Err(e) = self.tick(shutdown) {
                warn!(error = %e, "dynamizer tick failed, will retry next pass");
            }
        }

        info!("dynamizer loop stopped");
    }

    fn tick(&mut self, shutdown: &AtomicBool) -> Result<(), CommandError> {
        if !self.status.snapshot().dynamic {
            self.status.set_state(PlayerStatus::Idle);
            return self.wait_for_wakeup(shutdown);
        }

        self.status.set_state(PlayerStatus::Starting);
        self.pass()?;

        if self.pool.is_empty() {
            self.status.set_state(PlayerStatus::NoSongs);
        } else {
            self.status.set_state(PlayerStatus::HaveSongs);
        }

        self.wait_for_wakeup(shutdown)
    }

    /// One status/stats/playlist/trim/rules/refill pass, with no `idle` wait at the end. Used
    /// both by the main loop and by one-shot (non-server) mode.
    fn pass(&mut self) -> Result<(), CommandError> {
        let player_status = self.mpd.status()?;
        let was_playing = player_status.state == mpd_client::responses::PlayState::Playing;
        let current_pos = player_status.current_song.map(|(pos, _)| pos.0).unwrap_or(0);

        let stats = self.mpd.stats()?;
        self.pool.observe_db_update(stats.db_last_update);

        let songs = self.mpd.playlist()?;
        let mut current_length = songs.len();

        self.trim(current_pos, &mut current_length)?;

        let now = unix_now();
        self.maybe_read_rules(now);
        if self.pool.is_dirty() {
            self.pool.recompute(&self.compiled, &mut self.mpd);
        }

        let added = self.refill(&mut current_length)?;

        if !was_playing && current_length > 0 && added == self.compiled.desired_queue_length as usize {
            self.mpd.play(0)?;
        }

        Ok(())
    }

    /// Runs a single pass and returns whether the queue ended up non-empty, for one-shot
    /// (non-server) invocations that should exit non-zero on `NO_SONGS`.
    pub fn run_once(&mut self) -> Result<bool, CommandError> {
        let now = unix_now();
        self.status.set_active_rule(self.dispatcher.active_name(), now);
        self.status.set_dynamic(true, now);
        self.status.set_state(PlayerStatus::Starting);

        self.pass()?;

        let have_songs = !self.pool.is_empty();
        self.status
            .set_state(if have_songs { PlayerStatus::HaveSongs } else { PlayerStatus::NoSongs });
        Ok(have_songs)
    }

    /// Deletes from the front of the queue so the currently playing track (at `current_pos`)
    /// ends up at or before `desired/2 - 1`, the middle of the visible queue.
    fn trim(&mut self, current_pos: usize, current_length: &mut usize) -> Result<(), CommandError> {
        let trim_count = trim_count(current_pos, self.compiled.desired_queue_length as usize);

        for _ in 0..trim_count {
            if *current_length == 0 {
                break;
            }
            self.mpd.delete(0)?;
            *current_length -= 1;
        }

        Ok(())
    }

    fn maybe_read_rules(&mut self, now: u64) {
        let link = self.dispatcher.active_link();
        let Ok(target) = std::fs::read_link(link) else {
            debug!("no active rule file, leaving prior rules in place");
            return;
        };

        let Ok(metadata) = std::fs::metadata(&target) else {
            debug!(?target, "active rule file target missing, leaving prior rules in place");
            return;
        };

        let mtime = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        self.pool.observe_rule_file(&target, mtime);

        let unchanged =
            self.last_rule_target.as_deref() == Some(target.as_path()) && self.last_rule_mtime == Some(mtime);
        if unchanged {
            return;
        }

        let Ok(text) = std::fs::read_to_string(&target) else {
            warn!(?target, "failed to read active rule file");
            return;
        };

        let compiled = rules::parse(&text, now, &mut self.mpd, &mut self.similar_artists);
        let changed = compiled.changed_from(&self.compiled);

        self.compiled = compiled;
        self.last_rule_target = Some(target);
        self.last_rule_mtime = Some(mtime);

        if changed {
            info!("active rules changed");
            self.pool.mark_dirty();
        }
    }

    /// Fills the queue up to the desired length, applying the per-candidate filters and the
    /// history-bypass escape hatch. Returns the number of tracks actually added.
    fn refill(&mut self, current_length: &mut usize) -> Result<usize, CommandError> {
        let desired = self.compiled.desired_queue_length as usize;
        let mut added = 0;

        while *current_length < desired && !self.pool.is_empty() {
            let index = rand::thread_rng().gen_range(0..self.pool.len());
            let file = self.pool.get(index).unwrap().to_owned();

            if !self.duration_passes(&file)? {
                self.pool.remove(index);
                continue;
            }
            if !self.rating_passes(&file)? {
                self.pool.remove(index);
                continue;
            }

            let pool_size = self.pool.len();
            let bypass_history = self.consecutive_history_rejections >= HISTORY_BYPASS_THRESHOLD;
            if !bypass_history && !self.history.can_add(&file, pool_size) {
                self.consecutive_history_rejections += 1;
                continue;
            }

            self.mpd.add(&file)?;
            self.history.store_song(&file);
            *current_length += 1;
            added += 1;
            self.consecutive_history_rejections = 0;
            debug!(file, "added candidate to queue");
        }

        Ok(added)
    }

    fn duration_passes(&mut self, file: &str) -> Result<bool, CommandError> {
        if self.compiled.duration.is_disabled() {
            return Ok(true);
        }

        match self.mpd.lsinfo(file)? {
            Some(song) => {
                let secs = song.duration.map(|d| d.as_secs() as u32).unwrap_or(0);
                Ok(self.compiled.duration.contains(secs))
            }
            None => Ok(false),
        }
    }

    fn rating_passes(&mut self, file: &str) -> Result<bool, CommandError> {
        if self.compiled.rating.is_disabled() || !self.compiled.include.is_empty() {
            return Ok(true);
        }

        match self.mpd.sticker_get(file, "rating") {
            Ok(sticker) => {
                let rating: u32 = sticker.value.parse().unwrap_or(0);
                Ok(self.compiled.rating.contains(rating) || (rating == 0 && self.compiled.include_unrated))
            }
            Err(_) => Ok(self.compiled.include_unrated),
        }
    }

    fn wait_for_wakeup(&mut self, shutdown: &AtomicBool) -> Result<(), CommandError> {
        if shutdown.load(Ordering::Relaxed) {
            return Ok(());
        }

        let changed = self.mpd.idle(&["player", "playlist", "message"])?;
        if changed.iter().any(|s| s == "message") {
            self.drain_control_messages();
        }

        Ok(())
    }

    fn drain_control_messages(&mut self) {
        let messages = match self.mpd.read_messages() {
            Ok(messages) => messages,
            Err(e) => {
                warn!(error = %e, "read_messages failed");
                return;
            }
        };

        for (channel, payload) in messages {
            if channel != INBOUND_CHANNEL {
                continue;
            }

            let now = unix_now();
            let reply = control::dispatch(&self.dispatcher, &self.status, &mut self.mpd, &payload, now);

            let client_id = payload.split(':').nth(1).unwrap_or("");
            let out_channel = if client_id.is_empty() {
                OUTBOUND_CHANNEL.to_owned()
            } else {
                format!("{OUTBOUND_CHANNEL}-{client_id}")
            };

            if let Err(e) = self.mpd.send_message(&out_channel, &reply) {
                warn!(error = %e, out_channel, "failed to post control reply");
            }
        }
    }
}

/// How many tracks to `delete 0` so the currently playing track, at `current_pos`, ends up at
/// or before `desired/2 - 1` — the middle of the visible queue.
fn trim_count(current_pos: usize, desired_queue_length: usize) -> usize {
    let want = desired_queue_length / 2;
    current_pos.saturating_sub(want.saturating_sub(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trim_count_targets_the_middle_of_the_queue() {
        // desired=20 -> want=10, so trimming should leave the current track at position 9.
        assert_eq!(trim_count(15, 20), 6);
        assert_eq!(trim_count(9, 20), 0);
        assert_eq!(trim_count(0, 20), 0);
    }

    #[test]
    fn trim_count_never_negative_for_small_positions() {
        assert_eq!(trim_count(3, 20), 0);
        assert_eq!(trim_count(0, 10), 0);
    }
}
