//! The dynamizer's externally visible state, published behind a `Mutex` for any other thread to
//! read atomically.

use std::sync::Mutex;

/// One of the states the dynamizer loop can be observed in from the outside.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayerStatus {
    Idle,
    Starting,
    HaveSongs,
    NoSongs,
}

impl PlayerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerStatus::Idle => "IDLE",
            PlayerStatus::Starting => "STARTING",
            PlayerStatus::HaveSongs => "HAVE_SONGS",
            PlayerStatus::NoSongs => "NO_SONGS",
        }
    }
}

/// A read-only snapshot of the dynamizer's state, as seen by the control dispatcher or any
/// future external surface.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub state: PlayerStatus,
    pub dynamic: bool,
    /// Bumped on every user-visible rule-file mutation or dynamic on/off toggle.
    pub timestamp: u64,
    /// Basename (without extension) of the active rule file.
    pub active_rule: Option<String>,
}

impl StatusSnapshot {
    pub fn new() -> Self {
        StatusSnapshot {
            state: PlayerStatus::Idle,
            dynamic: false,
            timestamp: 0,
            active_rule: None,
        }
    }
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

/// The dynamizer thread's mutable status, exposed to other threads only through this facade.
#[derive(Debug, Default)]
pub struct StatusFacade(Mutex<StatusSnapshot>);

impl StatusFacade {
    pub fn new() -> Self {
        StatusFacade(Mutex::new(StatusSnapshot::new()))
    }

    /// Reads a copy of the current snapshot.
    pub fn snapshot(&self) -> StatusSnapshot {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Sets the player state, leaving other fields untouched.
    pub fn set_state(&self, state: PlayerStatus) {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).state = state;
    }

    /// Flips dynamic mode and bumps the timestamp.
    pub fn set_dynamic(&self, dynamic: bool, now: u64) {
        let mut guard = self.0.lock().unwrap_or_else(|e| e.into_inner());
        guard.dynamic = dynamic;
        guard.timestamp = now;
    }

    /// Records a new active rule file and bumps the timestamp.
    pub fn set_active_rule(&self, name: Option<String>, now: u64) {
        let mut guard = self.0.lock().unwrap_or_else(|e| e.into_inner());
        guard.active_rule = name;
        guard.timestamp = now;
    }

    /// Bumps the timestamp without otherwise changing the snapshot, for mutations (such as
    /// saving a non-active rule file) that are user-visible but don't change player state.
    pub fn bump_timestamp(&self, now: u64) {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).timestamp = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_snapshot_is_idle_and_static() {
        let facade = StatusFacade::new();
        let snapshot = facade.snapshot();
        assert_eq!(snapshot.state, PlayerStatus::Idle);
        assert!(!snapshot.dynamic);
    }

    #[test]
    fn set_dynamic_bumps_timestamp() {
        let facade = StatusFacade::new();
        facade.set_dynamic(true, 42);
        let snapshot = facade.snapshot();
        assert!(snapshot.dynamic);
        assert_eq!(snapshot.timestamp, 42);
    }

    #[test]
    fn set_active_rule_updates_name() {
        let facade = StatusFacade::new();
        facade.set_active_rule(Some("MyRules".into()), 7);
        assert_eq!(facade.snapshot().active_rule.as_deref(), Some("MyRules"));
    }
}
