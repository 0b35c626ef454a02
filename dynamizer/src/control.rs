//! Decodes inbound pub/sub control messages and routes them to rule-management actions.
//!
//! Control messages run inline on the dynamizer's own loop (see the main loop's idle/readmessages
//! step), so dispatch gets a direct handle to the same MPD connection rather than a second one.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::codec;
use crate::errors::StorageError;
use crate::status::{PlayerStatus, StatusFacade};

/// The MPD operations the dispatcher needs directly, kept minimal and mockable.
pub trait ControlMpd {
    fn clear_queue(&mut self) -> bool;
}

impl<IO: std::io::Read + std::io::Write> ControlMpd for mpd_client::Client<IO> {
    fn clear_queue(&mut self) -> bool {
        self.clear().is_ok()
    }
}

/// A decoded control message, before any filesystem or MPD action has been taken.
#[derive(Debug, PartialEq, Eq)]
enum Action {
    Status,
    List,
    Get(String),
    Save(String, String),
    Delete(String),
    SetActive(String, Option<String>),
    Control(String),
    Unknown,
    TooFewArgs,
}

fn parse_payload(payload: &str) -> Action {
    let parts: Vec<&str> = payload.split(':').collect();
    if parts.len() < 2 {
        return Action::TooFewArgs;
    }

    let command = parts[0];
    let args = &parts[2..];

    if command.ends_with("status") {
        Action::Status
    } else if command.ends_with("list") {
        Action::List
    } else if command.starts_with("get") {
        match args.first() {
            Some(name) => Action::Get((*name).to_owned()),
            None => Action::TooFewArgs,
        }
    } else if command.starts_with("save") {
        match args {
            [name, encoded, ..] => Action::Save((*name).to_owned(), codec::decode(encoded)),
            _ => Action::TooFewArgs,
        }
    } else if command.starts_with("delete") {
        match args.first() {
            Some(name) => Action::Delete((*name).to_owned()),
            None => Action::TooFewArgs,
        }
    } else if command.starts_with("setActive") {
        match args.first() {
            Some(name) => Action::SetActive((*name).to_owned(), args.get(1).map(|s| (*s).to_owned())),
            None => Action::TooFewArgs,
        }
    } else if command.starts_with("control") {
        match args.first() {
            Some(verb) => Action::Control((*verb).to_owned()),
            None => Action::TooFewArgs,
        }
    } else {
        Action::Unknown
    }
}

/// Rule-file storage rooted at `files_dir`, with `active_link` pointing at the currently
/// selected rule file.
#[derive(Debug)]
pub struct Dispatcher {
    files_dir: PathBuf,
    active_link: PathBuf,
}

impl Dispatcher {
    pub fn new(files_dir: impl Into<PathBuf>, active_link: impl Into<PathBuf>) -> Self {
        Dispatcher { files_dir: files_dir.into(), active_link: active_link.into() }
    }

    /// Path of the `active` symlink itself.
    pub fn active_link(&self) -> &Path {
        &self.active_link
    }

    fn rule_path(&self, name: &str) -> PathBuf {
        self.files_dir.join(format!("{name}.rules"))
    }

    fn validate_name(name: &str) -> Result<(), StorageError> {
        if name.is_empty() {
            return Err(StorageError::EmptyName);
        }
        if name.contains('/') || name.ends_with(".rules") {
            return Err(StorageError::IllegalName(name.to_owned()));
        }
        Ok(())
    }

    /// The basename (no extension) of the rule file the `active` link currently points at.
    pub fn active_name(&self) -> Option<String> {
        let target = std::fs::read_link(&self.active_link).ok()?;
        target.file_stem().map(|s| s.to_string_lossy().into_owned())
    }

    /// Basenames of every stored rule file, in filesystem order.
    pub fn list(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.files_dir) else {
            return Vec::new();
        };

        entries
            .filter_map(|e| e.ok())
            .filter_map(|e| e.path().file_stem().map(|s| s.to_string_lossy().into_owned()).zip(Some(e.path())))
            .filter(|(_, path)| path.extension().map(|ext| ext == "rules").unwrap_or(false))
            .map(|(name, _)| name)
            .collect()
    }

    pub fn get(&self, name: &str) -> Result<String, StorageError> {
        Self::validate_name(name)?;
        std::fs::read_to_string(self.rule_path(name)).map_err(|_| StorageError::TargetMissing(name.to_owned()))
    }

    pub fn save(&self, name: &str, contents: &str) -> Result<(), StorageError> {
        Self::validate_name(name)?;
        let path = self.rule_path(name);
        std::fs::write(&path, contents)
            .map_err(|source| StorageError::WriteFailed { path: path.display().to_string(), source })
    }

    pub fn delete(&self, name: &str) -> Result<(), StorageError> {
        Self::validate_name(name)?;
        let path = self.rule_path(name);
        std::fs::remove_file(&path)
            .map_err(|source| StorageError::UnlinkFailed { path: path.display().to_string(), source })
    }

    /// Repoints the `active` link at `name`'s rule file via unlink-then-symlink. Documented as
    /// carrying a non-atomic window between the two steps; see [`Dispatcher::set_active_atomic`]
    /// for the race-free alternative.
    pub fn set_active(&self, name: &str) -> Result<(), StorageError> {
        Self::validate_name(name)?;
        let target = self.rule_path(name);
        if !target.exists() {
            return Err(StorageError::TargetMissing(name.to_owned()));
        }

        match std::fs::symlink_metadata(&self.active_link) {
            Ok(meta) if meta.file_type().is_symlink() => std::fs::remove_file(&self.active_link)
                .map_err(StorageError::UnlinkActiveFailed)?,
            Ok(_) => return Err(StorageError::ActiveNotSymlink),
            Err(_) => {}
        }

        symlink(&target, &self.active_link).map_err(StorageError::SymlinkFailed)
    }

    /// The preferred alternative on platforms with atomic rename-over-symlink: creates the new
    /// link at a temporary path and renames it over `active_link`, closing the race window
    /// [`Dispatcher::set_active`] leaves open.
    pub fn set_active_atomic(&self, name: &str) -> Result<(), StorageError> {
        Self::validate_name(name)?;
        let target = self.rule_path(name);
        if !target.exists() {
            return Err(StorageError::TargetMissing(name.to_owned()));
        }

        let tmp = self.active_link.with_extension("tmp-active");
        symlink(&target, &tmp).map_err(StorageError::SymlinkFailed)?;
        std::fs::rename(&tmp, &self.active_link).map_err(StorageError::SymlinkFailed)
    }
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(not(unix))]
fn symlink(_target: &Path, _link: &Path) -> std::io::Result<()> {
    Err(std::io::Error::new(std::io::ErrorKind::Unsupported, "symlinks require a unix target"))
}

/// Decodes and routes one inbound control payload, returning the (not yet codec-encoded where
/// inapplicable) outbound response text.
pub fn dispatch(
    dispatcher: &Dispatcher,
    status: &StatusFacade,
    mpd: &mut impl ControlMpd,
    payload: &str,
    now: u64,
) -> String {
    match parse_payload(payload) {
        Action::TooFewArgs => "10".to_owned(),
        Action::Unknown => "11".to_owned(),
        Action::Status => {
            let snapshot = status.snapshot();
            format!(
                "{}:{}:{}",
                snapshot.state.as_str(),
                snapshot.timestamp,
                snapshot.active_rule.unwrap_or_default()
            )
        }
        Action::List => codec::encode(&dispatcher.list().join("\n")),
        Action::Get(name) => match dispatcher.get(&name) {
            Ok(contents) => format!("0:{}:{}", name, codec::encode(&contents)),
            Err(e) => {
                warn!(name, error = %e, "get failed");
                format!("{}:{}", e.status_code(), name)
            }
        },
        Action::Save(name, contents) => match dispatcher.save(&name, &contents) {
            Ok(()) => {
                status.bump_timestamp(now);
                info!(name, "saved rule file");
                format!("0:{}", name)
            }
            Err(e) => {
                warn!(name, error = %e, "save failed");
                format!("{}:{}", e.status_code(), name)
            }
        },
        Action::Delete(name) => match dispatcher.delete(&name) {
            Ok(()) => {
                status.bump_timestamp(now);
                if status.snapshot().active_rule.as_deref() == Some(name.as_str()) {
                    status.set_active_rule(None, now);
                    status.set_dynamic(false, now);
                    mpd.clear_queue();
                }
                info!(name, "deleted rule file");
                format!("0:{}", name)
            }
            Err(e) => {
                warn!(name, error = %e, "delete failed");
                format!("{}:{}", e.status_code(), name)
            }
        },
        Action::SetActive(name, start) => {
            let was_idle = status.snapshot().state == PlayerStatus::Idle;
            match dispatcher.set_active(&name) {
                Ok(()) => {
                    status.set_active_rule(Some(name.clone()), now);
                    if was_idle && matches!(start.as_deref(), Some("start") | Some("1")) {
                        status.set_dynamic(true, now);
                    }
                    info!(name, "activated rule file");
                    format!("0:{}", name)
                }
                Err(e) => {
                    warn!(name, error = %e, "setActive failed");
                    format!("{}:{}", e.status_code(), name)
                }
            }
        }
        Action::Control(verb) => match verb.as_str() {
            "start" => {
                status.set_dynamic(true, now);
                format!("0:{verb}")
            }
            "stop" => {
                status.set_dynamic(false, now);
                format!("0:{verb}")
            }
            "clear" => {
                mpd.clear_queue();
                format!("0:{verb}")
            }
            _ => format!("5:{verb}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeMpd {
        cleared: bool,
    }

    impl ControlMpd for FakeMpd {
        fn clear_queue(&mut self) -> bool {
            self.cleared = true;
            true
        }
    }

    fn dispatcher(dir: &std::path::Path) -> Dispatcher {
        Dispatcher::new(dir.to_path_buf(), dir.join("active"))
    }

    #[test]
    fn save_round_trips_through_get() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = dispatcher(dir.path());
        let status = StatusFacade::new();
        let mut mpd = FakeMpd { cleared: false };

        let payload = "save:abc:Myrules:Rating{c}1-5{n}Rule{n}Artist{c}X";
        let reply = dispatch(&dispatcher, &status, &mut mpd, payload, 100);
        assert_eq!(reply, "0:Myrules");
        assert_eq!(status.snapshot().timestamp, 100);

        let contents = dispatcher.get("Myrules").unwrap();
        assert_eq!(contents, "Rating:1-5\nRule\nArtist:X");
    }

    #[test]
    fn illegal_name_is_rejected_and_nothing_written() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = dispatcher(dir.path());
        let status = StatusFacade::new();
        let mut mpd = FakeMpd { cleared: false };

        let reply = dispatch(&dispatcher, &status, &mut mpd, "save:abc:bad/name:{q}", 0, );
        assert_eq!(reply, "2:bad/name");
        assert!(!dir.path().join("bad").exists());
    }

    #[test]
    fn too_few_args_is_code_10() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = dispatcher(dir.path());
        let status = StatusFacade::new();
        let mut mpd = FakeMpd { cleared: false };
        assert_eq!(dispatch(&dispatcher, &status, &mut mpd, "save", 0), "10");
    }

    #[test]
    fn unknown_verb_is_code_11() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = dispatcher(dir.path());
        let status = StatusFacade::new();
        let mut mpd = FakeMpd { cleared: false };
        assert_eq!(dispatch(&dispatcher, &status, &mut mpd, "frobnicate:abc:x", 0), "11");
    }

    #[test]
    fn deleting_active_rule_stops_dynamizer_and_clears_queue() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = dispatcher(dir.path());
        dispatcher.save("Active", "Rule\nArtist:X\n").unwrap();
        dispatcher.set_active("Active").unwrap();

        let status = StatusFacade::new();
        status.set_active_rule(Some("Active".into()), 0);
        status.set_dynamic(true, 0);

        let mut mpd = FakeMpd { cleared: false };
        let reply = dispatch(&dispatcher, &status, &mut mpd, "delete:abc:Active", 50);

        assert_eq!(reply, "0:Active");
        assert!(mpd.cleared);
        assert!(!status.snapshot().dynamic);
        assert!(status.snapshot().active_rule.is_none());
    }

    #[test]
    fn set_active_no_op_name_can_start_from_idle() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = dispatcher(dir.path());
        dispatcher.save("Active", "Rule\n").unwrap();
        dispatcher.set_active("Active").unwrap();

        let status = StatusFacade::new();
        status.set_active_rule(Some("Active".into()), 0);
        // state starts Idle by default

        let mut mpd = FakeMpd { cleared: false };
        let reply = dispatch(&dispatcher, &status, &mut mpd, "setActive:abc:Active:start", 10);

        assert_eq!(reply, "0:Active");
        assert!(status.snapshot().dynamic);
    }
}
