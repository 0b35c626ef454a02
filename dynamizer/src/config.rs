//! `key=value` configuration file loading, with CLI and environment overrides.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use clap::Parser;
use tracing::{debug, warn};

use crate::errors::ConfigError;

/// The recognized keys of the configuration file, plus a CLI front end for the ones worth
/// overriding ad hoc.
#[derive(Clone, Debug, Parser)]
#[command(name = "dynamizer", about = "Keeps an MPD queue populated from rule files")]
pub struct Config {
    /// Path to the `key=value` config file to load.
    #[arg(long, default_value = "dynamizer.conf")]
    pub config_file: PathBuf,

    /// MPD hostname or path to a local domain socket.
    #[arg(long)]
    pub mpd_host: Option<String>,

    /// MPD port (ignored for domain sockets).
    #[arg(long)]
    pub mpd_port: Option<u16>,

    /// MPD password, if the server requires one.
    #[arg(long)]
    pub mpd_password: Option<String>,

    /// Directory containing rule files and the `active` symlink.
    #[arg(long)]
    pub files_dir: Option<PathBuf>,

    /// Run a single status/trim/refill pass and exit, instead of running as a daemon. Exits
    /// non-zero if the queue ends the pass empty.
    #[arg(long)]
    pub one_shot: bool,

    #[command(flatten)]
    pub overrides: ConfigOverrides,
}

/// Fields parsed from the config file itself, before CLI/env overrides are layered on.
#[derive(Clone, Debug, Default, clap::Args)]
#[group(skip)]
pub struct ConfigOverrides {
    #[arg(skip)]
    pub active_file: Option<PathBuf>,
    #[arg(skip)]
    pub log_dir: Option<PathBuf>,
    #[arg(skip)]
    pub http_port: Option<u16>,
}

/// The fully resolved configuration, after config-file, CLI, and environment layering.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub mpd_host: String,
    pub mpd_port: u16,
    pub mpd_password: Option<String>,
    pub files_dir: PathBuf,
    pub active_file: PathBuf,
    pub log_dir: Option<PathBuf>,
    /// Recognized but unused: the HTTP management surface is out of scope for this binary.
    pub http_port: u16,
    /// Run one status/trim/refill pass and exit, rather than looping as a daemon.
    pub one_shot: bool,
    /// Unrecognized `key=value` pairs, kept around for forward compatibility.
    pub extra: HashMap<String, String>,
}

impl Config {
    /// Parse CLI arguments, load the config file they point at (if present), and resolve the
    /// final configuration by layering CLI flags over the file and environment variables over
    /// both, per the precedence the configuration loader is documented to use.
    pub fn resolve() -> Result<ResolvedConfig, ConfigError> {
        let cli = Config::parse();
        cli.resolve_from_self()
    }

    fn resolve_from_self(self) -> Result<ResolvedConfig, ConfigError> {
        let file = FileConfig::load(&self.config_file)?;

        let mut resolved = ResolvedConfig {
            mpd_host: self
                .mpd_host
                .or(file.mpd_host)
                .unwrap_or_else(|| "localhost".to_owned()),
            mpd_port: self.mpd_port.or(file.mpd_port).unwrap_or(6600),
            mpd_password: self.mpd_password.or(file.mpd_password),
            files_dir: self
                .files_dir
                .or(file.files_dir)
                .unwrap_or_else(|| PathBuf::from("rules")),
            active_file: file.active_file.unwrap_or_else(|| PathBuf::from("rules/active")),
            log_dir: file.log_dir,
            http_port: file.http_port.unwrap_or(0),
            extra: file.extra,
        };

        apply_environment(&mut resolved);

        Ok(resolved)
    }
}

/// Environment overrides applied last, at connect time: `MPD_HOST` (optionally
/// `password@host`) and `MPD_PORT`. Per §6, an override only takes effect if its value has
/// length greater than 2.
fn apply_environment(config: &mut ResolvedConfig) {
    if let Ok(host) = std::env::var("MPD_HOST") {
        if host.len() > 2 {
            if let Some((password, host)) = host.split_once('@') {
                config.mpd_password = Some(password.to_owned());
                config.mpd_host = host.to_owned();
            } else {
                config.mpd_host = host;
            }
            debug!(host = %config.mpd_host, "applied MPD_HOST override");
        }
    }

    if let Ok(port) = std::env::var("MPD_PORT") {
        if port.len() > 2 {
            match port.parse() {
                Ok(p) => {
                    config.mpd_port = p;
                    debug!(port = p, "applied MPD_PORT override");
                }
                Err(_) => warn!(value = %port, "ignoring non-numeric MPD_PORT"),
            }
        }
    }
}

/// Raw contents of the `key=value` file, before CLI/environment layering.
#[derive(Default)]
struct FileConfig {
    mpd_host: Option<String>,
    mpd_port: Option<u16>,
    mpd_password: Option<String>,
    files_dir: Option<PathBuf>,
    active_file: Option<PathBuf>,
    log_dir: Option<PathBuf>,
    http_port: Option<u16>,
    extra: HashMap<String, String>,
}

impl FileConfig {
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(?path, "no config file found, using defaults");
                return Ok(FileConfig::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                })
            }
        };

        let mut config = FileConfig::default();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                warn!(%line, "ignoring malformed config line");
                continue;
            };

            config.set(key.trim(), value.trim())?;
        }

        Ok(config)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "mpdHost" => self.mpd_host = Some(value.to_owned()),
            "mpdPort" => self.mpd_port = Some(parse_port("mpdPort", value)?),
            "mpdPassword" => self.mpd_password = Some(value.to_owned()),
            "filesDir" => self.files_dir = Some(PathBuf::from(value)),
            "activeFile" => self.active_file = Some(PathBuf::from(value)),
            "logDir" => self.log_dir = Some(PathBuf::from(value)),
            "httpPort" => self.http_port = Some(parse_port("httpPort", value)?),
            other => {
                self.extra.insert(other.to_owned(), value.to_owned());
            }
        }

        Ok(())
    }
}

fn parse_port(key: &'static str, value: &str) -> Result<u16, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidPort {
        key,
        value: value.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_recognized_keys_and_keeps_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dynamizer.conf");
        std::fs::write(
            &path,
            "mpdHost=player.local\n# comment\nmpdPort=6601\nsomeFutureKey=42\n",
        )
        .unwrap();

        let file = FileConfig::load(&path).unwrap();
        assert_eq!(file.mpd_host.as_deref(), Some("player.local"));
        assert_eq!(file.mpd_port, Some(6601));
        assert_eq!(file.extra.get("someFutureKey").map(String::as_str), Some("42"));
    }

    #[test]
    fn missing_file_uses_defaults() {
        let file = FileConfig::load(Path::new("/nonexistent/dynamizer.conf")).unwrap();
        assert!(file.mpd_host.is_none());
    }

    #[test]
    fn rejects_non_numeric_port() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dynamizer.conf");
        std::fs::write(&path, "mpdPort=notaport\n").unwrap();

        assert!(matches!(
            FileConfig::load(&path),
            Err(ConfigError::InvalidPort { .. })
        ));
    }
}
