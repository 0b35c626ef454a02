//! Application-level error types.
//!
//! The protocol crates below this one use hand-rolled `Display`/`Error` impls to match the
//! shape MPD's own connection types use; up here, where the errors are this daemon's own
//! (config loading, rule storage, control dispatch), we reach for `thiserror` instead.

use thiserror::Error;

/// Errors that can prevent the daemon from starting at all.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{key} must be a valid port number, got {value:?}")]
    InvalidPort { key: &'static str, value: String },
}

/// Errors from reading, writing, or listing rule files on disk.
///
/// Each variant also carries the numeric status code the control dispatcher reports back to
/// clients for it (see the outer module's codec/dispatch tables).
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("rule name is empty")]
    EmptyName,
    #[error("rule name {0:?} is illegal")]
    IllegalName(String),
    #[error("failed to write rule file {path}: {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to remove rule file {path}: {source}")]
    UnlinkFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to remove the active symlink: {0}")]
    UnlinkActiveFailed(std::io::Error),
    #[error("active path exists but is not a symlink")]
    ActiveNotSymlink,
    #[error("failed to create the active symlink: {0}")]
    SymlinkFailed(std::io::Error),
    #[error("target rule file {0:?} does not exist")]
    TargetMissing(String),
}

impl StorageError {
    /// The numeric status code the control dispatcher reports for this error.
    pub fn status_code(&self) -> u8 {
        match self {
            StorageError::EmptyName => 1,
            StorageError::IllegalName(_) => 2,
            StorageError::WriteFailed { .. } => 3,
            StorageError::UnlinkFailed { .. } => 4,
            StorageError::UnlinkActiveFailed(_) => 6,
            StorageError::ActiveNotSymlink => 7,
            StorageError::SymlinkFailed(_) => 8,
            StorageError::TargetMissing(_) => 9,
        }
    }
}
