use std::path::PathBuf;

use crate::types::Mode;

/// Errors that abort session creation.
///
/// Transient per-entry filesystem errors and per-directory watch-install
/// errors are *not* represented here: they are logged and the session
/// continues, per the crate's error propagation policy (SPEC_FULL.md §7).
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("daemon unavailable: {0}")]
    DaemonUnavailable(String),

    #[error("invalid mode: {0:?}")]
    InvalidMode(Mode),

    #[error("failed to scan {path}: {source}")]
    ScanFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },
}

pub type Result<T> = std::result::Result<T, WatchError>;
