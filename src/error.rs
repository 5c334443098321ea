//! Error types for `dedup`.
//!
//! Per-file variants (`Filesystem`, `Hash`) travel on the pool's diagnostic
//! stream and never abort a run. `Enumeration` is the only run-aborting
//! failure raised by the pipeline itself.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the scan and hash pipeline
#[derive(Error, Debug)]
pub enum DedupError {
    /// The scanned directory could not be listed
    #[error("could not list directory '{}': {source}", path.display())]
    Enumeration {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Open, read or write failure on a single file
    #[error("filesystem error on '{}': {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// No persisted state exists for the directory yet
    #[error("no scan state at '{}'", .0.display())]
    NotFound(PathBuf),

    /// Persisted state could not be parsed in any supported encoding
    #[error("could not parse scan state '{}': {message}", path.display())]
    Decode { path: PathBuf, message: String },

    /// State could not be serialized
    #[error("could not encode scan state: {0}")]
    Encode(String),

    /// I/O failure while streaming a file through the hasher
    #[error("could not hash '{}': {source}", path.display())]
    Hash {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// `write()` was called before any `stat()` on this instance
    #[error("refusing to persist '{}': directory was never stat'ed", .0.display())]
    NoSnapshot(PathBuf),

    /// A worker or feeder thread could not be spawned
    #[error("could not start hash pool: {0}")]
    PoolStart(#[source] io::Error),

    /// A hash pool was asked to run twice
    #[error("hash pool has already been started")]
    PoolAlreadyStarted,

    /// Invalid configuration value
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, DedupError>;

impl DedupError {
    /// The file or directory this error refers to, if any.
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            DedupError::Enumeration { path, .. }
            | DedupError::Filesystem { path, .. }
            | DedupError::Decode { path, .. }
            | DedupError::Hash { path, .. } => Some(path.as_path()),
            DedupError::NotFound(path) | DedupError::NoSnapshot(path) => Some(path.as_path()),
            DedupError::Encode(_)
            | DedupError::PoolStart(_)
            | DedupError::PoolAlreadyStarted
            | DedupError::Config(_) => None,
        }
    }

    /// True when the error only means "this directory was never scanned".
    pub fn is_not_found(&self) -> bool {
        matches!(self, DedupError::NotFound(_))
    }
}
