//! Per-directory scan state.
//!
//! A [`ScanState`] describes one scanned directory: its canonical path, a
//! census of its direct children and the time of the last `stat()`. The
//! state is persisted to a sidecar file (`.dedup_ds`) inside the directory
//! so later runs can report when the directory was last scanned.
//!
//! The sidecar is written atomically (temporary file + rename) and can be
//! read back in either supported [`Encoding`], whichever one the current run
//! is configured with.

pub mod codec;


use crate::data::{DirEntryInfo, EntryKind, ScanIdentity};
use crate::error::{DedupError, Result};
use crate::lister::{DirectoryLister, FsLister};
use crate::utils::{absolute_path, epoch_millis_now, millis_to_local};
use chrono::{DateTime, Local};
use log::{debug, warn};
use once_cell::sync::{Lazy, OnceCell};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use codec::Encoding;

/// Name of the sidecar file inside every scanned directory
pub const SIDECAR_NAME: &str = ".dedup_ds";

/// Temporary name used while the sidecar is being replaced
const SIDECAR_TMP_NAME: &str = ".dedup_ds.tmp";

// Serializes sidecar replacement within the process
static SIDECAR_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// Counts of the direct children of a directory.
///
/// The sidecar file itself is never counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Census {
    /// All direct children
    pub entry_count: u64,
    /// Regular files
    pub file_count: u64,
    /// Directories
    pub dir_count: u64,
    /// Symlinks, sockets, devices and anything else
    pub special_count: u64,
}

impl Census {
    fn from_entries(entries: &[DirEntryInfo]) -> Self {
        let mut census = Census {
            entry_count: entries.len() as u64,
            ..Census::default()
        };
        for entry in entries {
            match entry.kind {
                EntryKind::Regular => census.file_count += 1,
                EntryKind::Dir => census.dir_count += 1,
                EntryKind::Other => census.special_count += 1,
            }
        }
        census
    }
}

/// The persisted form of a [`ScanState`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSnapshot {
    /// Canonical path of the scanned directory
    pub path: PathBuf,
    pub census: Census,
    /// Time of the `stat()` that produced this snapshot, epoch milliseconds
    pub timestamp: i64,
    /// Version of dedup that wrote the snapshot
    pub dedup_version: String,
}

impl ScanSnapshot {
    pub fn last_scanned(&self) -> Option<DateTime<Local>> {
        millis_to_local(self.timestamp)
    }
}

/// Scan state of a single directory.
pub struct ScanState {
    identity: Arc<ScanIdentity>,
    census: Census,
    timestamp: i64,
    statted: bool,
    lister: Arc<dyn DirectoryLister>,
    regular_files: OnceCell<Vec<DirEntryInfo>>,
}

impl std::fmt::Debug for ScanState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanState")
            .field("path", &self.identity.path)
            .field("encoding", &self.identity.encoding)
            .field("census", &self.census)
            .field("timestamp", &self.timestamp)
            .field("statted", &self.statted)
            .finish()
    }
}

impl ScanState {
    /// Creates the state for `dir`, listing it from the filesystem.
    ///
    /// Nothing is read from disk until [`ScanState::stat`] or
    /// [`ScanState::read`] is called.
    pub fn new(dir: impl AsRef<Path>, encoding: Encoding) -> Self {
        Self::with_lister(dir, encoding, Arc::new(FsLister))
    }

    /// Creates the state for `dir` with a custom directory lister.
    pub fn with_lister(
        dir: impl AsRef<Path>,
        encoding: Encoding,
        lister: Arc<dyn DirectoryLister>,
    ) -> Self {
        let identity = ScanIdentity {
            path: absolute_path(dir.as_ref()),
            encoding,
        };
        Self {
            identity: Arc::new(identity),
            census: Census::default(),
            timestamp: 0,
            statted: false,
            lister,
            regular_files: OnceCell::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.identity.path
    }

    pub fn encoding(&self) -> Encoding {
        self.identity.encoding
    }

    /// Shared identity handed to every record hashed from this directory
    pub fn identity(&self) -> Arc<ScanIdentity> {
        Arc::clone(&self.identity)
    }

    pub fn census(&self) -> Census {
        self.census
    }

    /// Epoch milliseconds of the last `stat()`, or of the loaded snapshot
    pub fn timestamp_millis(&self) -> i64 {
        self.timestamp
    }

    /// `None` when the directory has neither been stat'ed nor loaded
    pub fn last_scanned(&self) -> Option<DateTime<Local>> {
        if self.timestamp == 0 {
            return None;
        }
        millis_to_local(self.timestamp)
    }

    /// True once `stat()` succeeded on this instance
    pub fn is_statted(&self) -> bool {
        self.statted
    }

    pub fn sidecar_path(&self) -> PathBuf {
        self.identity.path.join(SIDECAR_NAME)
    }

    pub fn snapshot(&self) -> ScanSnapshot {
        ScanSnapshot {
            path: self.identity.path.clone(),
            census: self.census,
            timestamp: self.timestamp,
            dedup_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Re-reads the direct children of the directory and refreshes the
    /// census, the timestamp and the regular-file enumeration.
    ///
    /// The timestamp is always the current time, even when a previously
    /// loaded snapshot claims a later one.
    ///
    /// # Errors
    /// Returns [`DedupError::Enumeration`] if the directory cannot be listed.
    pub fn stat(&mut self) -> Result<()> {
        let entries = self.enumerate()?;
        let regular: Vec<DirEntryInfo> = entries
            .iter()
            .filter(|e| e.kind == EntryKind::Regular)
            .cloned()
            .collect();

        let now = epoch_millis_now();
        if now < self.timestamp {
            warn!(
                "clock of {} is behind its recorded last run ({} < {} ms)",
                self.path().display(),
                now,
                self.timestamp
            );
        }

        self.census = Census::from_entries(&entries);
        self.timestamp = now;
        self.statted = true;

        let files = OnceCell::new();
        let _ = files.set(regular);
        self.regular_files = files;

        debug!(
            "stat {}: {} entries ({} files, {} dirs, {} special)",
            self.path().display(),
            self.census.entry_count,
            self.census.file_count,
            self.census.dir_count,
            self.census.special_count
        );
        Ok(())
    }

    /// Loads the persisted snapshot from the sidecar file.
    ///
    /// The configured encoding is tried first, then the other one. The
    /// loaded census and timestamp are adopted only before the first
    /// `stat()`; after that the snapshot is returned and the live state is
    /// left as `stat()` produced it.
    ///
    /// # Errors
    /// * [`DedupError::NotFound`] - no sidecar yet; the directory was never scanned
    /// * [`DedupError::Filesystem`] - the sidecar exists but cannot be read
    /// * [`DedupError::Decode`] - the sidecar is not valid in either encoding
    pub fn read(&mut self) -> Result<ScanSnapshot> {
        let sidecar = self.sidecar_path();
        let bytes = {
            let _g = SIDECAR_LOCK.lock();
            fs::read(&sidecar)
        }
        .map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                DedupError::NotFound(sidecar.clone())
            } else {
                DedupError::Filesystem {
                    path: sidecar.clone(),
                    source,
                }
            }
        })?;

        let encoding = self.encoding();
        let snapshot: ScanSnapshot = match encoding.decode(&bytes) {
            Ok(snapshot) => snapshot,
            Err(first) => encoding.other().decode(&bytes).map_err(|_| DedupError::Decode {
                path: sidecar.clone(),
                message: first,
            })?,
        };

        if snapshot.path != self.identity.path {
            warn!(
                "scan state in {} was recorded for {}",
                sidecar.display(),
                snapshot.path.display()
            );
        }

        if !self.statted {
            self.census = snapshot.census;
            self.timestamp = snapshot.timestamp;
        }

        Ok(snapshot)
    }

    /// Persists the current state, replacing any previous sidecar.
    ///
    /// # Errors
    /// * [`DedupError::NoSnapshot`] - `stat()` was never called on this instance
    /// * [`DedupError::Encode`] - serialization failed
    /// * [`DedupError::Filesystem`] - the sidecar could not be written
    pub fn write(&self) -> Result<()> {
        if !self.statted {
            return Err(DedupError::NoSnapshot(self.path().to_path_buf()));
        }

        let bytes = self.encoding().encode(&self.snapshot())?;
        let sidecar = self.sidecar_path();
        let temp_path = self.identity.path.join(SIDECAR_TMP_NAME);

        let _g = SIDECAR_LOCK.lock();
        fs::write(&temp_path, &bytes).map_err(|source| DedupError::Filesystem {
            path: temp_path.clone(),
            source,
        })?;
        fs::rename(&temp_path, &sidecar).map_err(|source| {
            let _ = fs::remove_file(&temp_path);
            DedupError::Filesystem {
                path: sidecar.clone(),
                source,
            }
        })?;

        debug!("wrote {} ({} bytes)", sidecar.display(), bytes.len());
        Ok(())
    }

    /// Direct regular files of the directory, in listing order.
    ///
    /// The enumeration is computed on first use (or by `stat()`) and then
    /// memoized, so repeated calls return the same sequence without touching
    /// the filesystem.
    ///
    /// # Errors
    /// Returns [`DedupError::Enumeration`] if the directory cannot be listed.
    pub fn list_regular_files(&self) -> Result<&[DirEntryInfo]> {
        self.regular_files
            .get_or_try_init(|| {
                Ok(self
                    .enumerate()?
                    .into_iter()
                    .filter(|e| e.kind == EntryKind::Regular)
                    .collect())
            })
            .map(Vec::as_slice)
    }

    fn enumerate(&self) -> Result<Vec<DirEntryInfo>> {
        let mut entries =
            self.lister
                .list(self.path())
                .map_err(|source| DedupError::Enumeration {
                    path: self.path().to_path_buf(),
                    source,
                })?;
        entries.retain(|e| e.name != SIDECAR_NAME && e.name != SIDECAR_TMP_NAME);
        Ok(entries)
    }
}
