//! Top-level operations behind the `index`, `dryrun` and `status` commands.
//!
//! [`run_index`] strings the stages together:
//!
//! 1. load the previous [`ScanSnapshot`], if any, and log when it was taken
//! 2. `stat()` the directory; failure to list it aborts the run
//! 3. start the [`HashWorkerPool`] and a progress reporter
//! 4. drain results and diagnostics on the calling thread, folding records
//!    into [`DuplicateGroups`] and advancing the [`ProgressTracker`] once per
//!    item
//! 5. wait for the pool's completion signal, mark progress done
//! 6. persist the new scan state
//!
//! A failure in step 6 is kept in [`IndexReport::persist_error`] instead of
//! discarding a completed hash run.

use crate::dupes::{DuplicateAggregator, DuplicateGroups};
use crate::error::{DedupError, Result};
use crate::hasher::{DEFAULT_WORKERS, Diagnostic, DiagnosticKind, HashWorkerPool};
use crate::lister::{DirectoryLister, FsLister};
use crate::metrics::{PhaseTimer, ProfileData};
use crate::progress::{
    DEFAULT_REPORT_INTERVAL, ProgressSink, ProgressSnapshot, ProgressTracker, spawn_reporter,
};
use crate::sniff::{Matcher, SignatureTable};
use crate::state::{Census, Encoding, ScanSnapshot, ScanState};
use crate::utils::format_timestamp;
use log::{debug, info, warn};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

/// Settings for one [`run_index`] call.
#[derive(Clone)]
pub struct IndexOptions {
    pub path: PathBuf,
    pub encoding: Encoding,
    pub workers: usize,
    pub report_interval: Duration,
    pub matcher: Arc<dyn Matcher>,
    pub lister: Arc<dyn DirectoryLister>,
}

impl IndexOptions {
    /// Defaults: JSON state, 16 workers, 500 ms reports, image + video
    /// signatures, filesystem listing.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            encoding: Encoding::default(),
            workers: DEFAULT_WORKERS,
            report_interval: DEFAULT_REPORT_INTERVAL,
            matcher: Arc::new(SignatureTable::default()),
            lister: Arc::new(FsLister),
        }
    }
}

impl std::fmt::Debug for IndexOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexOptions")
            .field("path", &self.path)
            .field("encoding", &self.encoding)
            .field("workers", &self.workers)
            .field("report_interval", &self.report_interval)
            .finish_non_exhaustive()
    }
}

/// Outcome of a completed (or cancelled) index run.
#[derive(Debug)]
pub struct IndexReport {
    /// Canonical path of the scanned directory
    pub path: PathBuf,
    /// State persisted by the previous run
    pub previous: Option<ScanSnapshot>,
    pub census: Census,
    pub groups: DuplicateGroups,
    /// Soft skips: too small or no matching signature
    pub skipped: u64,
    /// Files that could not be opened, read or hashed
    pub failures: Vec<Diagnostic>,
    /// Final progress, always marked done
    pub progress: ProgressSnapshot,
    /// True if the cancellation flag was raised during the run
    pub cancelled: bool,
    /// Set when the scan state could not be written after hashing
    pub persist_error: Option<DedupError>,
    pub profile: ProfileData,
}

impl IndexReport {
    /// Files that produced a digest
    pub fn hashed(&self) -> usize {
        self.groups.file_count()
    }
}

/// Outcome of a dry run.
#[derive(Debug, Clone)]
pub struct DryrunReport {
    pub path: PathBuf,
    pub previous: Option<ScanSnapshot>,
    pub census: Census,
    pub timestamp: i64,
}

/// Reads the previous snapshot, logging when the directory was last scanned.
///
/// A missing or unreadable sidecar never fails the caller.
fn load_previous(scan: &mut ScanState) -> Option<ScanSnapshot> {
    match scan.read() {
        Ok(snapshot) => {
            info!("last run was at {}", format_timestamp(snapshot.timestamp));
            Some(snapshot)
        }
        Err(err) if err.is_not_found() => {
            info!("last run was never");
            None
        }
        Err(err) => {
            warn!("ignoring previous scan state: {}", err);
            None
        }
    }
}

/// Hashes every media file directly inside `opts.path` and groups them by
/// content.
///
/// # Errors
/// * [`DedupError::Enumeration`] - the directory could not be listed
/// * [`DedupError::PoolStart`] - worker threads could not start
///
/// A progress reporter that fails to start only costs the progress display;
/// the run continues without it.
pub fn run_index(
    opts: &IndexOptions,
    cancel: Arc<AtomicBool>,
    sink: Arc<dyn ProgressSink>,
) -> Result<IndexReport> {
    let mut profile = ProfileData::new();
    let mut scan = ScanState::with_lister(&opts.path, opts.encoding, Arc::clone(&opts.lister));

    let timer = PhaseTimer::new("read");
    let previous = load_previous(&mut scan);
    profile.add_phase(timer.finish());

    let timer = PhaseTimer::new("stat");
    scan.stat()?;
    let total = scan.list_regular_files()?.len();
    profile.add_phase(timer.finish());
    info!(
        "indexing {} ({} regular files)",
        scan.path().display(),
        total
    );

    let timer = PhaseTimer::new("hash");
    let tracker = Arc::new(ProgressTracker::new(total));
    let mut pool = HashWorkerPool::with_matcher(&scan, Arc::clone(&opts.matcher));
    pool.set_worker_count(opts.workers);
    pool.set_cancel_flag(Arc::clone(&cancel));
    let channels = pool.run()?;
    let reporter = reporter_or_warn(spawn_reporter(
        Arc::clone(&tracker),
        sink,
        opts.report_interval,
    ));

    let mut aggregator = DuplicateAggregator::new();
    let mut skipped = 0u64;
    let mut failures = Vec::new();
    let mut bytes_hashed = 0u64;
    channels.drain(
        |record| {
            bytes_hashed += record.size();
            aggregator.fold(record);
            tracker.increment();
        },
        |diagnostic| {
            match &diagnostic.kind {
                DiagnosticKind::Skipped(_) => {
                    debug!("{}", diagnostic);
                    skipped += 1;
                }
                DiagnosticKind::Failed(_) => {
                    warn!("{}", diagnostic);
                    failures.push(diagnostic);
                }
            }
            tracker.increment();
        },
    );
    channels.wait();
    tracker.mark_done();

    if let Some(reporter) = reporter {
        if reporter.join().is_err() {
            warn!("progress reporter panicked");
        }
    }
    profile.add_phase(timer.finish());

    let cancelled = cancel.load(Ordering::Relaxed);
    if cancelled {
        warn!("run was cancelled; results are partial");
    }

    let timer = PhaseTimer::new("persist");
    let persist_error = match scan.write() {
        Ok(()) => None,
        Err(err) => {
            warn!("could not persist scan state: {}", err);
            Some(err)
        }
    };
    profile.add_phase(timer.finish());

    let groups = aggregator.into_groups();
    profile.hashed = groups.file_count() as u64;
    profile.skipped = skipped;
    profile.failed = failures.len() as u64;
    profile.bytes_hashed = bytes_hashed;
    profile.add_metadata("workers", &pool.worker_count().to_string());
    profile.add_metadata("encoding", opts.encoding.as_str());

    Ok(IndexReport {
        path: scan.path().to_path_buf(),
        previous,
        census: scan.census(),
        groups,
        skipped,
        failures,
        progress: tracker.snapshot(),
        cancelled,
        persist_error,
        profile,
    })
}

fn reporter_or_warn(spawned: io::Result<JoinHandle<()>>) -> Option<JoinHandle<()>> {
    match spawned {
        Ok(handle) => Some(handle),
        Err(err) => {
            warn!("could not start progress reporter, continuing without it: {}", err);
            None
        }
    }
}

/// Refreshes and persists the scan state of `path` without hashing anything.
///
/// # Errors
/// Enumeration and sidecar write failures are returned.
pub fn run_dryrun(path: &Path, encoding: Encoding) -> Result<DryrunReport> {
    let mut scan = ScanState::new(path, encoding);
    let previous = load_previous(&mut scan);

    scan.stat()?;
    scan.write()?;
    info!("created dirstat file {}", scan.sidecar_path().display());

    Ok(DryrunReport {
        path: scan.path().to_path_buf(),
        previous,
        census: scan.census(),
        timestamp: scan.timestamp_millis(),
    })
}

/// Loads the persisted scan state of `path`.
///
/// # Errors
/// [`DedupError::NotFound`] if the directory was never scanned, or a read or
/// decode error.
pub fn run_status(path: &Path, encoding: Encoding) -> Result<ScanSnapshot> {
    let mut scan = ScanState::new(path, encoding);
    scan.read()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn jpeg(seed: u8) -> Vec<u8> {
        let mut data = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
        data.extend_from_slice(b"JFIF\x00");
        data.resize(400, seed);
        data
    }

    fn quiet() -> Arc<dyn ProgressSink> {
        Arc::new(|_: &ProgressSnapshot| {})
    }

    #[test]
    fn test_index_groups_and_persists() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("a.jpg"), jpeg(1)).unwrap();
        fs::write(temp_dir.path().join("b.jpg"), jpeg(1)).unwrap();
        fs::write(temp_dir.path().join("c.jpg"), jpeg(2)).unwrap();
        fs::write(temp_dir.path().join("notes.txt"), b"hello").unwrap();

        let mut opts = IndexOptions::new(temp_dir.path());
        opts.workers = 2;
        opts.report_interval = Duration::from_millis(5);
        let report = run_index(&opts, Arc::new(AtomicBool::new(false)), quiet()).unwrap();

        assert_eq!(report.hashed(), 3);
        assert_eq!(report.skipped, 1);
        assert!(report.failures.is_empty());
        assert_eq!(report.groups.duplicate_count(), 1);
        assert!(report.progress.done);
        assert_eq!(report.progress.completed, 4);
        assert!(report.persist_error.is_none());
        assert!(report.previous.is_none());
        assert!(temp_dir.path().join(crate::state::SIDECAR_NAME).exists());

        let second = run_index(&opts, Arc::new(AtomicBool::new(false)), quiet()).unwrap();
        assert!(second.previous.is_some());
        assert_eq!(second.census, report.census);
    }

    #[test]
    fn test_reporter_start_failure_is_not_fatal() {
        let failed = io::Error::new(io::ErrorKind::OutOfMemory, "no threads left");
        assert!(reporter_or_warn(Err(failed)).is_none());

        let handle = std::thread::spawn(|| {});
        let kept = reporter_or_warn(Ok(handle)).unwrap();
        assert!(kept.join().is_ok());
    }

    #[test]
    fn test_index_missing_directory_fails() {
        let temp_dir = tempfile::tempdir().unwrap();
        let opts = IndexOptions::new(temp_dir.path().join("missing"));

        let err = run_index(&opts, Arc::new(AtomicBool::new(false)), quiet()).unwrap_err();
        assert!(matches!(err, DedupError::Enumeration { .. }));
    }

    #[test]
    fn test_dryrun_then_status() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("a.jpg"), jpeg(1)).unwrap();
        fs::create_dir(temp_dir.path().join("nested")).unwrap();

        assert!(run_status(temp_dir.path(), Encoding::Binary)
            .unwrap_err()
            .is_not_found());

        let dry = run_dryrun(temp_dir.path(), Encoding::Binary).unwrap();
        assert_eq!(dry.census.file_count, 1);
        assert_eq!(dry.census.dir_count, 1);

        let status = run_status(temp_dir.path(), Encoding::Binary).unwrap();
        assert_eq!(status.census, dry.census);
        assert_eq!(status.timestamp, dry.timestamp);
    }
}
