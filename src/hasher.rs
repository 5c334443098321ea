//! Concurrent sniff-and-hash worker pool.
//!
//! A [`HashWorkerPool`] takes the regular files of one [`ScanState`] and
//! hashes every file whose leading bytes match its [`Matcher`]:
//!
//! - One feeder thread pushes file names, in enumeration order, into an
//!   unbuffered work queue and closes it when done
//! - A fixed number of worker threads pull from that queue; each item yields
//!   exactly one message, either a [`MediaFileRecord`] on the results channel
//!   or a [`Diagnostic`] on the diagnostic channel
//! - Once every worker has exited, the feeder closes both output channels and
//!   only then sends the completion signal on a buffered `done` channel
//!
//! Per-file failures are diagnostics; they never stop a worker. A shared
//! cancellation flag makes the feeder stop enqueueing and the workers stop
//! between items.
//!
//! # Example
//!
//! ```rust,no_run
//! use dedup::hasher::HashWorkerPool;
//! use dedup::state::{Encoding, ScanState};
//!
//! let mut scan = ScanState::new("/photos", Encoding::Json);
//! scan.stat()?;
//!
//! let mut pool = HashWorkerPool::new(&scan);
//! let channels = pool.run()?;
//! channels.drain(
//!     |record| println!("{} {}", record.hex_digest(), record.path().display()),
//!     |diagnostic| eprintln!("{}", diagnostic),
//! );
//! channels.wait();
//! # Ok::<(), dedup::error::DedupError>(())
//! ```

use crate::data::{ContentHash, MediaFileRecord, MediaKind, ScanIdentity};
use crate::error::{DedupError, Result};
use crate::sniff::{Matcher, PROBE_LEN, SignatureTable};
use crate::state::ScanState;
use crossbeam_channel::{Receiver, Select, Sender, bounded};
use log::{debug, warn};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::ffi::OsString;
use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

/// Default number of hashing workers.
///
/// Hashing is dominated by file I/O, so this does not follow the CPU count.
pub const DEFAULT_WORKERS: usize = 16;

/// Buffer size for streaming hash computation (64KB)
const HASH_BUFFER_SIZE: usize = 64 * 1024;

/// Lifecycle of a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    /// Constructed, not started
    Idle,
    /// Feeder is still enqueueing
    Running,
    /// Queue closed, workers finishing
    Draining,
    /// All workers exited and output channels closed
    Done,
}

/// Why a file produced no record without being an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Shorter than the probe window
    TooSmall { len: usize },
    /// Leading bytes matched no signature
    NotMedia,
}

/// Payload of a [`Diagnostic`]
#[derive(Debug)]
pub enum DiagnosticKind {
    Skipped(SkipReason),
    Failed(DedupError),
}

/// Per-file message for every item that did not produce a record.
#[derive(Debug)]
pub struct Diagnostic {
    pub path: PathBuf,
    pub kind: DiagnosticKind,
}

impl Diagnostic {
    pub fn skipped(path: PathBuf, reason: SkipReason) -> Self {
        Self {
            path,
            kind: DiagnosticKind::Skipped(reason),
        }
    }

    pub fn failed(path: PathBuf, error: DedupError) -> Self {
        Self {
            path,
            kind: DiagnosticKind::Failed(error),
        }
    }

    /// True for open/read/hash failures, false for soft skips
    pub fn is_error(&self) -> bool {
        matches!(self.kind, DiagnosticKind::Failed(_))
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            DiagnosticKind::Skipped(SkipReason::TooSmall { len }) => write!(
                f,
                "skipping {}: file too small ({} < {} bytes)",
                self.path.display(),
                len,
                PROBE_LEN
            ),
            DiagnosticKind::Skipped(SkipReason::NotMedia) => {
                write!(f, "skipping {}: not a supported media file", self.path.display())
            }
            DiagnosticKind::Failed(err) => write!(f, "{}", err),
        }
    }
}

/// Result of processing one queue item.
#[derive(Debug)]
pub enum ItemOutcome {
    Hashed {
        kind: MediaKind,
        hash: ContentHash,
        size: u64,
    },
    Skipped(SkipReason),
    Failed(DedupError),
}

/// Sniffs `path` and, on a match, hashes its full content.
///
/// The file handle is dropped before this function returns on every path.
pub fn process_file(path: &Path, matcher: &dyn Matcher) -> ItemOutcome {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(source) => {
            return ItemOutcome::Failed(DedupError::Filesystem {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let mut probe = [0u8; PROBE_LEN];
    let filled = match read_probe(&mut file, &mut probe) {
        Ok(n) => n,
        Err(source) => {
            return ItemOutcome::Failed(DedupError::Filesystem {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    if filled < PROBE_LEN {
        return ItemOutcome::Skipped(SkipReason::TooSmall { len: filled });
    }

    let Some(kind) = matcher.sniff(&probe) else {
        return ItemOutcome::Skipped(SkipReason::NotMedia);
    };

    let hashed = file
        .seek(SeekFrom::Start(0))
        .and_then(|_| hash_reader(&mut file));
    match hashed {
        Ok((hash, size)) => ItemOutcome::Hashed { kind, hash, size },
        Err(source) => ItemOutcome::Failed(DedupError::Hash {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Fills `buf` from `reader`, stopping early only at end of file.
fn read_probe<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Streams `reader` through SHA-256, returning the digest and byte count.
pub fn hash_reader<R: Read>(reader: &mut R) -> io::Result<(ContentHash, u64)> {
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; HASH_BUFFER_SIZE];
    let mut total = 0u64;

    loop {
        let n = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buffer[..n]);
        total += n as u64;
    }

    Ok((hasher.finalize().into(), total))
}

/// Output endpoints of a running pool.
pub struct PoolChannels {
    /// One record per hashed media file
    pub results: Receiver<MediaFileRecord>,
    /// One message per skipped or failed file
    pub diagnostics: Receiver<Diagnostic>,
    /// Fires once, after both channels above are closed
    pub done: Receiver<()>,
}

impl PoolChannels {
    /// Receives from both output channels until both are closed.
    ///
    /// The channels are unbuffered, so they must be drained together; a
    /// consumer that waits on one while a worker blocks on the other would
    /// deadlock.
    pub fn drain<R, D>(&self, mut on_record: R, mut on_diagnostic: D)
    where
        R: FnMut(MediaFileRecord),
        D: FnMut(Diagnostic),
    {
        let mut sel = Select::new();
        let results_idx = sel.recv(&self.results);
        let diagnostics_idx = sel.recv(&self.diagnostics);
        let mut open = 2;

        while open > 0 {
            let oper = sel.select();
            let idx = oper.index();
            if idx == results_idx {
                match oper.recv(&self.results) {
                    Ok(record) => on_record(record),
                    Err(_) => {
                        sel.remove(results_idx);
                        open -= 1;
                    }
                }
            } else if idx == diagnostics_idx {
                match oper.recv(&self.diagnostics) {
                    Ok(diagnostic) => on_diagnostic(diagnostic),
                    Err(_) => {
                        sel.remove(diagnostics_idx);
                        open -= 1;
                    }
                }
            }
        }
    }

    /// Blocks until the pool signals completion.
    ///
    /// Returns immediately if the signal was already consumed.
    pub fn wait(&self) {
        let _ = self.done.recv();
    }
}

/// Bounded pool of sniff-and-hash workers over one directory.
///
/// Pools are single-use: a second [`HashWorkerPool::run`] fails with
/// [`DedupError::PoolAlreadyStarted`].
pub struct HashWorkerPool<'a> {
    scan: &'a ScanState,
    workers: usize,
    matcher: Arc<dyn Matcher>,
    cancel: Arc<AtomicBool>,
    state: Arc<Mutex<PoolState>>,
}

impl<'a> HashWorkerPool<'a> {
    /// Creates a pool using the default image + video signature table
    pub fn new(scan: &'a ScanState) -> Self {
        Self::with_matcher(scan, Arc::new(SignatureTable::default()))
    }

    pub fn with_matcher(scan: &'a ScanState, matcher: Arc<dyn Matcher>) -> Self {
        Self {
            scan,
            workers: DEFAULT_WORKERS,
            matcher,
            cancel: Arc::new(AtomicBool::new(false)),
            state: Arc::new(Mutex::new(PoolState::Idle)),
        }
    }

    pub fn set_matcher(&mut self, matcher: Arc<dyn Matcher>) {
        self.matcher = matcher;
    }

    /// Sets the number of workers; zero is treated as one.
    pub fn set_worker_count(&mut self, count: usize) {
        self.workers = count.max(1);
    }

    /// Shares a cancellation flag with the caller, e.g. a Ctrl-C handler.
    pub fn set_cancel_flag(&mut self, flag: Arc<AtomicBool>) {
        self.cancel = flag;
    }

    pub fn worker_count(&self) -> usize {
        self.workers
    }

    pub fn state(&self) -> PoolState {
        *self.state.lock()
    }

    /// Starts the feeder and the workers.
    ///
    /// # Errors
    /// * [`DedupError::PoolAlreadyStarted`] - this pool already ran
    /// * [`DedupError::Enumeration`] - the directory listing could not be obtained
    /// * [`DedupError::PoolStart`] - a thread could not be spawned
    pub fn run(&mut self) -> Result<PoolChannels> {
        {
            let mut state = self.state.lock();
            if *state != PoolState::Idle {
                return Err(DedupError::PoolAlreadyStarted);
            }
            *state = PoolState::Running;
        }

        let names: Vec<OsString> = match self.scan.list_regular_files() {
            Ok(files) => files.iter().map(|e| e.name.clone()).collect(),
            Err(err) => {
                *self.state.lock() = PoolState::Done;
                return Err(err);
            }
        };

        let (work_tx, work_rx) = bounded::<OsString>(0);
        let (result_tx, result_rx) = bounded::<MediaFileRecord>(0);
        let (diag_tx, diag_rx) = bounded::<Diagnostic>(0);
        let (done_tx, done_rx) = bounded::<()>(1);

        debug!(
            "starting {} hash workers over {} files in {}",
            self.workers,
            names.len(),
            self.scan.path().display()
        );

        let mut handles = Vec::with_capacity(self.workers);
        for id in 0..self.workers {
            let worker = Worker {
                scan: self.scan.identity(),
                matcher: Arc::clone(&self.matcher),
                cancel: Arc::clone(&self.cancel),
                work: work_rx.clone(),
                results: result_tx.clone(),
                diagnostics: diag_tx.clone(),
            };
            let handle = thread::Builder::new()
                .name(format!("dedup-hash-{}", id))
                .spawn(move || worker.run())
                .map_err(|e| {
                    *self.state.lock() = PoolState::Done;
                    DedupError::PoolStart(e)
                })?;
            handles.push(handle);
        }
        drop(work_rx);

        let feeder = Feeder {
            names,
            cancel: Arc::clone(&self.cancel),
            state: Arc::clone(&self.state),
            work: work_tx,
            results: result_tx,
            diagnostics: diag_tx,
            done: done_tx,
            handles,
        };
        thread::Builder::new()
            .name("dedup-feeder".to_string())
            .spawn(move || feeder.run())
            .map_err(|e| {
                *self.state.lock() = PoolState::Done;
                DedupError::PoolStart(e)
            })?;

        Ok(PoolChannels {
            results: result_rx,
            diagnostics: diag_rx,
            done: done_rx,
        })
    }
}

struct Worker {
    scan: Arc<ScanIdentity>,
    matcher: Arc<dyn Matcher>,
    cancel: Arc<AtomicBool>,
    work: Receiver<OsString>,
    results: Sender<MediaFileRecord>,
    diagnostics: Sender<Diagnostic>,
}

impl Worker {
    fn run(self) {
        for name in self.work.iter() {
            if self.cancel.load(Ordering::Relaxed) {
                break;
            }

            let path = self.scan.path.join(&name);
            let delivered = match process_file(&path, self.matcher.as_ref()) {
                ItemOutcome::Hashed { kind, hash, size } => {
                    let record = MediaFileRecord::new(Arc::clone(&self.scan), &name, kind, hash, size);
                    self.results.send(record).is_ok()
                }
                ItemOutcome::Skipped(reason) => {
                    self.diagnostics.send(Diagnostic::skipped(path, reason)).is_ok()
                }
                ItemOutcome::Failed(err) => {
                    self.diagnostics.send(Diagnostic::failed(path, err)).is_ok()
                }
            };

            // Consumer hung up; nothing left to report to
            if !delivered {
                break;
            }
        }
    }
}

/// Feeds the work queue, then supervises shutdown.
struct Feeder {
    names: Vec<OsString>,
    cancel: Arc<AtomicBool>,
    state: Arc<Mutex<PoolState>>,
    work: Sender<OsString>,
    results: Sender<MediaFileRecord>,
    diagnostics: Sender<Diagnostic>,
    done: Sender<()>,
    handles: Vec<JoinHandle<()>>,
}

impl Feeder {
    fn run(self) {
        let Feeder {
            names,
            cancel,
            state,
            work,
            results,
            diagnostics,
            done,
            handles,
        } = self;

        for name in names {
            if cancel.load(Ordering::Relaxed) {
                debug!("cancelled, no longer enqueueing files");
                break;
            }
            if work.send(name).is_err() {
                break;
            }
        }
        drop(work);
        *state.lock() = PoolState::Draining;

        for handle in handles {
            if handle.join().is_err() {
                warn!("a hash worker panicked");
            }
        }

        // Close the output channels before signalling completion
        drop(results);
        drop(diagnostics);
        *state.lock() = PoolState::Done;
        let _ = done.send(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Encoding;
    use std::fs;
    use tempfile::TempDir;

    /// A JPEG-looking blob that is distinct per seed
    fn jpeg(seed: u8) -> Vec<u8> {
        let mut data = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
        data.extend_from_slice(b"JFIF\x00");
        data.resize(512, seed);
        data
    }

    fn drain(channels: &PoolChannels) -> (Vec<MediaFileRecord>, Vec<Diagnostic>) {
        let mut records = Vec::new();
        let mut diagnostics = Vec::new();
        channels.drain(|r| records.push(r), |d| diagnostics.push(d));
        channels.wait();
        (records, diagnostics)
    }

    fn stat(dir: &Path) -> ScanState {
        let mut scan = ScanState::new(dir, Encoding::Json);
        scan.stat().unwrap();
        scan
    }

    #[test]
    fn test_hash_reader_known_digest() {
        let (hash, size) = hash_reader(&mut &b"abc"[..]).unwrap();
        assert_eq!(
            crate::utils::to_hex(&hash),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(size, 3);
    }

    #[test]
    fn test_every_file_yields_exactly_one_message() {
        let temp_dir = TempDir::new().unwrap();
        for i in 0..20u8 {
            fs::write(temp_dir.path().join(format!("img_{:02}.jpg", i)), jpeg(i)).unwrap();
        }
        fs::write(temp_dir.path().join("notes.txt"), b"short").unwrap();
        fs::write(temp_dir.path().join("blob.bin"), vec![0x42; 1024]).unwrap();

        let scan = stat(temp_dir.path());
        let mut pool = HashWorkerPool::new(&scan);
        pool.set_worker_count(4);
        let channels = pool.run().unwrap();
        let (records, diagnostics) = drain(&channels);

        assert_eq!(records.len(), 20);
        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics.iter().all(|d| !d.is_error()));
        assert_eq!(pool.state(), PoolState::Done);
    }

    #[test]
    fn test_skip_reasons() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("tiny.jpg"), &jpeg(1)[..100]).unwrap();
        fs::write(temp_dir.path().join("data.bin"), vec![0x42; 1024]).unwrap();

        let scan = stat(temp_dir.path());
        let mut pool = HashWorkerPool::new(&scan);
        let channels = pool.run().unwrap();
        let (records, diagnostics) = drain(&channels);

        assert!(records.is_empty());
        let reason_for = |name: &str| {
            diagnostics
                .iter()
                .find(|d| d.path.ends_with(name))
                .map(|d| match &d.kind {
                    DiagnosticKind::Skipped(reason) => Some(*reason),
                    DiagnosticKind::Failed(_) => None,
                })
                .unwrap()
        };
        assert_eq!(reason_for("tiny.jpg"), Some(SkipReason::TooSmall { len: 100 }));
        assert_eq!(reason_for("data.bin"), Some(SkipReason::NotMedia));
    }

    #[test]
    fn test_identical_content_identical_digest() {
        let temp_dir = TempDir::new().unwrap();
        let mut altered = jpeg(7);
        altered[400] ^= 0x01;
        fs::write(temp_dir.path().join("a.jpg"), jpeg(7)).unwrap();
        fs::write(temp_dir.path().join("b.jpg"), jpeg(7)).unwrap();
        fs::write(temp_dir.path().join("c.jpg"), altered).unwrap();

        let scan = stat(temp_dir.path());
        let mut pool = HashWorkerPool::new(&scan);
        let channels = pool.run().unwrap();
        let (records, _) = drain(&channels);

        let digest = |name: &str| {
            records
                .iter()
                .find(|r| r.path().ends_with(name))
                .map(|r| r.hex_digest())
                .unwrap()
        };
        assert_eq!(digest("a.jpg"), digest("b.jpg"));
        assert_ne!(digest("a.jpg"), digest("c.jpg"));
        assert!(records.iter().all(|r| r.size() == 512));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_file_name_is_hashed() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let temp_dir = TempDir::new().unwrap();
        let name = OsStr::from_bytes(b"photo_\xff.jpg");
        fs::write(temp_dir.path().join(name), jpeg(9)).unwrap();

        let scan = stat(temp_dir.path());
        let mut pool = HashWorkerPool::new(&scan);
        let channels = pool.run().unwrap();
        let (records, diagnostics) = drain(&channels);

        assert!(diagnostics.is_empty(), "unexpected diagnostics: {:?}", diagnostics);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].path().file_name(), Some(name));
        assert_eq!(records[0].size(), 512);
    }

    #[test]
    fn test_pool_is_single_use() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a.jpg"), jpeg(1)).unwrap();

        let scan = stat(temp_dir.path());
        let mut pool = HashWorkerPool::new(&scan);
        assert_eq!(pool.state(), PoolState::Idle);

        let channels = pool.run().unwrap();
        drain(&channels);

        assert!(matches!(pool.run(), Err(DedupError::PoolAlreadyStarted)));
    }

    #[test]
    fn test_custom_matcher_widens_selection() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a.bin"), vec![0x01; 300]).unwrap();
        fs::write(temp_dir.path().join("b.bin"), vec![0x02; 300]).unwrap();

        let scan = stat(temp_dir.path());
        let anything = |_: &[u8]| Some(MediaKind::image("raw", "application/octet-stream"));
        let mut pool = HashWorkerPool::with_matcher(&scan, Arc::new(anything));
        let channels = pool.run().unwrap();
        let (records, diagnostics) = drain(&channels);

        assert_eq!(records.len(), 2);
        assert!(diagnostics.is_empty());
        assert!(records.iter().all(|r| r.kind().extension == "raw"));
    }

    #[test]
    fn test_single_worker_processes_everything() {
        let temp_dir = TempDir::new().unwrap();
        for i in 0..5u8 {
            fs::write(temp_dir.path().join(format!("{}.jpg", i)), jpeg(i)).unwrap();
        }

        let scan = stat(temp_dir.path());
        let mut pool = HashWorkerPool::new(&scan);
        pool.set_worker_count(0);
        assert_eq!(pool.worker_count(), 1);
        let channels = pool.run().unwrap();
        let (records, _) = drain(&channels);

        assert_eq!(records.len(), 5);
    }

    #[test]
    fn test_cancelled_pool_still_completes() {
        let temp_dir = TempDir::new().unwrap();
        for i in 0..10u8 {
            fs::write(temp_dir.path().join(format!("{}.jpg", i)), jpeg(i)).unwrap();
        }

        let scan = stat(temp_dir.path());
        let mut pool = HashWorkerPool::new(&scan);
        pool.set_cancel_flag(Arc::new(AtomicBool::new(true)));
        let channels = pool.run().unwrap();
        let (records, diagnostics) = drain(&channels);

        assert!(records.is_empty());
        assert!(diagnostics.is_empty());
        assert_eq!(pool.state(), PoolState::Done);
    }

    #[test]
    fn test_empty_directory_signals_done() {
        let temp_dir = TempDir::new().unwrap();

        let scan = stat(temp_dir.path());
        let mut pool = HashWorkerPool::new(&scan);
        let channels = pool.run().unwrap();
        let (records, diagnostics) = drain(&channels);

        assert!(records.is_empty());
        assert!(diagnostics.is_empty());
        assert_eq!(pool.state(), PoolState::Done);
    }
}
