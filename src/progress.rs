//! Progress tracking for a hash run.
//!
//! [`ProgressTracker`] is the only state shared between the aggregation
//! thread (which advances it once per consumed item) and the reporter thread
//! (which only reads it). A [`ProgressSink`] turns snapshots into output;
//! [`LogSink`] writes log lines and [`BarSink`] drives an `indicatif` bar.

use crossbeam_channel::tick;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Default polling interval of the reporter
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_millis(500);

/// Point-in-time view of a [`ProgressTracker`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    pub completed: usize,
    pub total: usize,
    /// 0.0 to 100.0; an empty run is reported as 100%
    pub percent: f64,
    pub done: bool,
    pub elapsed: Duration,
}

#[derive(Debug)]
struct Counter {
    completed: usize,
    done: bool,
}

/// Completed-item counter with a completion flag.
#[derive(Debug)]
pub struct ProgressTracker {
    total: usize,
    started: Instant,
    inner: Mutex<Counter>,
}

impl ProgressTracker {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            started: Instant::now(),
            inner: Mutex::new(Counter {
                completed: 0,
                done: false,
            }),
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Counts one fully processed item.
    ///
    /// Returns false and leaves the count unchanged once the total has been
    /// reached or the tracker is done.
    pub fn increment(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.done || inner.completed >= self.total {
            return false;
        }
        inner.completed += 1;
        true
    }

    /// Marks the run as finished. Idempotent.
    pub fn mark_done(&self) {
        self.inner.lock().done = true;
    }

    pub fn is_done(&self) -> bool {
        self.inner.lock().done
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let inner = self.inner.lock();
        let percent = if self.total == 0 {
            100.0
        } else {
            inner.completed as f64 / self.total as f64 * 100.0
        };
        ProgressSnapshot {
            completed: inner.completed,
            total: self.total,
            percent,
            done: inner.done,
            elapsed: self.started.elapsed(),
        }
    }
}

/// Receives progress snapshots for display.
pub trait ProgressSink: Send + Sync {
    fn report(&self, snapshot: &ProgressSnapshot);
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressSnapshot) + Send + Sync,
{
    fn report(&self, snapshot: &ProgressSnapshot) {
        self(snapshot)
    }
}

/// Writes one `info` line per snapshot.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ProgressSink for LogSink {
    fn report(&self, snapshot: &ProgressSnapshot) {
        info!(
            "processed {}/{} ({:.2}%) files",
            snapshot.completed, snapshot.total, snapshot.percent
        );
        if snapshot.done {
            info!("processing done in {:.2?}", snapshot.elapsed);
        }
    }
}

/// Terminal progress bar.
pub struct BarSink {
    bar: ProgressBar,
}

impl BarSink {
    /// The bar length is taken from the snapshots it receives.
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::default_bar()
            .template("  {spinner:.green} [{bar:40.cyan/dim}] {pos}/{len} ({percent}%) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("━━╾─");
        bar.set_style(style);
        bar.set_message("hashing");
        Self { bar }
    }
}

impl Default for BarSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for BarSink {
    fn report(&self, snapshot: &ProgressSnapshot) {
        self.bar.set_length(snapshot.total as u64);
        self.bar.set_position(snapshot.completed as u64);
        if snapshot.done {
            self.bar
                .finish_with_message(format!("done in {:.2?}", snapshot.elapsed));
        }
    }
}

/// Polls `tracker` every `interval` and forwards each snapshot to `sink`.
///
/// The thread exits right after forwarding the first snapshot that reports
/// `done`. It never modifies the tracker.
pub fn spawn_reporter(
    tracker: Arc<ProgressTracker>,
    sink: Arc<dyn ProgressSink>,
    interval: Duration,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("dedup-progress".to_string())
        .spawn(move || {
            let ticker = tick(interval);
            loop {
                if ticker.recv().is_err() {
                    return;
                }
                let snapshot = tracker.snapshot();
                sink.report(&snapshot);
                if snapshot.done {
                    return;
                }
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_is_clamped_to_total() {
        let tracker = ProgressTracker::new(2);
        assert!(tracker.increment());
        assert!(tracker.increment());
        assert!(!tracker.increment());

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.completed, 2);
        assert_eq!(snapshot.total, 2);
        assert_eq!(snapshot.percent, 100.0);
        assert!(!snapshot.done);
    }

    #[test]
    fn test_mark_done_is_idempotent_and_final() {
        let tracker = ProgressTracker::new(10);
        tracker.increment();
        tracker.mark_done();
        tracker.mark_done();

        assert!(tracker.is_done());
        assert!(!tracker.increment());
        assert_eq!(tracker.snapshot().completed, 1);
    }

    #[test]
    fn test_percent() {
        let tracker = ProgressTracker::new(4);
        tracker.increment();
        assert_eq!(tracker.snapshot().percent, 25.0);

        assert_eq!(ProgressTracker::new(0).snapshot().percent, 100.0);
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        let tracker = Arc::new(ProgressTracker::new(8_000));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tracker = Arc::clone(&tracker);
                thread::spawn(move || {
                    for _ in 0..1_000 {
                        tracker.increment();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(tracker.snapshot().completed, 8_000);
    }

    #[test]
    fn test_reporter_stops_after_done() {
        let tracker = Arc::new(ProgressTracker::new(3));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        let sink = move |s: &ProgressSnapshot| sink_seen.lock().push(*s);

        let reporter =
            spawn_reporter(Arc::clone(&tracker), Arc::new(sink), Duration::from_millis(5))
                .unwrap();

        for _ in 0..3 {
            tracker.increment();
        }
        tracker.mark_done();
        reporter.join().unwrap();

        let seen = seen.lock();
        let last = seen.last().unwrap();
        assert!(last.done);
        assert_eq!(last.completed, 3);
        assert_eq!(seen.iter().filter(|s| s.done).count(), 1);
        assert!(seen.windows(2).all(|w| w[0].completed <= w[1].completed));
    }
}
