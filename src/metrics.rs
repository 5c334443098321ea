//! Phase timing and run statistics for `dedup index --profile`.
//!
//! This module provides:
//! - [`PhaseTimer`] - A wrapper around `Instant` for timing one phase
//! - [`ProfileData`] - Phase timings plus per-file outcome counters
//! - [`print_profile_summary`] - Terminal output for profiling results
//! - [`save_stats_json`] - JSON output for scripting integration
//!
//! # Usage
//!
//! ```rust
//! use dedup::metrics::{PhaseTimer, ProfileData};
//!
//! let mut profile = ProfileData::new();
//! let timer = PhaseTimer::new("stat");
//!
//! // ... do work ...
//!
//! profile.add_phase(timer.finish());
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// A timer for measuring the duration of a named phase.
#[derive(Debug, Clone)]
pub struct PhaseTimer {
    pub name: String,
    pub start: Instant,
}

impl PhaseTimer {
    /// Creates a new timer and starts timing the specified phase.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            start: Instant::now(),
        }
    }

    /// Finishes timing the phase.
    pub fn finish(self) -> PhaseResult {
        PhaseResult {
            name: self.name,
            duration: self.start.elapsed(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

/// The result of a completed phase timing operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseResult {
    pub name: String,
    #[serde(with = "duration_serde")]
    pub duration: Duration,
}

/// Durations are stored as whole milliseconds in JSON
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Profiling data for one index run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileData {
    /// Timing results in execution order
    pub phases: Vec<PhaseResult>,
    /// Files that produced a digest
    pub hashed: u64,
    /// Files skipped as too small or not media
    pub skipped: u64,
    /// Files that failed to open, read or hash
    pub failed: u64,
    /// Bytes that went through the hasher
    pub bytes_hashed: u64,
    pub metadata: BTreeMap<String, String>,
}

impl ProfileData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_phase(&mut self, phase: PhaseResult) {
        self.phases.push(phase);
    }

    pub fn add_metadata(&mut self, key: &str, value: &str) {
        self.metadata.insert(key.to_string(), value.to_string());
    }

    /// Sum of all phase durations.
    pub fn total_duration(&self) -> Duration {
        self.phases.iter().map(|p| p.duration).sum()
    }

    pub fn phase(&self, name: &str) -> Option<&PhaseResult> {
        self.phases.iter().find(|p| p.name == name)
    }

    /// Hashing throughput in MB/s over the `hash` phase, if it was timed
    pub fn throughput_mb_s(&self) -> Option<f64> {
        let secs = self.phase("hash")?.duration.as_secs_f64();
        if secs == 0.0 {
            return None;
        }
        Some(self.bytes_hashed as f64 / (1024.0 * 1024.0) / secs)
    }
}

/// Prints a formatted profile summary to the terminal.
///
/// # Example Output
/// ```text
/// Index phase timings
///   read                  0 ms
///   stat                  2 ms
///   hash                310 ms
///   persist               1 ms
/// Files:            120 hashed, 4 skipped, 0 failed
/// Throughput:       88.4 MB/s
/// ```
pub fn print_profile_summary(profile: &ProfileData) {
    println!("\nIndex phase timings");

    for phase in &profile.phases {
        println!("  {:<15} {:>7} ms", phase.name, phase.duration.as_millis());
    }

    println!(
        "Files:            {} hashed, {} skipped, {} failed",
        profile.hashed, profile.skipped, profile.failed
    );
    if let Some(rate) = profile.throughput_mb_s() {
        println!("Throughput:       {:.1} MB/s", rate);
    }

    if !profile.metadata.is_empty() {
        println!("\nAdditional metrics:");
        for (key, value) in &profile.metadata {
            println!("  {:<15} {}", key, value);
        }
    }

    println!();
}

/// Writes `stats.json` next to `output_path` and returns its location.
pub fn save_stats_json(output_path: &Path, profile: &ProfileData) -> Result<PathBuf> {
    let stats_path = output_path.with_file_name("stats.json");

    let stats = serde_json::json!({
        "index_phases": profile.phases,
        "total_duration_ms": profile.total_duration().as_millis(),
        "hashed": profile.hashed,
        "skipped": profile.skipped,
        "failed": profile.failed,
        "bytes_hashed": profile.bytes_hashed,
        "throughput_mb_s": profile.throughput_mb_s(),
        "metadata": profile.metadata,
        "timestamp": chrono::Utc::now().to_rfc3339()
    });

    std::fs::write(&stats_path, serde_json::to_string_pretty(&stats)?)
        .with_context(|| format!("Failed to write {}", stats_path.display()))?;

    Ok(stats_path)
}

/// Times a block of code, returning `(result, PhaseResult)`.
///
/// # Example
/// ```rust
/// use dedup::time_phase;
///
/// let (result, timing) = time_phase!("stat", {
///     42
/// });
/// assert_eq!(result, 42);
/// assert_eq!(timing.name, "stat");
/// ```
#[macro_export]
macro_rules! time_phase {
    ($name:expr, $code:block) => {{
        let timer = $crate::metrics::PhaseTimer::new($name);
        let result = $code;
        let timing = timer.finish();
        (result, timing)
    }};
}
