//! Library crate for dedup
//!
//! Finds byte-identical images and videos among the direct children of a
//! directory. Files are recognized by their leading bytes, hashed with
//! SHA-256 by a bounded worker pool, and grouped by digest. A small sidecar
//! file records when each directory was last scanned.
//!
//! # Modules
//!
//! - [`sniff`]: magic-number signatures for image and video formats
//! - [`state`]: per-directory census and sidecar persistence
//! - [`lister`]: directory listing seam
//! - [`hasher`]: the sniff-and-hash worker pool
//! - [`progress`]: shared progress counter and reporters
//! - [`dupes`]: grouping of records by digest
//! - [`run`]: the `index`, `dryrun` and `status` operations
//! - [`output`]: terminal, JSON and CSV renderers
//! - [`config`], [`cli`], [`logging`]: binary plumbing
//! - [`metrics`]: phase timings for `--profile`

pub mod cli;
pub mod config;
pub mod data;
pub mod dupes;
pub mod error;
pub mod hasher;
pub mod lister;
pub mod logging;
pub mod metrics;
pub mod output;
pub mod progress;
pub mod run;
pub mod sniff;
pub mod state;
pub mod utils;

pub use cli::Args;
pub use data::{MediaFileRecord, MediaKind};
pub use error::{DedupError, Result};
pub use hasher::HashWorkerPool;
pub use state::{Encoding, ScanState};
