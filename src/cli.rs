//! CLI interface definitions for the `dedup` application.
//!
//! This module defines command-line arguments using [`clap`] and exposes:
//!
//! - [`Args`]: global options plus the selected [`Command`]
//! - [`Command`]: the `index`, `dryrun` and `status` subcommands
//!
//! Options that also exist in the config file are `Option`s here so that an
//! unset flag leaves the configured value in place.
//!
//! # Example
//!
//! ```bash
//! dedup index ~/Pictures --workers 8 --output dupes.csv --format csv
//! dedup status ~/Pictures
//! ```

use crate::config::ExportFormat;
use crate::state::Encoding;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Finds byte-identical images and videos in a directory.
#[derive(Parser, Debug)]
#[command(name = "dedup", version, about)]
pub struct Args {
    /// Config file (default: $HOME/.config/dedup/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log level: error, warn, info, debug, trace
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Hash every image and video in PATH and report duplicates
    Index(IndexArgs),

    /// Record the directory census without hashing anything
    Dryrun(StateArgs),

    /// Show when PATH was last scanned
    Status(StateArgs),
}

#[derive(clap::Args, Debug)]
pub struct IndexArgs {
    /// Directory to index (defaults to current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Encoding of the scan state file
    #[arg(long, value_enum)]
    pub encoding: Option<Encoding>,

    /// Number of hashing workers
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,

    /// Progress report interval in milliseconds
    #[arg(long, value_name = "MS")]
    pub interval_ms: Option<u64>,

    /// Export the duplicate report to FILE
    #[arg(long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Export format
    #[arg(long, value_enum)]
    pub format: Option<ExportFormat>,

    /// Include files without duplicates in the report and export
    #[arg(long, default_value_t = false)]
    pub all_groups: bool,

    /// Log progress lines instead of drawing a progress bar
    #[arg(long, default_value_t = false)]
    pub no_progress_bar: bool,

    /// Enable performance profiling and show timing summary
    #[arg(long, default_value_t = false)]
    pub profile: bool,
}

#[derive(clap::Args, Debug)]
pub struct StateArgs {
    /// Directory whose scan state to use (defaults to current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Encoding of the scan state file
    #[arg(long, value_enum)]
    pub encoding: Option<Encoding>,
}
